//! Bot 设置同步器
//!
//! 把字段镜像、按字段去抖、去重闸门和提交出口串起来：
//!
//! ```text
//! UI 编辑 → FieldMirror（立即） → DebounceController（延迟） → ChangeGate → CommitSink
//! 活跃 Bot 切换 → cancel_all → FieldMirror::initialize
//! ```
//!
//! 所有共享状态（镜像、持久化快照、待提交槽位）在同一把锁下修改，
//! 计时器到期由单个驱动任务串行处理，因此“每字段至多一个待提交”
//! 以及“切换后旧 Bot 的提交不会落地”在结构上成立。
//!
//! 后台任务全部派生在创建同步器时所在的 tokio 运行时上，
//! 因此编辑回调可以来自不属于运行时的 UI 线程。

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bot::{Bot, BotId, FieldValue};
use crate::config::SyncConfig;
use crate::debounce::{DebounceController, PendingCommit, TimerFired};
use crate::error::{BotSyncError, Result};
use crate::events::{event_builders, SyncEvent, SyncEventBus, SyncEventStats};
use crate::field::FieldName;
use crate::gate::{ChangeGate, GateDecision};
use crate::mirror::{FieldMirror, FieldState};
use crate::provider::ActiveBotProvider;
use crate::sink::{CommitSink, UpdateRequest};

/// 同步统计
#[derive(Debug, Clone, PartialEq)]
pub struct SyncStats {
    pub active_bot: Option<BotId>,
    pub pending: usize,
    pub dirty_fields: Vec<FieldName>,
    pub forwarded: u64,
    pub suppressed: u64,
    pub discarded: u64,
}

struct SyncState {
    /// 活跃 Bot 最近一次已知的持久化状态
    active: Option<Bot>,
    mirror: FieldMirror,
    debounce: DebounceController,
    discarded: u64,
    closed: bool,
}

struct Shared {
    state: Mutex<SyncState>,
    gate: ChangeGate,
    sink: Arc<dyn CommitSink>,
    events: SyncEventBus,
    shutdown: CancellationToken,
    runtime: Handle,
}

/// Bot 设置同步器（可克隆句柄）
///
/// 必须在 tokio 运行时中创建；创建之后可以从任意线程调用。
#[derive(Clone)]
pub struct BotSettingsSync {
    shared: Arc<Shared>,
}

impl BotSettingsSync {
    pub fn new(config: SyncConfig, sink: Arc<dyn CommitSink>) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|e| {
            BotSyncError::Config(format!("bot settings sync requires a tokio runtime: {}", e))
        })?;

        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            state: Mutex::new(SyncState {
                active: None,
                mirror: FieldMirror::new(),
                debounce: DebounceController::new(runtime.clone(), config.debounce_delay(), fired_tx),
                discarded: 0,
                closed: false,
            }),
            gate: ChangeGate::new(),
            sink,
            events: SyncEventBus::new(config.event_channel_capacity),
            shutdown: CancellationToken::new(),
            runtime,
        });

        Self::spawn_driver(&shared, fired_rx);
        info!(
            "✅ bot settings sync started (debounce {}ms)",
            config.debounce_delay_ms
        );
        Ok(Self { shared })
    }

    /// 计时器到期的唯一处理者
    ///
    /// 持有弱引用：同步器被释放后，去抖控制器中止全部计时器，
    /// 发送端随之关闭，驱动任务自然退出。
    fn spawn_driver(shared: &Arc<Shared>, mut fired_rx: mpsc::UnboundedReceiver<TimerFired>) {
        let shutdown = shared.shutdown.clone();
        let weak: Weak<Shared> = Arc::downgrade(shared);
        shared.runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    fired = fired_rx.recv() => {
                        let Some(fired) = fired else { break };
                        let Some(shared) = weak.upgrade() else { break };
                        shared.handle_timer_fired(fired);
                    }
                }
            }
            debug!("bot settings sync driver stopped");
        });
    }

    /// 跟随活跃 Bot 提供者
    ///
    /// 调用时同步应用提供者的当前值，返回后即可编辑。
    /// 之后的变更由后台任务异步应用（经由
    /// [`on_active_bot_changed`](Self::on_active_bot_changed)），直到 [`shutdown`](Self::shutdown)；
    /// 在 `follow` 之后调用 `select` 的选择要等该任务运行后才生效。
    pub fn follow(&self, provider: Arc<dyn ActiveBotProvider>) -> JoinHandle<()> {
        let mut rx = provider.subscribe();
        let initial = rx.borrow_and_update().clone();
        self.on_active_bot_changed(initial);

        let shared = Arc::downgrade(&self.shared);
        let shutdown = self.shared.shutdown.clone();
        self.shared.runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            debug!("active bot provider dropped");
                            break;
                        }
                        let bot = rx.borrow_and_update().clone();
                        let Some(shared) = shared.upgrade() else { break };
                        BotSettingsSync { shared }.on_active_bot_changed(bot);
                    }
                }
            }
        })
    }

    /// 活跃 Bot 变更通知
    ///
    /// 只有标识真的变化（包括与“未选中”之间的切换）才重新初始化，返回 true。
    /// 同一个 Bot 的重新发布只刷新闸门使用的持久化快照，
    /// 不动镜像、字段状态和待提交。
    pub fn on_active_bot_changed(&self, bot: Option<Bot>) -> bool {
        let mut state = self.shared.state.lock();
        if state.closed {
            return false;
        }

        let current_id = state.active.as_ref().map(|b| &b.id);
        let next_id = bot.as_ref().map(|b| &b.id);
        if current_id == next_id {
            if let Some(bot) = bot {
                debug!("persisted snapshot refreshed for bot {}", bot.id);
                state.active = Some(bot);
            }
            return false;
        }

        let (previous, discarded) = Self::reset_locked(&mut state, bot);
        let current = state.active.as_ref().map(|b| b.id.clone());
        drop(state);

        self.emit_reset(previous, current, discarded);
        true
    }

    /// 无条件重新初始化：取消全部待提交，再按 `bot` 重置镜像
    pub fn initialize(&self, bot: Option<Bot>) {
        let mut state = self.shared.state.lock();
        if state.closed {
            return;
        }
        let (previous, discarded) = Self::reset_locked(&mut state, bot);
        let current = state.active.as_ref().map(|b| b.id.clone());
        drop(state);

        self.emit_reset(previous, current, discarded);
    }

    fn reset_locked(state: &mut SyncState, bot: Option<Bot>) -> (Option<BotId>, Vec<PendingCommit>) {
        let previous = state.active.as_ref().map(|b| b.id.clone());
        let discarded = match &previous {
            Some(id) => state.debounce.cancel_all(id),
            None => Vec::new(),
        };
        state.discarded += discarded.len() as u64;
        state.mirror.initialize(bot.as_ref());

        info!(
            "🔄 active bot: {} -> {} ({} pending discarded)",
            previous.as_ref().map(BotId::as_str).unwrap_or("<none>"),
            bot.as_ref().map(|b| b.id.as_str()).unwrap_or("<none>"),
            discarded.len()
        );
        state.active = bot;
        (previous, discarded)
    }

    fn emit_reset(&self, previous: Option<BotId>, current: Option<BotId>, discarded: Vec<PendingCommit>) {
        let events = &self.shared.events;
        let count = discarded.len();
        for commit in discarded {
            events.emit(event_builders::pending_discarded(commit.bot_id, commit.field));
        }
        events.emit(event_builders::active_bot_changed(previous, current, count));
    }

    /// 本地编辑
    ///
    /// 立即更新镜像并（重新）开始该字段的去抖计时。
    /// 没有活跃 Bot 时是空操作，返回 false。
    pub fn set_local<V: Into<FieldValue>>(&self, field: FieldName, value: V) -> bool {
        let value = value.into();
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        if state.closed {
            return false;
        }
        let Some(active) = state.active.as_ref() else {
            debug!("no active bot, edit of {} ignored", field);
            return false;
        };

        let bot_id = active.id.clone();
        state.mirror.set_local(field, value.clone());
        state.debounce.schedule(bot_id.clone(), field, value.clone());
        drop(guard);

        debug!("{} of bot {} edited locally: {}", field, bot_id, value);
        self.shared
            .events
            .emit(event_builders::field_edited(bot_id, field, value));
        true
    }

    /// 取消全部待提交（不触发），停止驱动与跟随任务
    pub fn shutdown(&self) {
        let mut state = self.shared.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        let discarded = match state.active.as_ref().map(|b| b.id.clone()) {
            Some(id) => state.debounce.cancel_all(&id),
            None => Vec::new(),
        };
        state.discarded += discarded.len() as u64;
        drop(state);

        for commit in discarded {
            self.shared
                .events
                .emit(event_builders::pending_discarded(commit.bot_id, commit.field));
        }
        self.shared.shutdown.cancel();
        info!("bot settings sync shut down");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.state.lock().closed
    }

    pub fn active_bot_id(&self) -> Option<BotId> {
        self.shared.state.lock().active.as_ref().map(|b| b.id.clone())
    }

    /// 最近一次已知的持久化状态（含乐观写入）
    pub fn persisted(&self) -> Option<Bot> {
        self.shared.state.lock().active.clone()
    }

    pub fn mirror_value(&self, field: FieldName) -> FieldValue {
        self.shared.state.lock().mirror.value(field)
    }

    pub fn mirror_snapshot(&self) -> BTreeMap<FieldName, FieldValue> {
        self.shared.state.lock().mirror.snapshot()
    }

    pub fn field_state(&self, field: FieldName) -> FieldState {
        self.shared.state.lock().mirror.state(field)
    }

    pub fn is_pending(&self, field: FieldName) -> bool {
        self.shared.state.lock().debounce.is_pending(field)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.shared.events.subscribe()
    }

    pub fn event_stats(&self) -> SyncEventStats {
        self.shared.events.stats()
    }

    pub fn stats(&self) -> SyncStats {
        let state = self.shared.state.lock();
        SyncStats {
            active_bot: state.active.as_ref().map(|b| b.id.clone()),
            pending: state.debounce.pending_count(),
            dirty_fields: state.mirror.dirty_fields(),
            forwarded: self.shared.gate.forwarded(),
            suppressed: self.shared.gate.suppressed(),
            discarded: state.discarded,
        }
    }
}

impl Shared {
    fn handle_timer_fired(self: &Arc<Self>, fired: TimerFired) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Some(commit) = state.debounce.take_due(&fired) else {
            debug!(
                "stale timer for {} (generation {}) dropped",
                fired.field, fired.generation
            );
            return;
        };

        let active = match state.active.as_mut() {
            Some(bot) if bot.id == commit.bot_id => bot,
            other => {
                // cancel_all 应已清掉旧 Bot 的槽位，走到这里说明不变量被破坏
                let active_id = other.map(|b| b.id.to_string());
                warn!(
                    "⚠️ stale commit for bot {} dropped: active bot is {:?}",
                    commit.bot_id, active_id
                );
                return;
            }
        };

        let field = commit.field;
        let decision = self.gate.attempt_commit(active, field, commit.value.clone());
        if let GateDecision::Forward(_) = &decision {
            // 乐观结算：不等待 CommitSink 确认
            active.set_field(field, commit.value.clone());
        }
        state.mirror.mark_clean(field);
        drop(guard);

        match decision {
            GateDecision::Forward(request) => {
                info!("📤 commit {} = {} for bot {}", field, commit.value, commit.bot_id);
                self.events.emit(event_builders::commit_forwarded(
                    commit.bot_id,
                    field,
                    commit.value,
                ));
                self.dispatch(request);
            }
            GateDecision::Suppress => {
                self.events
                    .emit(event_builders::commit_suppressed(commit.bot_id, field));
            }
        }
    }

    /// 发出即忘：失败只记录并上报事件，不回流到核心
    fn dispatch(self: &Arc<Self>, request: UpdateRequest) {
        let shared = Arc::clone(self);
        self.runtime.spawn(async move {
            let bot_id = request.bot_id.clone();
            let fields = request.fields();
            if let Err(e) = shared.sink.request_update(request).await {
                warn!("⚠️ commit for bot {} failed: {}", bot_id, e);
                shared
                    .events
                    .emit(event_builders::commit_failed(bot_id, fields, e.to_string()));
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ActiveBotStore;
    use crate::sink::ChannelCommitSink;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::sleep;

    fn bot_a() -> Bot {
        Bot::new("bot-a")
            .with_field(FieldName::MaxTokens, 100)
            .with_field(FieldName::Temperature, 0.5)
            .with_field(FieldName::SystemPrompt, "You are helpful.")
    }

    fn bot_b() -> Bot {
        Bot::new("bot-b")
            .with_field(FieldName::MaxTokens, 300)
            .with_field(FieldName::Temperature, 0.9)
    }

    fn setup(bot: Option<Bot>) -> (BotSettingsSync, UnboundedReceiver<UpdateRequest>) {
        let (sink, rx) = ChannelCommitSink::new();
        let sync = BotSettingsSync::new(SyncConfig::default(), Arc::new(sink)).unwrap();
        sync.initialize(bot);
        (sync, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<UpdateRequest>) -> Vec<UpdateRequest> {
        let mut requests = Vec::new();
        while let Ok(request) = rx.try_recv() {
            requests.push(request);
        }
        requests
    }

    fn drain_events(rx: &mut broadcast::Receiver<SyncEvent>) -> Vec<&'static str> {
        let mut types = Vec::new();
        while let Ok(event) = rx.try_recv() {
            types.push(event.event_type());
        }
        types
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_back_to_persisted_value_is_suppressed() {
        let (sync, mut rx) = setup(Some(bot_a()));

        assert!(sync.set_local(FieldName::Temperature, 0.7));
        assert_eq!(sync.field_state(FieldName::Temperature), FieldState::Dirty);
        sleep(Duration::from_millis(300)).await;
        assert!(sync.set_local(FieldName::Temperature, 0.5));
        assert_eq!(sync.mirror_value(FieldName::Temperature), FieldValue::Float(0.5));
        // 值等于持久化值，但计时器仍在，字段保持 Dirty
        assert_eq!(sync.field_state(FieldName::Temperature), FieldState::Dirty);
        assert!(sync.is_pending(FieldName::Temperature));

        sleep(Duration::from_millis(1500)).await;
        assert!(drain(&mut rx).is_empty());
        assert_eq!(sync.field_state(FieldName::Temperature), FieldState::Clean);

        let stats = sync.stats();
        assert_eq!(stats.suppressed, 1);
        assert_eq!(stats.forwarded, 0);
        assert_eq!(stats.pending, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drag_commits_final_value_once() {
        let (sync, mut rx) = setup(Some(bot_a()));

        for value in [120, 150, 180, 200] {
            sync.set_local(FieldName::MaxTokens, value);
            sleep(Duration::from_millis(50)).await;
        }
        assert!(drain(&mut rx).is_empty());

        sleep(Duration::from_millis(1100)).await;
        let requests = drain(&mut rx);
        assert_eq!(
            requests,
            vec![UpdateRequest::single(
                BotId::from("bot-a"),
                FieldName::MaxTokens,
                FieldValue::Integer(200)
            )]
        );
        assert_eq!(requests[0].to_json().unwrap(), r#"{"maxTokens":200}"#);

        assert_eq!(sync.field_state(FieldName::MaxTokens), FieldState::Clean);
        assert_eq!(sync.mirror_value(FieldName::MaxTokens), FieldValue::Integer(200));
        assert_eq!(
            sync.persisted().unwrap().field(FieldName::MaxTokens),
            Some(&FieldValue::Integer(200))
        );

        sleep(Duration::from_millis(3000)).await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_discards_pending_commit_of_previous_bot() {
        let (sync, mut rx) = setup(Some(bot_a()));
        let mut events = sync.subscribe_events();

        sync.set_local(FieldName::MaxTokens, 200);
        sleep(Duration::from_millis(500)).await;
        assert!(sync.on_active_bot_changed(Some(bot_b())));

        assert_eq!(sync.mirror_value(FieldName::MaxTokens), FieldValue::Integer(300));
        assert_eq!(sync.field_state(FieldName::MaxTokens), FieldState::Clean);
        assert!(!sync.is_pending(FieldName::MaxTokens));

        sleep(Duration::from_millis(2000)).await;
        assert!(drain(&mut rx).is_empty());
        assert_eq!(sync.stats().discarded, 1);
        assert_eq!(
            drain_events(&mut events),
            vec!["field_edited", "pending_discarded", "active_bot_changed"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_active_bot_edits_are_noops() {
        let (sync, mut rx) = setup(None);

        for field in FieldName::ALL {
            assert!(!sync.set_local(field, 1));
        }
        assert_eq!(sync.mirror_value(FieldName::MaxTokens), FieldValue::Integer(0));

        sleep(Duration::from_millis(2000)).await;
        assert!(drain(&mut rx).is_empty());
        assert_eq!(sync.stats().pending, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_to_no_bot_discards_pending_commit() {
        let (sync, mut rx) = setup(Some(bot_a()));

        assert!(sync.set_local(FieldName::MaxTokens, 200));
        assert!(sync.on_active_bot_changed(None));

        assert_eq!(sync.active_bot_id(), None);
        assert!(!sync.is_pending(FieldName::MaxTokens));
        for field in FieldName::ALL {
            assert_eq!(sync.mirror_value(field), field.default_value());
            assert_eq!(sync.field_state(field), FieldState::Clean);
        }

        sleep(Duration::from_millis(2000)).await;
        assert!(drain(&mut rx).is_empty());
        let stats = sync.stats();
        assert_eq!(stats.discarded, 1);
        assert_eq!(stats.forwarded, 0);
    }

    #[tokio::test]
    async fn test_initialize_twice_matches_once() {
        let (once, _rx1) = setup(Some(bot_a()));
        let (twice, _rx2) = setup(Some(bot_a()));
        twice.initialize(Some(bot_a()));

        assert_eq!(once.mirror_snapshot(), twice.mirror_snapshot());
        assert_eq!(twice.stats().dirty_fields, Vec::<FieldName>::new());
        assert_eq!(twice.active_bot_id(), Some(BotId::from("bot-a")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fields_commit_independently() {
        let (sync, mut rx) = setup(Some(bot_a()));

        sync.set_local(FieldName::MaxTokens, 256);
        sleep(Duration::from_millis(400)).await;
        sync.set_local(FieldName::SystemPrompt, "Be terse.");
        sync.set_local(FieldName::FrequencyPenalty, 0.3);

        sleep(Duration::from_millis(700)).await;
        let first = drain(&mut rx);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].fields(), vec![FieldName::MaxTokens]);

        sleep(Duration::from_millis(500)).await;
        let mut fields: Vec<FieldName> = drain(&mut rx)
            .into_iter()
            .flat_map(|r| r.fields())
            .collect();
        fields.sort();
        assert_eq!(fields, vec![FieldName::SystemPrompt, FieldName::FrequencyPenalty]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_bot_republish_keeps_mirror_and_pending() {
        let (sync, mut rx) = setup(Some(bot_a()));

        sync.set_local(FieldName::MaxTokens, 200);
        let refreshed = bot_a().with_field(FieldName::Temperature, 0.6);
        assert!(!sync.on_active_bot_changed(Some(refreshed)));

        assert_eq!(sync.mirror_value(FieldName::MaxTokens), FieldValue::Integer(200));
        assert_eq!(sync.mirror_value(FieldName::Temperature), FieldValue::Float(0.5));
        assert!(sync.is_pending(FieldName::MaxTokens));
        assert_eq!(
            sync.persisted().unwrap().field(FieldName::Temperature),
            Some(&FieldValue::Float(0.6))
        );

        sleep(Duration::from_millis(1100)).await;
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reverting_after_commit_is_committed_again() {
        let (sync, mut rx) = setup(Some(bot_a()));

        sync.set_local(FieldName::MaxTokens, 200);
        sleep(Duration::from_millis(1100)).await;
        assert_eq!(drain(&mut rx).len(), 1);

        sync.set_local(FieldName::MaxTokens, 100);
        sleep(Duration::from_millis(1100)).await;
        let requests = drain(&mut rx);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].changes[&FieldName::MaxTokens], FieldValue::Integer(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_follows_provider_switches() {
        let (sink, mut rx) = ChannelCommitSink::new();
        let sync = BotSettingsSync::new(SyncConfig::default(), Arc::new(sink)).unwrap();
        let store = Arc::new(ActiveBotStore::with_bot(bot_a()));

        let _follower = sync.follow(store.clone());
        assert_eq!(sync.active_bot_id(), Some(BotId::from("bot-a")));
        assert_eq!(sync.mirror_value(FieldName::MaxTokens), FieldValue::Integer(100));

        sync.set_local(FieldName::MaxTokens, 200);
        store.select(Some(bot_b()));
        sleep(Duration::from_millis(10)).await;
        assert_eq!(sync.active_bot_id(), Some(BotId::from("bot-b")));
        assert_eq!(sync.mirror_value(FieldName::MaxTokens), FieldValue::Integer(300));

        store.clear();
        sleep(Duration::from_millis(10)).await;
        assert_eq!(sync.active_bot_id(), None);
        assert!(!sync.set_local(FieldName::MaxTokens, 5));

        sleep(Duration::from_millis(2000)).await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_from_non_runtime_thread_is_committed() {
        let (sync, mut rx) = setup(Some(bot_a()));

        let ui = sync.clone();
        let accepted = std::thread::spawn(move || ui.set_local(FieldName::MaxTokens, 200))
            .join()
            .unwrap();
        assert!(accepted);
        assert_eq!(sync.field_state(FieldName::MaxTokens), FieldState::Dirty);

        sleep(Duration::from_millis(1100)).await;
        assert_eq!(
            drain(&mut rx),
            vec![UpdateRequest::single(
                BotId::from("bot-a"),
                FieldName::MaxTokens,
                FieldValue::Integer(200)
            )]
        );
    }

    #[test]
    fn test_new_outside_runtime_is_config_error() {
        let (sink, _rx) = ChannelCommitSink::new();
        let result = BotSettingsSync::new(SyncConfig::default(), Arc::new(sink));
        assert!(matches!(result, Err(BotSyncError::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_selection_made_before_follow_is_editable_immediately() {
        let (sink, mut rx) = ChannelCommitSink::new();
        let sync = BotSettingsSync::new(SyncConfig::default(), Arc::new(sink)).unwrap();
        let store = Arc::new(ActiveBotStore::new());

        store.select(Some(bot_a()));
        let _follower = sync.follow(store.clone());
        assert!(sync.set_local(FieldName::MaxTokens, 150));
        assert!(sync.set_local(FieldName::MaxTokens, 200));

        sleep(Duration::from_millis(1100)).await;
        let requests = drain(&mut rx);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].changes[&FieldName::MaxTokens], FieldValue::Integer(200));
    }

    struct FailingSink;

    #[async_trait]
    impl CommitSink for FailingSink {
        async fn request_update(&self, _request: UpdateRequest) -> Result<()> {
            Err(BotSyncError::Transport("backend unavailable".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_failure_is_reported_not_surfaced() {
        let sync = BotSettingsSync::new(SyncConfig::default(), Arc::new(FailingSink)).unwrap();
        sync.initialize(Some(bot_a()));
        let mut events = sync.subscribe_events();

        assert!(sync.set_local(FieldName::PresencePenalty, 0.4));
        sleep(Duration::from_millis(1100)).await;

        assert_eq!(
            drain_events(&mut events),
            vec!["field_edited", "commit_forwarded", "commit_failed"]
        );
        // 乐观结算不因失败回滚
        assert_eq!(sync.field_state(FieldName::PresencePenalty), FieldState::Clean);
        assert_eq!(sync.event_stats().events_by_type.get("commit_failed"), Some(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_discards_pending_and_stops_edits() {
        let (sync, mut rx) = setup(Some(bot_a()));

        sync.set_local(FieldName::Temperature, 0.8);
        sync.shutdown();
        assert!(sync.is_shutdown());
        assert!(!sync.set_local(FieldName::Temperature, 0.9));

        sleep(Duration::from_millis(2000)).await;
        assert!(drain(&mut rx).is_empty());
        assert_eq!(sync.stats().discarded, 1);
    }

    #[tokio::test]
    async fn test_rejects_invalid_config() {
        let (sink, _rx) = ChannelCommitSink::new();
        let config = SyncConfig::builder().event_channel_capacity(0).build();
        assert!(BotSettingsSync::new(config, Arc::new(sink)).is_err());
    }
}
