//! 按字段去抖（DebounceController）
//!
//! 每个字段一个独立的尾沿计时器：同一字段在延迟内再次编辑会取消旧计时器
//! 并重新计时，只有一串编辑中的最后一个值可能被提交。
//!
//! 计时器任务本身不接触同步状态，到期后只向驱动任务发送 [`TimerFired`]；
//! 驱动任务通过 [`DebounceController::take_due`] 校验代次后取出待提交。
//! 切换 Bot 时 [`DebounceController::cancel_all`] 中止全部计时器，
//! 即使到期消息已在通道中排队，也会因代次不匹配而被丢弃。
//!
//! 计时器通过构造时传入的运行时句柄派生，`schedule` 可以在任意线程调用。

use std::collections::HashMap;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::bot::{BotId, FieldValue};
use crate::field::FieldName;

/// 计时器到期通知
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub field: FieldName,
    pub generation: u64,
}

/// 待提交：调度时捕获的 Bot、字段与目标值
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCommit {
    pub bot_id: BotId,
    pub field: FieldName,
    pub value: FieldValue,
    pub generation: u64,
}

struct PendingSlot {
    commit: PendingCommit,
    handle: JoinHandle<()>,
}

/// 去抖控制器
///
/// 每个字段至多一个待提交。
pub struct DebounceController {
    runtime: Handle,
    delay: Duration,
    slots: HashMap<FieldName, PendingSlot>,
    next_generation: u64,
    fired_tx: mpsc::UnboundedSender<TimerFired>,
}

impl DebounceController {
    pub fn new(runtime: Handle, delay: Duration, fired_tx: mpsc::UnboundedSender<TimerFired>) -> Self {
        Self {
            runtime,
            delay,
            slots: HashMap::new(),
            next_generation: 1,
            fired_tx,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// 记录字段的目标值并（重新）开始计时，返回本次调度的代次
    pub fn schedule(&mut self, bot_id: BotId, field: FieldName, value: FieldValue) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;

        if let Some(previous) = self.slots.remove(&field) {
            previous.handle.abort();
            if previous.commit.bot_id != bot_id {
                warn!(
                    "⚠️ pending {} for bot {} replaced by bot {} without cancel_all",
                    field, previous.commit.bot_id, bot_id
                );
            } else {
                debug!("debounce reset for {} (bot {})", field, bot_id);
            }
        }

        let fired_tx = self.fired_tx.clone();
        let delay = self.delay;
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            // 接收端关闭说明同步器已停止，直接丢弃
            let _ = fired_tx.send(TimerFired { field, generation });
        });

        self.slots.insert(
            field,
            PendingSlot {
                commit: PendingCommit {
                    bot_id,
                    field,
                    value,
                    generation,
                },
                handle,
            },
        );
        generation
    }

    /// 取出已到期的待提交；代次不匹配（已被替换或取消）时返回 None
    pub fn take_due(&mut self, fired: &TimerFired) -> Option<PendingCommit> {
        match self.slots.get(&fired.field) {
            Some(slot) if slot.commit.generation == fired.generation => {
                self.slots.remove(&fired.field).map(|slot| slot.commit)
            }
            _ => None,
        }
    }

    /// 取消全部计时器且不触发提交，返回被丢弃的待提交
    pub fn cancel_all(&mut self, bot_id: &BotId) -> Vec<PendingCommit> {
        let mut discarded = Vec::with_capacity(self.slots.len());
        for (_, slot) in self.slots.drain() {
            slot.handle.abort();
            if slot.commit.bot_id != *bot_id {
                warn!(
                    "⚠️ discarding pending {} owned by bot {} while cancelling bot {}",
                    slot.commit.field, slot.commit.bot_id, bot_id
                );
            }
            discarded.push(slot.commit);
        }
        if !discarded.is_empty() {
            debug!("cancelled {} pending commits for bot {}", discarded.len(), bot_id);
        }
        discarded.sort_by_key(|c| c.field);
        discarded
    }

    pub fn is_pending(&self, field: FieldName) -> bool {
        self.slots.contains_key(&field)
    }

    pub fn pending_value(&self, field: FieldName) -> Option<&FieldValue> {
        self.slots.get(&field).map(|slot| &slot.commit.value)
    }

    pub fn pending_count(&self) -> usize {
        self.slots.len()
    }
}

impl Drop for DebounceController {
    fn drop(&mut self) {
        for (_, slot) in self.slots.drain() {
            slot.handle.abort();
        }
    }
}
