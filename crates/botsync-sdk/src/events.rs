//! 事件系统模块 - 同步过程中的可观测事件
//!
//! 功能包括：
//! - 活跃 Bot 切换事件
//! - 本地编辑事件
//! - 提交转发 / 去重跳过 / 丢弃 / 失败事件
//! - 事件广播、订阅与按类型统计

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::bot::{BotId, FieldValue};
use crate::field::FieldName;

/// 同步事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SyncEvent {
    /// 活跃 Bot 标识发生变化，镜像已重新初始化
    ActiveBotChanged {
        previous: Option<BotId>,
        current: Option<BotId>,
        /// 因切换被丢弃的待提交数
        discarded: usize,
        timestamp: i64,
    },
    /// 本地镜像被编辑
    FieldEdited {
        bot_id: BotId,
        field: FieldName,
        value: FieldValue,
        timestamp: i64,
    },
    /// 提交已转发给 CommitSink
    CommitForwarded {
        bot_id: BotId,
        field: FieldName,
        value: FieldValue,
        timestamp: i64,
    },
    /// 最终值等于持久化值，提交被跳过
    CommitSuppressed {
        bot_id: BotId,
        field: FieldName,
        timestamp: i64,
    },
    /// 待提交在触发前被丢弃（切换 Bot 或关闭）
    PendingDiscarded {
        bot_id: BotId,
        field: FieldName,
        timestamp: i64,
    },
    /// CommitSink 返回失败（仅上报，核心不重试）
    CommitFailed {
        bot_id: BotId,
        fields: Vec<FieldName>,
        error: String,
        timestamp: i64,
    },
}

impl SyncEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            SyncEvent::ActiveBotChanged { .. } => "active_bot_changed",
            SyncEvent::FieldEdited { .. } => "field_edited",
            SyncEvent::CommitForwarded { .. } => "commit_forwarded",
            SyncEvent::CommitSuppressed { .. } => "commit_suppressed",
            SyncEvent::PendingDiscarded { .. } => "pending_discarded",
            SyncEvent::CommitFailed { .. } => "commit_failed",
        }
    }

    /// 事件所属 Bot（切换事件取切换后的 Bot）
    pub fn bot_id(&self) -> Option<&BotId> {
        match self {
            SyncEvent::ActiveBotChanged { current, .. } => current.as_ref(),
            SyncEvent::FieldEdited { bot_id, .. }
            | SyncEvent::CommitForwarded { bot_id, .. }
            | SyncEvent::CommitSuppressed { bot_id, .. }
            | SyncEvent::PendingDiscarded { bot_id, .. }
            | SyncEvent::CommitFailed { bot_id, .. } => Some(bot_id),
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            SyncEvent::ActiveBotChanged { timestamp, .. }
            | SyncEvent::FieldEdited { timestamp, .. }
            | SyncEvent::CommitForwarded { timestamp, .. }
            | SyncEvent::CommitSuppressed { timestamp, .. }
            | SyncEvent::PendingDiscarded { timestamp, .. }
            | SyncEvent::CommitFailed { timestamp, .. } => *timestamp,
        }
    }
}

/// 事件统计
#[derive(Debug, Clone, Default)]
pub struct SyncEventStats {
    pub total_events: u64,
    pub events_by_type: HashMap<String, u64>,
}

/// 事件总线
pub struct SyncEventBus {
    sender: broadcast::Sender<SyncEvent>,
    stats: RwLock<SyncEventStats>,
}

impl SyncEventBus {
    /// `capacity` 必须大于 0（由 SyncConfig::validate 保证）
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            stats: RwLock::new(SyncEventStats::default()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    /// 发布事件，没有订阅者时只计数
    pub fn emit(&self, event: SyncEvent) {
        {
            let mut stats = self.stats.write();
            stats.total_events += 1;
            *stats
                .events_by_type
                .entry(event.event_type().to_string())
                .or_insert(0) += 1;
        }
        if self.sender.send(event).is_err() {
            debug!("sync event dropped: no subscribers");
        }
    }

    pub fn stats(&self) -> SyncEventStats {
        self.stats.read().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// 事件生成器 - 辅助函数
pub mod event_builders {
    use super::*;

    fn now_millis() -> i64 {
        Utc::now().timestamp_millis()
    }

    pub fn active_bot_changed(
        previous: Option<BotId>,
        current: Option<BotId>,
        discarded: usize,
    ) -> SyncEvent {
        SyncEvent::ActiveBotChanged {
            previous,
            current,
            discarded,
            timestamp: now_millis(),
        }
    }

    pub fn field_edited(bot_id: BotId, field: FieldName, value: FieldValue) -> SyncEvent {
        SyncEvent::FieldEdited {
            bot_id,
            field,
            value,
            timestamp: now_millis(),
        }
    }

    pub fn commit_forwarded(bot_id: BotId, field: FieldName, value: FieldValue) -> SyncEvent {
        SyncEvent::CommitForwarded {
            bot_id,
            field,
            value,
            timestamp: now_millis(),
        }
    }

    pub fn commit_suppressed(bot_id: BotId, field: FieldName) -> SyncEvent {
        SyncEvent::CommitSuppressed {
            bot_id,
            field,
            timestamp: now_millis(),
        }
    }

    pub fn pending_discarded(bot_id: BotId, field: FieldName) -> SyncEvent {
        SyncEvent::PendingDiscarded {
            bot_id,
            field,
            timestamp: now_millis(),
        }
    }

    pub fn commit_failed(bot_id: BotId, fields: Vec<FieldName>, error: String) -> SyncEvent {
        SyncEvent::CommitFailed {
            bot_id,
            fields,
            error,
            timestamp: now_millis(),
        }
    }
}
