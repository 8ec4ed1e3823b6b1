//! 当前活跃 Bot 提供者
//!
//! 同步核心只依赖“读取当前 Bot + 订阅变更”这一能力，不依赖全局状态。
//! [`ActiveBotStore`] 是基于 `tokio::sync::watch` 的默认实现。

use tokio::sync::watch;
use tracing::debug;

use crate::bot::{Bot, BotId};

/// 活跃 Bot 提供者
pub trait ActiveBotProvider: Send + Sync {
    /// 当前选中的 Bot，未选中返回 None
    fn current(&self) -> Option<Bot>;

    /// 订阅选中变更
    fn subscribe(&self) -> watch::Receiver<Option<Bot>>;
}

/// 内存中的活跃 Bot 状态
pub struct ActiveBotStore {
    sender: watch::Sender<Option<Bot>>,
}

impl ActiveBotStore {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self { sender }
    }

    pub fn with_bot(bot: Bot) -> Self {
        let (sender, _) = watch::channel(Some(bot));
        Self { sender }
    }

    /// 选中某个 Bot（或 None 表示取消选中）
    ///
    /// 重新发布同一个 Bot（例如后端写入后带回新的持久化值）同样会通知订阅者，
    /// 由订阅方按标识判断是否真的切换。
    pub fn select(&self, bot: Option<Bot>) {
        debug!(
            "active bot -> {}",
            bot.as_ref().map(|b| b.id.as_str()).unwrap_or("<none>")
        );
        self.sender.send_replace(bot);
    }

    pub fn clear(&self) {
        self.select(None);
    }

    pub fn current_id(&self) -> Option<BotId> {
        self.sender.borrow().as_ref().map(|b| b.id.clone())
    }
}

impl Default for ActiveBotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ActiveBotProvider for ActiveBotStore {
    fn current(&self) -> Option<Bot> {
        self.sender.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Bot>> {
        self.sender.subscribe()
    }
}
