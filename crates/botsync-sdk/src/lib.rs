//! Botsync SDK - Bot 设置的按字段去抖同步
//!
//! 本 SDK 为“编辑中的 Bot 配置”提供本地镜像与后端存储之间的同步：
//! - 🪞 字段镜像：编辑立即生效，界面无需等待持久化
//! - ⏱️ 按字段去抖：同一字段的连续编辑只提交最后一个值
//! - 🚫 去重闸门：最终值等于已持久化值时不产生写入
//! - 🔄 切换安全：活跃 Bot 切换时丢弃旧 Bot 的全部待提交
//! - 📡 事件系统：编辑、提交、跳过、失败均可订阅
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use botsync_sdk::{
//!     ActiveBotStore, Bot, BotSettingsSync, ChannelCommitSink, FieldName, SyncConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (sink, mut updates) = ChannelCommitSink::new();
//!     let sync = BotSettingsSync::new(SyncConfig::default(), Arc::new(sink))?;
//!
//!     let store = Arc::new(ActiveBotStore::new());
//!     store.select(Some(Bot::new("bot-1").with_field(FieldName::MaxTokens, 100)));
//!     // follow 同步应用当前选择；之后的 select 由后台任务异步应用
//!     sync.follow(store.clone());
//!
//!     // 滑块拖动：只有最后一个值会在 1 秒后提交
//!     assert!(sync.set_local(FieldName::MaxTokens, 150));
//!     assert!(sync.set_local(FieldName::MaxTokens, 200));
//!
//!     if let Some(update) = updates.recv().await {
//!         println!("PATCH /bots/{} {}", update.bot_id, update.to_json()?);
//!     }
//!
//!     sync.shutdown();
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod config;
pub mod debounce;
pub mod error;
pub mod events;
pub mod field;
pub mod gate;
pub mod mirror;
pub mod provider;
pub mod retry;
pub mod sink;
pub mod sync;
pub mod version;

pub use bot::{Bot, BotId, FieldValue};
pub use config::{SyncConfig, SyncConfigBuilder, DEFAULT_DEBOUNCE_DELAY_MS};
pub use debounce::{DebounceController, PendingCommit, TimerFired};
pub use error::{BotSyncError, Result};
pub use events::{SyncEvent, SyncEventBus, SyncEventStats};
pub use field::{FieldKind, FieldName, FieldSpec};
pub use gate::{ChangeGate, GateDecision};
pub use mirror::{FieldMirror, FieldState};
pub use provider::{ActiveBotProvider, ActiveBotStore};
pub use retry::{CommitFailureReason, RetryPolicy, RetryingCommitSink};
pub use sink::{ChannelCommitSink, CommitSink, UpdateRequest};
pub use sync::{BotSettingsSync, SyncStats};
pub use version::SDK_VERSION;
