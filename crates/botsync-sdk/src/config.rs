//! 同步配置

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BotSyncError, Result};
use crate::retry::RetryPolicy;

/// 默认去抖延迟（毫秒）
pub const DEFAULT_DEBOUNCE_DELAY_MS: u64 = 1000;

/// 去抖延迟上限（毫秒）
const MAX_DEBOUNCE_DELAY_MS: u64 = 60_000;

/// 同步配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// 字段最后一次编辑后，等待多久再尝试提交（毫秒）
    pub debounce_delay_ms: u64,
    /// 事件广播通道容量
    pub event_channel_capacity: usize,
    /// 提交重试策略（供 RetryingCommitSink 使用）
    pub retry: RetryPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_delay_ms: DEFAULT_DEBOUNCE_DELAY_MS,
            event_channel_capacity: 256,
            retry: RetryPolicy::default(),
        }
    }
}

impl SyncConfig {
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::new()
    }

    /// 从 JSON 解析并校验，缺省字段取默认值
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SyncConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.event_channel_capacity == 0 {
            return Err(BotSyncError::Config(
                "event_channel_capacity must be greater than 0".to_string(),
            ));
        }
        if self.debounce_delay_ms > MAX_DEBOUNCE_DELAY_MS {
            return Err(BotSyncError::Config(format!(
                "debounce_delay_ms must be at most {}ms, got {}",
                MAX_DEBOUNCE_DELAY_MS, self.debounce_delay_ms
            )));
        }
        self.retry.validate()
    }
}

pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SyncConfig::default(),
        }
    }

    pub fn debounce_delay(mut self, delay: Duration) -> Self {
        self.config.debounce_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.event_channel_capacity = capacity;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    pub fn build(self) -> SyncConfig {
        self.config
    }
}

impl Default for SyncConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
