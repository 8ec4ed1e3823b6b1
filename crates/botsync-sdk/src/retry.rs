//! 提交重试
//!
//! 同步核心对 CommitSink 是“发出即忘”的，失败处理由出口自己负责。
//! [`RetryingCommitSink`] 是可选的一层包装：按失败原因分类，
//! 对可重试的失败做指数退避 + 随机抖动。

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{BotSyncError, Result};
use crate::sink::{CommitSink, UpdateRequest};

/// 提交失败原因分类
#[derive(Debug, Clone, PartialEq)]
pub enum CommitFailureReason {
    /// 网络超时 - 可重试
    NetworkTimeout,
    /// 网络不可用 - 等待恢复后重试
    NetworkUnavailable,
    /// 后端拒绝 - 不重试
    Rejected,
    /// 出口已关闭 - 不重试
    Closed,
    /// 未知错误
    Unknown(String),
}

impl CommitFailureReason {
    pub fn is_retryable(&self) -> bool {
        match self {
            CommitFailureReason::NetworkTimeout => true,
            CommitFailureReason::NetworkUnavailable => true,
            CommitFailureReason::Rejected => false,
            CommitFailureReason::Closed => false,
            CommitFailureReason::Unknown(_) => true,
        }
    }

    /// 重试延迟倍数
    pub fn delay_multiplier(&self) -> f64 {
        match self {
            CommitFailureReason::NetworkUnavailable => 2.0,
            _ => 1.0,
        }
    }
}

impl From<&BotSyncError> for CommitFailureReason {
    fn from(error: &BotSyncError) -> Self {
        match error {
            BotSyncError::Timeout(_) => CommitFailureReason::NetworkTimeout,
            BotSyncError::Transport(msg) => {
                if msg.contains("timeout") {
                    CommitFailureReason::NetworkTimeout
                } else {
                    CommitFailureReason::NetworkUnavailable
                }
            }
            BotSyncError::Rejected(_) => CommitFailureReason::Rejected,
            BotSyncError::ChannelClosed(_) => CommitFailureReason::Closed,
            other => CommitFailureReason::Unknown(other.to_string()),
        }
    }
}

/// 重试策略配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// 最大重试次数（不含首次尝试）
    pub max_retries: u32,
    /// 基础延迟（毫秒）
    pub base_delay_ms: u64,
    /// 最大延迟（毫秒）
    pub max_delay_ms: u64,
    /// 指数退避因子
    pub backoff_factor: f64,
    /// 随机抖动因子 (0.0-1.0)
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            backoff_factor: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    /// 不重试
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.backoff_factor < 1.0 {
            return Err(BotSyncError::Config(format!(
                "backoff_factor must be >= 1.0, got {}",
                self.backoff_factor
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(BotSyncError::Config(format!(
                "jitter_factor must be within [0, 1], got {}",
                self.jitter_factor
            )));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(BotSyncError::Config(
                "base_delay_ms must not exceed max_delay_ms".to_string(),
            ));
        }
        Ok(())
    }

    /// 第 `retry_count` 次重试前的等待时间；不应再重试时返回 None
    pub fn delay_for(&self, retry_count: u32, reason: &CommitFailureReason) -> Option<Duration> {
        if retry_count >= self.max_retries || !reason.is_retryable() {
            return None;
        }

        // 基础延迟 = base_delay * (backoff_factor ^ retry_count)
        let base = self.base_delay_ms as f64 * self.backoff_factor.powf(retry_count as f64);
        let capped = (base * reason.delay_multiplier()).min(self.max_delay_ms as f64);
        let jitter = capped * self.jitter_factor * (rand::random::<f64>() - 0.5);
        let final_ms = (capped + jitter).max(0.0);

        Some(Duration::from_millis(final_ms as u64))
    }
}

/// 带重试的提交出口包装
pub struct RetryingCommitSink<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: CommitSink> RetryingCommitSink<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: CommitSink> CommitSink for RetryingCommitSink<S> {
    async fn request_update(&self, request: UpdateRequest) -> Result<()> {
        let mut retry_count = 0;
        loop {
            let error = match self.inner.request_update(request.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };

            let reason = CommitFailureReason::from(&error);
            match self.policy.delay_for(retry_count, &reason) {
                Some(delay) => {
                    debug!(
                        "commit for bot {} failed ({}), retry #{} in {}ms",
                        request.bot_id,
                        error,
                        retry_count + 1,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                None => {
                    warn!(
                        "⚠️ commit for bot {} gave up after {} retries: {}",
                        request.bot_id, retry_count, error
                    );
                    return Err(error);
                }
            }
        }
    }
}
