//! 错误类型
//!
//! 同步核心本身几乎不向调用方返回错误（编辑无活跃 Bot 时静默忽略，
//! 提交失败由 CommitSink 负责）。这里的错误只出现在边界：
//! 配置解析、Bot 文档解析、字段名解析，以及各 CommitSink 实现。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotSyncError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// 传输层错误（超时、连接不可用等），可重试
    #[error("Transport error: {0}")]
    Transport(String),

    /// 后端明确拒绝了更新，不应重试
    #[error("Update rejected: {0}")]
    Rejected(String),

    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl From<serde_json::Error> for BotSyncError {
    fn from(error: serde_json::Error) -> Self {
        BotSyncError::Serialization(error.to_string())
    }
}

impl BotSyncError {
    /// 是否为传输层的瞬时错误
    pub fn is_transient(&self) -> bool {
        matches!(self, BotSyncError::Transport(_) | BotSyncError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, BotSyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_json_error_conversion() {
        let err: BotSyncError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, BotSyncError::Serialization(_)));
        assert!(err.to_string().starts_with("Serialization error"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(BotSyncError::Transport("connection reset".into()).is_transient());
        assert!(BotSyncError::Timeout("5s".into()).is_transient());
        assert!(!BotSyncError::Rejected("403".into()).is_transient());
        assert!(!BotSyncError::Config("bad".into()).is_transient());
    }
}
