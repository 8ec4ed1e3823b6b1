//! 提交出口（CommitSink）
//!
//! 同步核心把去抖、去重后的部分更新交给 CommitSink，自身不等待确认。
//! 实现方需保证幂等；失败、重试、上报都由实现方负责，错误不会回流到核心。

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::bot::{BotId, FieldValue};
use crate::error::{BotSyncError, Result};
use crate::field::FieldName;

/// 一次部分更新请求：目标 Bot + 变更字段
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    pub bot_id: BotId,
    pub changes: BTreeMap<FieldName, FieldValue>,
}

impl UpdateRequest {
    pub fn single(bot_id: BotId, field: FieldName, value: FieldValue) -> Self {
        let mut changes = BTreeMap::new();
        changes.insert(field, value);
        Self { bot_id, changes }
    }

    /// 请求中涉及的字段，按声明顺序
    pub fn fields(&self) -> Vec<FieldName> {
        self.changes.keys().copied().collect()
    }

    /// 渲染为后端部分更新的请求体，例如 `{"maxTokens":200}`
    pub fn to_json(&self) -> Result<String> {
        let mut body = Map::new();
        for (field, value) in &self.changes {
            body.insert(field.backend_key().to_string(), serde_json::to_value(value)?);
        }
        Ok(serde_json::to_string(&Value::Object(body))?)
    }
}

/// 提交出口
#[async_trait]
pub trait CommitSink: Send + Sync {
    /// 将部分更新应用到持久化存储
    async fn request_update(&self, request: UpdateRequest) -> Result<()>;
}

/// 通过 mpsc 通道转发更新请求
///
/// 适合由应用自己的任务统一处理写入（以及测试中观察提交）。
#[derive(Clone)]
pub struct ChannelCommitSink {
    sender: mpsc::UnboundedSender<UpdateRequest>,
}

impl ChannelCommitSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UpdateRequest>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl CommitSink for ChannelCommitSink {
    async fn request_update(&self, request: UpdateRequest) -> Result<()> {
        self.sender
            .send(request)
            .map_err(|e| BotSyncError::ChannelClosed(format!("commit receiver dropped: {}", e.0.bot_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_body_uses_backend_keys() {
        let request = UpdateRequest::single(
            BotId::from("bot-1"),
            FieldName::Temperature,
            FieldValue::Float(0.7),
        );
        assert_eq!(request.to_json().unwrap(), r#"{"customTemperature":0.7}"#);
        assert_eq!(request.fields(), vec![FieldName::Temperature]);

        let request = UpdateRequest::single(
            BotId::from("bot-1"),
            FieldName::MaxTokens,
            FieldValue::Integer(200),
        );
        assert_eq!(request.to_json().unwrap(), r#"{"maxTokens":200}"#);
    }

    #[tokio::test]
    async fn test_channel_sink_forwards_and_reports_closed() {
        let (sink, mut rx) = ChannelCommitSink::new();
        let request = UpdateRequest::single(
            BotId::from("bot-1"),
            FieldName::SystemPrompt,
            FieldValue::from("hi"),
        );

        sink.request_update(request.clone()).await.unwrap();
        assert_eq!(rx.recv().await, Some(request.clone()));

        drop(rx);
        let err = sink.request_update(request).await.unwrap_err();
        assert!(matches!(err, BotSyncError::ChannelClosed(_)));
    }
}
