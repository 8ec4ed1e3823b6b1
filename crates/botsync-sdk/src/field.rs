//! Bot 配置字段 - 受控枚举
//!
//! 字段集合与后端 Bot 文档一致，新增字段需要 SDK 与后端同步升级。
//! 取值范围与步长仅供输入控件参考，同步核心不做校验。

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::bot::FieldValue;
use crate::error::BotSyncError;

/// 可编辑的 Bot 配置字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FieldName {
    #[serde(rename = "systemPrompt")]
    SystemPrompt,
    #[serde(rename = "maxTokens")]
    MaxTokens,
    #[serde(rename = "temperature")]
    Temperature,
    #[serde(rename = "frequencyPenalty")]
    FrequencyPenalty,
    #[serde(rename = "presencePenalty")]
    PresencePenalty,
}

/// 字段取值类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Float,
}

/// 字段约束（输入控件使用）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub kind: FieldKind,
    /// 数值字段的下界，文本字段为 None
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub step: Option<f64>,
}

impl FieldName {
    /// 全部受跟踪字段，按声明顺序
    pub const ALL: [FieldName; 5] = [
        FieldName::SystemPrompt,
        FieldName::MaxTokens,
        FieldName::Temperature,
        FieldName::FrequencyPenalty,
        FieldName::PresencePenalty,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SystemPrompt => "systemPrompt",
            Self::MaxTokens => "maxTokens",
            Self::Temperature => "temperature",
            Self::FrequencyPenalty => "frequencyPenalty",
            Self::PresencePenalty => "presencePenalty",
        }
    }

    /// 后端文档中的键名
    ///
    /// temperature 在后端存为 customTemperature，其余与字段名一致。
    pub fn backend_key(self) -> &'static str {
        match self {
            Self::Temperature => "customTemperature",
            other => other.as_str(),
        }
    }

    pub fn spec(self) -> FieldSpec {
        match self {
            Self::SystemPrompt => FieldSpec {
                kind: FieldKind::Text,
                min: None,
                max: None,
                step: None,
            },
            Self::MaxTokens => FieldSpec {
                kind: FieldKind::Integer,
                min: Some(0.0),
                max: Some(4096.0),
                step: Some(1.0),
            },
            Self::Temperature | Self::FrequencyPenalty | Self::PresencePenalty => FieldSpec {
                kind: FieldKind::Float,
                min: Some(0.0),
                max: Some(1.0),
                step: Some(0.01),
            },
        }
    }

    /// 字段未设置时使用的默认值（数值为 0，文本为空串）
    pub fn default_value(self) -> FieldValue {
        match self.spec().kind {
            FieldKind::Text => FieldValue::Text(String::new()),
            FieldKind::Integer => FieldValue::Integer(0),
            FieldKind::Float => FieldValue::Float(0.0),
        }
    }
}

impl FieldSpec {
    /// 值是否落在建议范围内（文本字段总是 true）
    pub fn contains(&self, value: &FieldValue) -> bool {
        let Some(v) = value.as_f64() else {
            return self.kind == FieldKind::Text;
        };
        self.min.map_or(true, |min| v >= min) && self.max.map_or(true, |max| v <= max)
    }

    /// 将数值夹到范围内并按步长取整；文本原样返回
    pub fn clamp(&self, value: FieldValue) -> FieldValue {
        let Some(mut v) = value.as_f64() else {
            return value;
        };
        if let Some(min) = self.min {
            v = v.max(min);
        }
        if let Some(max) = self.max {
            v = v.min(max);
        }
        if let Some(step) = self.step {
            v = (v / step).round() * step;
        }
        match self.kind {
            FieldKind::Integer => FieldValue::Integer(v.round() as i64),
            _ => FieldValue::Float(v),
        }
    }
}

impl FromStr for FieldName {
    type Err = BotSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "systemPrompt" => Ok(Self::SystemPrompt),
            "maxTokens" => Ok(Self::MaxTokens),
            "temperature" | "customTemperature" => Ok(Self::Temperature),
            "frequencyPenalty" => Ok(Self::FrequencyPenalty),
            "presencePenalty" => Ok(Self::PresencePenalty),
            other => Err(BotSyncError::InvalidArgument(format!(
                "unknown field: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for FieldName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
