//! Bot 实体模型
//!
//! Bot 由稳定的 `_id` 标识，携带一组有序的配置字段。字段缺失表示未设置，
//! 此时使用字段默认值（见 [`FieldName::default_value`]）。

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BotSyncError, Result};
use crate::field::FieldName;

/// Bot 唯一标识（后端 `_id`），生命周期内不可变
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BotId(String);

impl BotId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BotId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for BotId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for BotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// 字段值
///
/// 相等性按数值比较：`Integer(1) == Float(1.0)`，避免后端存 `1`、
/// 滑块回报 `1.0` 时被当作不同值而产生多余写入。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            FieldValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(FieldValue::Text(s.clone())),
            Value::Number(n) => n
                .as_i64()
                .map(FieldValue::Integer)
                .or_else(|| n.as_f64().map(FieldValue::Float)),
            _ => None,
        }
    }
}

/// 数值按大小比较（`1 == 1.0`），两个 NaN 视为相等，
/// 这样 NaN 设置改回 NaN 时同样会被闸门跳过。
impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Text(a), FieldValue::Text(b)) => a == b,
            (FieldValue::Integer(a), FieldValue::Integer(b)) => a == b,
            (FieldValue::Text(_), _) | (_, FieldValue::Text(_)) => false,
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y || (x.is_nan() && y.is_nan()),
                _ => false,
            },
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Text(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Integer(v as i64)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::Integer(v as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

/// Bot 实体（最近一次已知的持久化状态）
#[derive(Debug, Clone, PartialEq)]
pub struct Bot {
    pub id: BotId,
    pub name: Option<String>,
    fields: BTreeMap<FieldName, FieldValue>,
}

impl Bot {
    pub fn new<I: Into<BotId>>(id: I) -> Self {
        Self {
            id: id.into(),
            name: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_field<V: Into<FieldValue>>(mut self, field: FieldName, value: V) -> Self {
        self.fields.insert(field, value.into());
        self
    }

    /// 已持久化的字段值，未设置返回 None
    pub fn field(&self, field: FieldName) -> Option<&FieldValue> {
        self.fields.get(&field)
    }

    /// 已持久化的字段值，未设置时回落到字段默认值
    pub fn field_or_default(&self, field: FieldName) -> FieldValue {
        self.fields
            .get(&field)
            .cloned()
            .unwrap_or_else(|| field.default_value())
    }

    pub fn set_field(&mut self, field: FieldName, value: FieldValue) {
        self.fields.insert(field, value);
    }

    pub fn fields(&self) -> &BTreeMap<FieldName, FieldValue> {
        &self.fields
    }

    /// 从后端 Bot 文档解析
    ///
    /// 接受 `_id`（或 `id`）作为标识，字段使用后端键名（`customTemperature`
    /// 也可写作 `temperature`）。未知键忽略，`null` 视为未设置。
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        let Value::Object(map) = value else {
            return Err(BotSyncError::InvalidArgument(
                "bot document must be a JSON object".to_string(),
            ));
        };
        Self::from_json_map(&map)
    }

    fn from_json_map(map: &Map<String, Value>) -> Result<Self> {
        let id = map
            .get("_id")
            .or_else(|| map.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| BotSyncError::InvalidArgument("bot document has no _id".to_string()))?;

        let mut bot = Bot::new(id);
        bot.name = map.get("name").and_then(Value::as_str).map(String::from);

        for (key, raw) in map {
            let Ok(field) = FieldName::from_str(key) else {
                continue;
            };
            if raw.is_null() {
                continue;
            }
            let value = FieldValue::from_json(raw).ok_or_else(|| {
                BotSyncError::InvalidArgument(format!("unsupported value for {}: {}", key, raw))
            })?;
            bot.fields.insert(field, value);
        }
        Ok(bot)
    }

    /// 序列化为后端 Bot 文档
    pub fn to_json(&self) -> Result<String> {
        let mut map = Map::new();
        map.insert("_id".to_string(), Value::String(self.id.to_string()));
        if let Some(name) = &self.name {
            map.insert("name".to_string(), Value::String(name.clone()));
        }
        for (field, value) in &self.fields {
            map.insert(field.backend_key().to_string(), serde_json::to_value(value)?);
        }
        Ok(serde_json::to_string(&Value::Object(map))?)
    }
}
