//! 字段镜像（FieldMirror）
//!
//! 为当前活跃 Bot 的每个受跟踪字段保存一份可立即渲染的本地值。
//! 编辑同步生效，不等待持久化；活跃 Bot 标识变化时整体重新初始化。

use std::collections::BTreeMap;

use crate::bot::{Bot, BotId, FieldValue};
use crate::field::FieldName;

/// 字段同步状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldState {
    /// 镜像值等于持久化值，且没有待提交
    Clean,
    /// 有计时中的待提交（即使本地值恰好等于持久化值）
    Dirty,
}

/// 字段镜像
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMirror {
    bot_id: Option<BotId>,
    values: BTreeMap<FieldName, FieldValue>,
    states: BTreeMap<FieldName, FieldState>,
}

impl FieldMirror {
    pub fn new() -> Self {
        let mut mirror = Self {
            bot_id: None,
            values: BTreeMap::new(),
            states: BTreeMap::new(),
        };
        mirror.initialize(None);
        mirror
    }

    /// 按 Bot 的持久化值（或字段默认值）重置所有字段，全部置为 Clean
    ///
    /// `None` 表示未选中任何 Bot：值回到默认，之后的编辑都是空操作。
    pub fn initialize(&mut self, bot: Option<&Bot>) {
        self.bot_id = bot.map(|b| b.id.clone());
        for field in FieldName::ALL {
            let value = match bot {
                Some(bot) => bot.field_or_default(field),
                None => field.default_value(),
            };
            self.values.insert(field, value);
            self.states.insert(field, FieldState::Clean);
        }
    }

    /// 立即更新本地值并转为 Dirty，直到计时器结算后 [`mark_clean`](Self::mark_clean)。
    ///
    /// 没有活跃 Bot 时返回 false。
    pub fn set_local(&mut self, field: FieldName, value: FieldValue) -> bool {
        if self.bot_id.is_none() {
            return false;
        }
        self.states.insert(field, FieldState::Dirty);
        self.values.insert(field, value);
        true
    }

    pub fn mark_clean(&mut self, field: FieldName) {
        self.states.insert(field, FieldState::Clean);
    }

    pub fn bot_id(&self) -> Option<&BotId> {
        self.bot_id.as_ref()
    }

    pub fn value(&self, field: FieldName) -> FieldValue {
        self.values
            .get(&field)
            .cloned()
            .unwrap_or_else(|| field.default_value())
    }

    pub fn state(&self, field: FieldName) -> FieldState {
        self.states.get(&field).copied().unwrap_or(FieldState::Clean)
    }

    pub fn snapshot(&self) -> BTreeMap<FieldName, FieldValue> {
        self.values.clone()
    }

    pub fn dirty_fields(&self) -> Vec<FieldName> {
        self.states
            .iter()
            .filter(|(_, state)| **state == FieldState::Dirty)
            .map(|(field, _)| *field)
            .collect()
    }
}

impl Default for FieldMirror {
    fn default() -> Self {
        Self::new()
    }
}
