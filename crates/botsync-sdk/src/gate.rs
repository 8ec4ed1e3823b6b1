//! 去重闸门（ChangeGate）
//!
//! 单纯的去抖在“先改大再改回原值”时仍会触发一次提交，
//! 闸门在转发前与最近一次已知的持久化值比较，相等则直接跳过。

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::bot::{Bot, FieldValue};
use crate::field::FieldName;
use crate::sink::UpdateRequest;

/// 闸门判定结果
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// 值有变化，转发该部分更新
    Forward(UpdateRequest),
    /// 与持久化值相同，不产生写入
    Suppress,
}

/// 去重闸门
#[derive(Debug, Default)]
pub struct ChangeGate {
    forwarded: AtomicU64,
    suppressed: AtomicU64,
}

impl ChangeGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// 判定一次提交尝试
    ///
    /// 未设置的持久化字段按字段默认值比较。
    pub fn attempt_commit(&self, persisted: &Bot, field: FieldName, value: FieldValue) -> GateDecision {
        if persisted.field_or_default(field) == value {
            self.suppressed.fetch_add(1, Ordering::Relaxed);
            debug!("commit suppressed: {} of bot {} unchanged", field, persisted.id);
            return GateDecision::Suppress;
        }

        self.forwarded.fetch_add(1, Ordering::Relaxed);
        GateDecision::Forward(UpdateRequest::single(persisted.id.clone(), field, value))
    }

    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    pub fn suppressed(&self) -> u64 {
        self.suppressed.load(Ordering::Relaxed)
    }
}
