//! 实体（Entity）基础抽象
//!
//! 为树木记录与事件日志记录提供统一的标识（Id）能力，
//! 内存仓储按 `Entity::Id` 建立索引。
//!
use std::{fmt::Display, hash::Hash, str::FromStr};

/// 具备唯一标识的实体抽象
pub trait Entity: Clone + Send + Sync {
    /// 实体标识类型，要求可解析、可显示、可哈希与可克隆
    type Id: FromStr + Clone + Display + Eq + Hash + Send + Sync;

    /// 实体类型名（用于日志与错误信息）
    const TYPE: &'static str;

    /// 获取实体标识
    fn id(&self) -> &Self::Id;
}
