use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;

/// 领域事件载荷需要满足的通用能力边界
pub trait DomainEvent:
    Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync
{
    /// 事件类型标签（写入载荷的 `type` 字段）
    const EVENT_TYPE: &'static str;

    /// 事件发生时间
    fn occurred_at(&self) -> DateTime<Utc>;
}
