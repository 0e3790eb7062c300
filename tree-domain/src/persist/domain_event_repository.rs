use crate::{
    domain_event::{DomainEventRecord, EventStatus},
    error::DomainResult as Result,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 事件日志仓储
///
/// `create` 与触发事件的记录变更处于同一事务；
/// `update_status` 在提交之后、投递确认时独立执行。
#[async_trait]
pub trait DomainEventRepository<Tx: Send>: Send + Sync {
    async fn create(&self, tx: &mut Tx, event: &DomainEventRecord) -> Result<()>;

    async fn update_status(&self, id: Uuid, status: EventStatus, at: DateTime<Utc>)
    -> Result<()>;

    async fn find_event(&self, id: Uuid) -> Result<Option<DomainEventRecord>>;
}
