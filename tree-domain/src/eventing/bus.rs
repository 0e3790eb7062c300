//! 事件总线（EventBus）协议
//!
//! 发布与确认拆分为显式的两步：`publish` 的结果即确认信号，
//! 状态推进由调用方在确认之后单独完成，不依赖回调嵌套。
//!
use crate::{domain_event::DomainEventRecord, error::DomainResult as Result};
use async_trait::async_trait;
use std::sync::Arc;

/// 事件总线：负责将事件投递到外部通道
#[async_trait]
pub trait EventBus: Send + Sync {
    /// 发布单条事件，返回 `Ok` 表示下游已确认
    async fn publish(&self, event: &DomainEventRecord) -> Result<()>;

    async fn publish_batch(&self, events: &[DomainEventRecord]) -> Result<()> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<T> EventBus for Arc<T>
where
    T: EventBus + ?Sized,
{
    async fn publish(&self, event: &DomainEventRecord) -> Result<()> {
        (**self).publish(event).await
    }
}
