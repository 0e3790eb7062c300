//! 内存版事件总线（InMemoryEventBus）
//!
//! 基于 `tokio::sync::broadcast` 实现的轻量事件总线：
//! - `publish`：克隆并广播事件载荷，广播成功即视为确认；
//! - `subscribe`：返回 `'static` 生命周期事件流，便于在 `tokio::spawn` 中使用；
//! - 典型用途：测试环境、示例与本地开发。
//!
//! 注意：若当前无订阅者，事件被丢弃但仍视为已确认。

use crate::domain_event::DomainEventRecord;
use crate::error::{DomainError, DomainResult as Result};
use crate::eventing::EventBus;
use async_trait::async_trait;
use futures_core::stream::BoxStream;
use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::trace;

/// 简单的内存事件总线实现
#[derive(Clone)]
pub struct InMemoryEventBus {
    tx: broadcast::Sender<DomainEventRecord>,
}

impl InMemoryEventBus {
    /// 创建一个内存总线，`capacity` 为广播缓冲区容量
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// 返回一个 'static 生命周期的事件流
    pub fn subscribe(&self) -> BoxStream<'static, Result<DomainEventRecord>> {
        let rx = self.tx.subscribe();
        let stream =
            BroadcastStream::new(rx).map(|r| r.map_err(|e| DomainError::event_bus(e.to_string())));
        Box::pin(stream)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, event: &DomainEventRecord) -> Result<()> {
        // 无订阅者时 send 返回错误，这里视为非致命并忽略
        let receivers = self.tx.send(event.clone()).unwrap_or(0);
        trace!(receivers, event_type = event.event_type(), "published to in-memory bus");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use serde_json::json;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = InMemoryEventBus::new(8);
        let mut stream = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let event = DomainEventRecord::builder()
            .payload(json!({ "type": "VerifyCaptureProcessed" }))
            .build();
        bus.publish(&event).await.unwrap();

        let received = stream.next().await.unwrap().unwrap();
        assert_eq!(received.id(), event.id());
        assert_eq!(received.event_type(), Some("VerifyCaptureProcessed"));
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_acknowledged() {
        let bus = InMemoryEventBus::new(1);
        let events = vec![
            DomainEventRecord::builder().payload(json!({})).build(),
            DomainEventRecord::builder().payload(json!({})).build(),
        ];
        bus.publish_batch(&events).await.unwrap();
    }
}
