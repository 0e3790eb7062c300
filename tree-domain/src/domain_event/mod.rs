//! 领域事件（Domain Event）与事件日志
//!
//! 定义事件载荷需要实现的最小接口（`DomainEvent`）、核验事件载荷
//! `CaptureVerified`，以及事件日志中的持久化形态 `DomainEventRecord`
//! 与其投递状态 `EventStatus`。

mod capture_verified;
mod domain_event_trait;
mod event_record;
mod event_status;

pub use capture_verified::CaptureVerified;
pub use domain_event_trait::DomainEvent;
pub use event_record::DomainEventRecord;
pub use event_status::EventStatus;
