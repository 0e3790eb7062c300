use crate::{
    domain_event::{DomainEvent, EventStatus},
    entity::Entity,
    error::DomainResult,
};
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// 事件日志记录（持久化形态）
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct DomainEventRecord {
    /// 事件唯一标识
    #[builder(default = Uuid::new_v4())]
    id: Uuid,
    /// 事件负载（对存储层不透明）
    payload: Value,
    /// 投递状态
    #[builder(default)]
    status: EventStatus,
    #[builder(default = Utc::now())]
    created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    updated_at: DateTime<Utc>,
}

impl DomainEventRecord {
    /// 以 `Raised` 状态包装一条领域事件
    pub fn raise<E: DomainEvent>(event: &E) -> DomainResult<Self> {
        let occurred_at = event.occurred_at();

        Ok(Self::builder()
            .payload(serde_json::to_value(event)?)
            .created_at(occurred_at)
            .updated_at(occurred_at)
            .build())
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn status(&self) -> EventStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// 载荷中的 `type` 标签
    pub fn event_type(&self) -> Option<&str> {
        self.payload.get("type").and_then(Value::as_str)
    }

    /// 还原为具体事件类型
    pub fn decode<E: DomainEvent>(&self) -> DomainResult<E> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    pub fn set_status(&mut self, status: EventStatus, at: DateTime<Utc>) {
        self.status = status;
        self.updated_at = at;
    }
}

impl Entity for DomainEventRecord {
    type Id = Uuid;

    const TYPE: &'static str = "domain_event";

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_event::CaptureVerified;
    use crate::tree::{TreeId, TreeRecord, TreeUpdate, VerificationTransition};

    #[test]
    fn raised_record_wraps_event_payload() {
        let tree = TreeRecord::builder().id(TreeId::new(3)).build();
        let update = TreeUpdate::builder().approved(true).build();
        let transition = VerificationTransition::detect(&tree, &update).unwrap();
        let event = CaptureVerified::new(&tree, &update, transition, Utc::now());

        let record = DomainEventRecord::raise(&event).unwrap();
        assert_eq!(record.status(), EventStatus::Raised);
        assert_eq!(record.event_type(), Some("VerifyCaptureProcessed"));
        assert_eq!(record.created_at(), event.occurred_at());

        let decoded: CaptureVerified = record.decode().unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn status_round_trips_through_str() {
        assert_eq!("sent".parse::<EventStatus>().unwrap(), EventStatus::Sent);
        assert_eq!(EventStatus::Raised.to_string(), "raised");
        assert!("lost".parse::<EventStatus>().is_err());
    }
}
