use crate::{
    domain_event::DomainEvent,
    entity::Entity,
    tree::{TreeId, TreeRecord, TreeUpdate, VerificationTransition},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 采集记录核验完成事件
///
/// 序列化形态：
/// `{"type":"VerifyCaptureProcessed","id":<uuid>,"reference_id":<id>,"approved":<bool>,"rejection_reason":<str|null>,"created_at":<rfc3339>}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureVerified {
    #[serde(rename = "type")]
    event_type: String,
    /// 记录对外 UUID
    id: Uuid,
    /// 记录内部标识
    reference_id: TreeId,
    approved: bool,
    rejection_reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl CaptureVerified {
    /// 由更新前的记录、更新载荷与判定出的变迁构造事件
    pub fn new(
        tree: &TreeRecord,
        update: &TreeUpdate,
        transition: VerificationTransition,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type: Self::EVENT_TYPE.to_string(),
            id: tree.uuid(),
            reference_id: *tree.id(),
            approved: transition.approved(),
            rejection_reason: update.rejection_reason.clone(),
            created_at,
        }
    }

    pub fn tree_uuid(&self) -> Uuid {
        self.id
    }

    pub fn reference_id(&self) -> TreeId {
        self.reference_id
    }

    pub fn approved(&self) -> bool {
        self.approved
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }
}

impl DomainEvent for CaptureVerified {
    const EVENT_TYPE: &'static str = "VerifyCaptureProcessed";

    fn occurred_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_shape_matches_consumers() {
        let tree = TreeRecord::builder()
            .id(TreeId::new(12))
            .active(true)
            .build();
        let update = TreeUpdate::builder()
            .active(false)
            .approved(false)
            .rejection_reason("pest")
            .build();
        let event = CaptureVerified::new(&tree, &update, VerificationTransition::Rejected, Utc::now());

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "VerifyCaptureProcessed");
        assert_eq!(json["id"], tree.uuid().to_string());
        assert_eq!(json["reference_id"], 12);
        assert_eq!(json["approved"], false);
        assert_eq!(json["rejection_reason"], "pest");
        assert!(json["created_at"].is_string());
    }
}
