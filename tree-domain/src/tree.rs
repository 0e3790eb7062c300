//! 树木采集记录（TreeRecord）与核验状态判定
//!
//! - `TreeRecord`：记录仓储持有的树木采集记录；
//! - `TreeUpdate`：部分更新载荷，缺省字段保持不变；
//! - `VerificationTransition`：基于更新前状态判定本次更新是否构成核验状态变迁。
//!
use crate::{entity::Entity, error::DomainError};
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// 树木记录的内部标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TreeId(i64);

impl TreeId {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl From<i64> for TreeId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TreeId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse::<i64>()?))
    }
}

/// 树木采集记录
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct TreeRecord {
    id: TreeId,
    /// 对外暴露的 UUID
    #[builder(default = Uuid::new_v4())]
    uuid: Uuid,
    #[builder(default = true)]
    active: bool,
    /// 三态：已通过 / 已驳回 / 未核验
    approved: Option<bool>,
    #[builder(into)]
    rejection_reason: Option<String>,
    planter_id: Option<i64>,
    planting_organization_id: Option<i64>,
    species_id: Option<i64>,
    #[builder(default = Utc::now())]
    time_created: DateTime<Utc>,
    #[builder(default = Utc::now())]
    time_updated: DateTime<Utc>,
}

impl TreeRecord {
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn active(&self) -> bool {
        self.active
    }

    pub fn approved(&self) -> Option<bool> {
        self.approved
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn planter_id(&self) -> Option<i64> {
        self.planter_id
    }

    pub fn planting_organization_id(&self) -> Option<i64> {
        self.planting_organization_id
    }

    pub fn species_id(&self) -> Option<i64> {
        self.species_id
    }

    pub fn time_created(&self) -> DateTime<Utc> {
        self.time_created
    }

    pub fn time_updated(&self) -> DateTime<Utc> {
        self.time_updated
    }

    /// 将部分更新应用到记录，仅覆盖载荷中出现的字段
    pub fn apply(&mut self, update: &TreeUpdate, at: DateTime<Utc>) {
        if let Some(active) = update.active {
            self.active = active;
        }
        if let Some(approved) = update.approved {
            self.approved = Some(approved);
        }
        if let Some(reason) = &update.rejection_reason {
            self.rejection_reason = Some(reason.clone());
        }
        if let Some(species_id) = update.species_id {
            self.species_id = Some(species_id);
        }
        self.time_updated = at;
    }
}

impl Entity for TreeRecord {
    type Id = TreeId;

    const TYPE: &'static str = "tree";

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// 部分更新载荷（缺省字段表示不修改）
#[derive(Debug, Clone, Default, PartialEq, Builder, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved: Option<bool>,
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub species_id: Option<i64>,
}

/// 核验状态变迁
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationTransition {
    /// 仍处于活跃状态的记录被驳回（approved=false 且 active=false）
    Rejected,
    /// approved 取值发生变化（任意方向）
    ApprovalChanged { from: Option<bool>, to: bool },
}

impl VerificationTransition {
    /// 以更新前的记录状态判定是否需要产生核验事件。
    ///
    /// 两个条件同时满足时也只产生一次变迁；载荷未携带 `approved` 时不视为翻转。
    pub fn detect(stored: &TreeRecord, incoming: &TreeUpdate) -> Option<Self> {
        let rejected =
            stored.active && incoming.approved == Some(false) && incoming.active == Some(false);
        if rejected {
            return Some(Self::Rejected);
        }

        match incoming.approved {
            Some(to) if stored.approved != Some(to) => Some(Self::ApprovalChanged {
                from: stored.approved,
                to,
            }),
            _ => None,
        }
    }

    /// 变迁后的核验结果
    pub fn approved(&self) -> bool {
        match self {
            Self::Rejected => false,
            Self::ApprovalChanged { to, .. } => *to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(active: bool, approved: Option<bool>) -> TreeRecord {
        TreeRecord::builder()
            .id(TreeId::new(1))
            .active(active)
            .maybe_approved(approved)
            .build()
    }

    fn incoming(active: Option<bool>, approved: Option<bool>) -> TreeUpdate {
        TreeUpdate::builder()
            .maybe_active(active)
            .maybe_approved(approved)
            .build()
    }

    #[test]
    fn rejecting_an_active_unverified_tree_is_a_transition() {
        let t = VerificationTransition::detect(
            &stored(true, None),
            &incoming(Some(false), Some(false)),
        );
        assert_eq!(t, Some(VerificationTransition::Rejected));
        assert!(!t.unwrap().approved());
    }

    #[test]
    fn rejecting_an_already_rejected_active_tree_still_raises() {
        let t = VerificationTransition::detect(
            &stored(true, Some(false)),
            &incoming(Some(false), Some(false)),
        );
        assert_eq!(t, Some(VerificationTransition::Rejected));
    }

    #[test]
    fn any_approval_flip_is_a_transition() {
        let cases = [
            (None, true),
            (None, false),
            (Some(true), false),
            (Some(false), true),
        ];
        for (from, to) in cases {
            let t = VerificationTransition::detect(&stored(false, from), &incoming(None, Some(to)));
            assert_eq!(t, Some(VerificationTransition::ApprovalChanged { from, to }));
            assert_eq!(t.unwrap().approved(), to);
        }
    }

    #[test]
    fn unchanged_approval_is_not_a_transition() {
        assert_eq!(
            VerificationTransition::detect(&stored(true, Some(true)), &incoming(Some(true), Some(true))),
            None
        );
        // 已停用的记录再次驳回：不满足驳回条件，approved 也未变化
        assert_eq!(
            VerificationTransition::detect(
                &stored(false, Some(false)),
                &incoming(Some(false), Some(false))
            ),
            None
        );
    }

    #[test]
    fn update_without_approved_is_not_a_transition() {
        let update = TreeUpdate::builder().species_id(7).build();
        assert_eq!(VerificationTransition::detect(&stored(true, Some(true)), &update), None);
        assert_eq!(VerificationTransition::detect(&stored(true, None), &update), None);
    }

    #[test]
    fn apply_only_touches_present_fields() {
        let mut tree = TreeRecord::builder()
            .id(TreeId::new(9))
            .species_id(3)
            .rejection_reason("blurry")
            .build();
        let at = Utc::now();
        tree.apply(&TreeUpdate::builder().approved(true).build(), at);

        assert_eq!(tree.approved(), Some(true));
        assert!(tree.active());
        assert_eq!(tree.species_id(), Some(3));
        assert_eq!(tree.rejection_reason(), Some("blurry"));
        assert_eq!(tree.time_updated(), at);
    }

    #[test]
    fn update_payload_uses_camel_case() {
        let update: TreeUpdate = serde_json::from_value(serde_json::json!({
            "active": false,
            "approved": false,
            "rejectionReason": "pest"
        }))
        .unwrap();
        assert_eq!(update.rejection_reason.as_deref(), Some("pest"));
        assert_eq!(update.species_id, None);
    }

    #[test]
    fn tree_id_parses_from_str() {
        assert_eq!("42".parse::<TreeId>().unwrap(), TreeId::new(42));
        assert!("x".parse::<TreeId>().is_err());
    }
}
