use chrono::{DateTime, Utc};
use serde::Serialize;
use tree_domain::{entity::Entity, tree::TreeRecord};
use uuid::Uuid;

/// 数据传输对象（DTO）
///
/// - 作为应用层的输出载体，面向接口/外部系统序列化友好；
/// - 与领域模型解耦，避免将领域对象直接暴露到接口层。
pub trait Dto: Serialize + Send + Sync + 'static {}

/// 树木记录的对外视图（camelCase）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeDto {
    pub id: i64,
    pub uuid: Uuid,
    pub active: bool,
    pub approved: Option<bool>,
    pub rejection_reason: Option<String>,
    pub planter_id: Option<i64>,
    pub planting_organization_id: Option<i64>,
    pub species_id: Option<i64>,
    pub time_created: DateTime<Utc>,
    pub time_updated: DateTime<Utc>,
}

impl Dto for TreeDto {}

/// 列表查询结果
impl<T: Dto> Dto for Vec<T> {}

/// 计数查询结果
impl Dto for u64 {}

impl From<&TreeRecord> for TreeDto {
    fn from(tree: &TreeRecord) -> Self {
        Self {
            id: tree.id().value(),
            uuid: tree.uuid(),
            active: tree.active(),
            approved: tree.approved(),
            rejection_reason: tree.rejection_reason().map(str::to_string),
            planter_id: tree.planter_id(),
            planting_organization_id: tree.planting_organization_id(),
            species_id: tree.species_id(),
            time_created: tree.time_created(),
            time_updated: tree.time_updated(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use tree_domain::tree::TreeId;

    fn render<D: Dto>(dto: &D) -> Value {
        serde_json::to_value(dto).unwrap()
    }

    #[test]
    fn query_results_serialize_as_camel_case_json() {
        let tree = TreeRecord::builder()
            .id(TreeId::new(9))
            .approved(false)
            .rejection_reason("pest")
            .build();

        let list = render(&vec![TreeDto::from(&tree)]);
        assert_eq!(list[0]["id"], json!(9));
        assert_eq!(list[0]["approved"], json!(false));
        assert_eq!(list[0]["rejectionReason"], json!("pest"));
        assert!(list[0].get("plantingOrganizationId").is_some());

        assert_eq!(render(&3u64), json!(3));
    }
}
