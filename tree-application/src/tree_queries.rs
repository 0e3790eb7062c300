//! 树木记录只读查询
//!
//! `FindTrees`/`CountTrees` 接受合成过滤条件（标签、组织树），
//! `GetTree` 按标识读取，记录不存在时返回 `TreeNotFound`。
//!
use crate::{
    context::AppContext, dto::TreeDto, error::AppError, query::Query,
    query_handler::QueryHandler,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use tree_domain::{
    persist::{TreeFilter, TreeQueryRepository},
    tree::TreeId,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindTrees {
    pub filter: TreeFilter,
}

impl FindTrees {
    /// 由请求中的 `where` 对象构造
    pub fn from_where(value: &Value) -> Result<Self, AppError> {
        let filter =
            TreeFilter::from_where(value).map_err(|e| AppError::Validation(e.to_string()))?;
        Ok(Self { filter })
    }
}

impl Query for FindTrees {
    const NAME: &'static str = "FindTrees";

    type Dto = Vec<TreeDto>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountTrees {
    pub filter: TreeFilter,
}

impl Query for CountTrees {
    const NAME: &'static str = "CountTrees";

    type Dto = u64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetTree {
    pub id: TreeId,
}

impl Query for GetTree {
    const NAME: &'static str = "GetTree";

    type Dto = TreeDto;
}

/// 查询服务：三个查询共用一个只读仓储
#[derive(Clone)]
pub struct TreeQueryService {
    trees: Arc<dyn TreeQueryRepository>,
}

impl TreeQueryService {
    pub fn new(trees: Arc<dyn TreeQueryRepository>) -> Self {
        Self { trees }
    }
}

#[async_trait]
impl QueryHandler<FindTrees> for TreeQueryService {
    async fn handle(&self, _ctx: &AppContext, query: FindTrees) -> Result<Vec<TreeDto>, AppError> {
        let trees = self
            .trees
            .find(&query.filter)
            .await
            .map_err(|source| AppError::Load { source })?;
        debug!(query = FindTrees::NAME, found = trees.len());

        Ok(trees.iter().map(TreeDto::from).collect())
    }
}

#[async_trait]
impl QueryHandler<CountTrees> for TreeQueryService {
    async fn handle(&self, _ctx: &AppContext, query: CountTrees) -> Result<u64, AppError> {
        self.trees
            .count(&query.filter)
            .await
            .map_err(|source| AppError::Load { source })
    }
}

#[async_trait]
impl QueryHandler<GetTree> for TreeQueryService {
    async fn handle(&self, _ctx: &AppContext, query: GetTree) -> Result<TreeDto, AppError> {
        let tree = self
            .trees
            .get(query.id)
            .await
            .map_err(|source| AppError::Load { source })?
            .ok_or(AppError::TreeNotFound(query.id))?;

        Ok(TreeDto::from(&tree))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tree_domain::persist::{InMemoryTreeStore, TagFilter};
    use tree_domain::tree::TreeRecord;

    fn seeded() -> (InMemoryTreeStore, TreeQueryService) {
        let store = InMemoryTreeStore::new();
        for id in 1..=4 {
            store
                .insert_tree(
                    TreeRecord::builder()
                        .id(TreeId::new(id))
                        .active(id % 2 == 1)
                        .build(),
                )
                .unwrap();
        }
        store.tag_tree(TreeId::new(3), 9).unwrap();
        let service = TreeQueryService::new(Arc::new(store.clone()));
        (store, service)
    }

    #[tokio::test]
    async fn find_and_count_apply_the_same_filter() {
        let (_store, service) = seeded();
        let ctx = AppContext::default();
        let filter = TreeFilter::builder().active(true).build();

        let found = service
            .handle(&ctx, FindTrees { filter: filter.clone() })
            .await
            .unwrap();
        let ids: Vec<i64> = found.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 3]);

        let count = service.handle(&ctx, CountTrees { filter }).await.unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn where_object_with_null_tag_finds_untagged() {
        let (_store, service) = seeded();
        let query = FindTrees::from_where(&json!({ "tagId": null })).unwrap();
        assert_eq!(query.filter.tag, Some(TagFilter::Untagged));

        let found = service.handle(&AppContext::default(), query).await.unwrap();
        assert_eq!(found.len(), 3);
        assert!(found.iter().all(|t| t.id != 3));
    }

    #[test]
    fn malformed_where_is_a_validation_error() {
        let err = FindTrees::from_where(&json!({ "tagId": "x" })).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn get_reports_missing_tree() {
        let (_store, service) = seeded();
        let ctx = AppContext::default();

        let dto = service
            .handle(&ctx, GetTree { id: TreeId::new(2) })
            .await
            .unwrap();
        assert_eq!(dto.id, 2);
        assert!(!dto.active);

        let err = service
            .handle(&ctx, GetTree { id: TreeId::new(99) })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TreeNotFound(id) if id == TreeId::new(99)));
    }

    #[tokio::test]
    async fn storage_failure_maps_to_load_error() {
        let (store, service) = seeded();
        store.fail_loads(true);

        let err = service
            .handle(&AppContext::default(), CountTrees::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Load { .. }));
    }
}
