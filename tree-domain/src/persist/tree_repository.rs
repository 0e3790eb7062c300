use crate::{
    error::DomainResult as Result,
    persist::TreeFilter,
    tree::{TreeId, TreeRecord, TreeUpdate},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// 记录仓储：在显式事务内读取与更新树木记录
#[async_trait]
pub trait TreeRepository<Tx: Send>: Send + Sync {
    async fn find_by_id(&self, tx: &mut Tx, id: TreeId) -> Result<Option<TreeRecord>>;

    /// 应用部分更新；记录不存在时返回 `NotFound`
    async fn apply_update(
        &self,
        tx: &mut Tx,
        id: TreeId,
        update: &TreeUpdate,
        at: DateTime<Utc>,
    ) -> Result<()>;
}

/// 只读查询仓储（事务外，读取已提交数据）
#[async_trait]
pub trait TreeQueryRepository: Send + Sync {
    async fn find(&self, filter: &TreeFilter) -> Result<Vec<TreeRecord>>;

    async fn count(&self, filter: &TreeFilter) -> Result<u64>;

    async fn get(&self, id: TreeId) -> Result<Option<TreeRecord>>;
}
