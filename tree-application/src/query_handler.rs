use crate::{context::AppContext, error::AppError, query::Query};
use async_trait::async_trait;

/// 查询处理器：只读取已提交数据，存储失败统一映射为 `AppError::Load`
#[async_trait]
pub trait QueryHandler<Q>: Send + Sync
where
    Q: Query,
{
    async fn handle(&self, ctx: &AppContext, query: Q) -> Result<Q::Dto, AppError>;
}
