use tree_domain::{error::DomainError, tree::TreeId};

/// 应用层错误：读取与写入失败分开上报，调用方据此判断是否发生过写入
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// 读取失败：尚未发生任何写入
    #[error("load failed: {source}")]
    Load { source: DomainError },

    /// 写入或提交失败：事务已回滚
    #[error("write failed: {source}")]
    Write { source: DomainError },

    #[error("tree not found: {0}")]
    TreeNotFound(TreeId),

    #[error("validation: {0}")]
    Validation(String),
}
