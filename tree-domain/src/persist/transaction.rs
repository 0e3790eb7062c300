//! 显式事务句柄
//!
//! 以所有权传递的事务句柄替代环境中隐式传播的事务对象：
//! `begin` 产出句柄，仓储操作借用 `&mut Tx`，`commit`/`rollback` 消费句柄。
//!
use crate::error::DomainResult as Result;
use async_trait::async_trait;
use std::fmt;

/// 事务隔离级别
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// 事务管理器：开启、提交与回滚显式事务
#[async_trait]
pub trait TransactionManager: Send + Sync {
    /// 事务句柄类型
    type Tx: Send + 'static;

    async fn begin(&self, isolation: IsolationLevel) -> Result<Self::Tx>;

    async fn commit(&self, tx: Self::Tx) -> Result<()>;

    async fn rollback(&self, tx: Self::Tx) -> Result<()>;
}
