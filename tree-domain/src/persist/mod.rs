//! 持久化（persist）
//!
//! 定义核验流程依赖的存储协议与其实现：
//! - 显式事务句柄（`TransactionManager`/`IsolationLevel`），参与同一原子单元的
//!   每个仓储操作都以参数形式接收事务句柄；
//! - 记录仓储（`TreeRepository`）、事件日志仓储（`DomainEventRepository`）与
//!   只读查询仓储（`TreeQueryRepository`）；
//! - 合成过滤字段（`tagId`/`organizationId`）到 SQL 连接的翻译（`TreeFilter`）；
//! - 内存实现（`InMemoryTreeStore`）与 Postgres 实现（`infra-sqlx` 特性）。
//!
mod domain_event_repository;
mod inmemory;
#[cfg(feature = "infra-sqlx")]
mod postgres;
mod transaction;
mod tree_filter;
mod tree_repository;

pub use domain_event_repository::DomainEventRepository;
pub use inmemory::{InMemoryTreeStore, InMemoryTx};
#[cfg(feature = "infra-sqlx")]
pub use postgres::{
    PgDomainEventRepository, PgTransactionManager, PgTreeQueryRepository, PgTreeRepository,
};
pub use transaction::{IsolationLevel, TransactionManager};
pub use tree_filter::{FilterSql, FilterValue, SortDirection, TagFilter, TreeFilter, TreeSortField};
pub use tree_repository::{TreeQueryRepository, TreeRepository};
