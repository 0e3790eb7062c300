//! 树木核验领域层（tree-domain）
//!
//! 提供树木采集记录（`tree`）核验流程所需的领域抽象与构件：
//! - 实体（`entity`）与树木记录、部分更新及核验状态判定（`tree`）
//! - 领域事件（`domain_event`）：事件载荷、事件日志记录与投递状态
//! - 持久化（`persist`）：显式事务句柄、记录/事件/查询仓储协议、过滤条件翻译，
//!   以及内存实现与可选的 Postgres 实现（`infra-sqlx`）
//! - 事件系统（`eventing`）：事件总线协议与内存总线
//!
//! 本 crate 只定义领域层接口与最小必要的错误类型，具体基础设施由上层注入。
//!
pub mod domain_event;
pub mod entity;
pub mod error;
pub mod eventing;
pub mod persist;
pub mod tree;
