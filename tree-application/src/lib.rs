//! 树木核验应用层（tree-application）
//!
//! 以命令/查询的形式编排领域层构件：
//! - `update_tree`：更新记录并在核验状态变迁时产生、投递领域事件；
//! - `tree_queries`：按合成过滤条件查询、计数与按标识读取记录；
//! - `config`：环境变量配置（含事件投递开关）。
//!
pub mod command;
pub mod command_handler;
pub mod config;
pub mod context;
pub mod dto;
pub mod error;
pub mod query;
pub mod query_handler;
pub mod tree_queries;
pub mod update_tree;
