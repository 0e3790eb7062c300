/// 应用层命令（Command）
///
/// 表达“意图”的写操作请求，通常会修改领域状态。
/// - 与 [`Query`](crate::query::Query) 相对，`Command` 应避免读写混用；
/// - `Output` 仅承载执行结果（如本次产生的事件与其投递状态），不做查询用途。
///
/// 关联常量：
/// - `NAME`：命令的稳定名称，用于日志与追踪。避免依赖 `type_name::<T>()`。
pub trait Command: Send + Sync + 'static {
    /// 命令的稳定名称（建议常量字符串，不随重构变化）
    const NAME: &'static str;

    /// 执行结果
    type Output: Send;
}
