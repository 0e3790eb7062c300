use bon::Builder;

/// 应用层上下文（Application Context）
///
/// 承载一次应用层调用（命令/查询）所需的横切信息，写入日志 span：
/// - `correlation_id`：关联追踪；
/// - `actor_id`：发起操作的主体（如核验人员）。
///
/// ```rust
/// use tree_application::context::AppContext;
///
/// let ctx = AppContext::builder()
///     .correlation_id("cor-123")
///     .actor_id("admin-7")
///     .build();
/// assert_eq!(ctx.correlation_id(), Some("cor-123"));
/// ```
#[derive(Builder, Clone, Debug, Default)]
pub struct AppContext {
    #[builder(into)]
    correlation_id: Option<String>,
    #[builder(into)]
    actor_id: Option<String>,
}

impl AppContext {
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn actor_id(&self) -> Option<&str> {
        self.actor_id.as_deref()
    }
}
