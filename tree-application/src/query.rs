use crate::dto::Dto;

/// 应用层查询（Query）
///
/// 只读请求，不修改领域状态；`Dto` 为面向接口层的返回类型。
pub trait Query: Send + Sync + 'static {
    const NAME: &'static str;

    type Dto: Dto;
}
