//! 事件子系统（eventing）
//!
//! - `EventBus`：统一的事件发布协议，`publish` 返回 `Ok` 即视为下游确认；
//! - `InMemoryEventBus`：基于 broadcast 的内存实现（`eventing` 特性）。
//!
//! 该模块仅定义协议，不绑定具体传输实现，可对接任意消息系统。
//!
pub mod bus;
#[cfg(feature = "eventing")]
pub mod bus_inmemory;

pub use bus::EventBus;
#[cfg(feature = "eventing")]
pub use bus_inmemory::InMemoryEventBus;
