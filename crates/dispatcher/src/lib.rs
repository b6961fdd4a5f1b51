//! # Dispatcher
//!
//! 信号事件分发模块。
//!
//! 负责：
//! - 事件通道：超时后重试同一事件直到成功 (at-least-once)
//! - 原始帧通道：单次尝试，超时即丢弃
//! - 发送计数与失败计数

pub mod channel;
pub mod dispatcher;
pub mod error;
pub mod metrics;

pub use channel::CrossbeamChannel;
pub use contracts::{ChannelError, OutputChannel};
pub use dispatcher::{Delivery, EventDispatcher, EventDispatcherBuilder};
pub use error::DispatchError;
pub use metrics::{ChannelMetrics, MetricsSnapshot};
