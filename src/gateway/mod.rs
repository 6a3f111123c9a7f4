//! 持久连接网关（WebSocket）
//!
//! - **hub**: 监听、连接管理、广播
//! - **dispatcher**: 入站事件 -> 会话存储 / 解析器 -> 出站事件
//! - **message**: 事件协议

mod dispatcher;
mod hub;
mod message;

pub use dispatcher::Dispatcher;
pub use hub::{GatewayError, Hub, HubConfig};
pub use message::{InboundEvent, LogPayload, MetadataPayload, OutboundEvent, RequestPayload};
