//! Explainer - 规则触发的解释服务
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 会话模型、解释语料、解析器、采样、会话存储
//! - **gateway**: WebSocket 持久连接绑定
//! - **integrations**: REST 请求/响应绑定
//! - **observability**: 日志初始化

pub mod config;
pub mod core;
#[cfg(feature = "gateway")]
pub mod gateway;
pub mod integrations;
pub mod observability;

pub use crate::core::{ExplanationResolver, Resolution};
