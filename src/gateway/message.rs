//! 网关消息协议定义
//!
//! 每个文本帧是一条 JSON：`{"event": "<kind>", "data": {...}}`。
//! 入站三种：user_metadata / user_log / explanation_request；出站一种：explanation_receival。

use serde::{Deserialize, Serialize};

use crate::core::session::{LogRecord, SessionMetadata};

/// 入站事件
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum InboundEvent {
    /// 合并除 logs 外的所有字段
    UserMetadata(MetadataPayload),
    /// 追加一条日志，RULE 类型时尝试解释
    UserLog(LogPayload),
    /// 按需请求解释
    ExplanationRequest(RequestPayload),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(flatten)]
    pub metadata: SessionMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<LogRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// 出站事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutboundEvent {
    ExplanationReceival { user_id: String, explanation: String },
}

impl InboundEvent {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            InboundEvent::UserMetadata(p) => p.user_id.as_deref(),
            InboundEvent::UserLog(p) => p.user_id.as_deref(),
            InboundEvent::ExplanationRequest(p) => p.user_id.as_deref(),
        }
    }
}
