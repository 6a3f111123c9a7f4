//! REST 绑定（请求/响应）
//!
//! - `POST /engine/logger`：用载荷整体替换用户快照，并内联返回解析结果
//! - `POST /engine/explanation`：对已存储的用户解析，不修改存储
//! - `GET /health`

use std::sync::Arc;

use axum::{extract::State, routing::{get, post}, Json, Router};
use serde::{Deserialize, Serialize};

use crate::core::resolver::ExplanationResolver;
use crate::core::session::SessionSnapshot;
use crate::core::session_store::SessionStore;

/// REST 服务状态
pub struct RestState {
    pub store: Arc<dyn SessionStore>,
    pub resolver: Arc<ExplanationResolver>,
}

/// /engine/logger 请求体：user_id 以外的字段即完整快照
#[derive(Debug, Deserialize)]
pub struct LoggerPayload {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(flatten)]
    pub snapshot: SessionSnapshot,
}

/// /engine/explanation 请求体
#[derive(Debug, Deserialize)]
pub struct ExplanationQuery {
    #[serde(default)]
    pub user_id: Option<String>,
}

/// 两个端点共用的响应体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplanationResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub show_explanation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl ExplanationResponse {
    fn hidden(user_id: Option<String>) -> Self {
        Self {
            success: true,
            user_id,
            show_explanation: false,
            explanation: None,
        }
    }

    fn shown(user_id: Option<String>, explanation: String) -> Self {
        Self {
            success: true,
            user_id,
            show_explanation: true,
            explanation: Some(explanation),
        }
    }
}

/// 创建 REST 路由
pub fn create_router(state: Arc<RestState>) -> Router {
    Router::new()
        .route("/engine/logger", post(logger))
        .route("/engine/explanation", post(explanation))
        .route("/health", get(|| async { "OK" }))
        .with_state(state)
}

/// POST /engine/logger
async fn logger(
    State(state): State<Arc<RestState>>,
    Json(payload): Json<LoggerPayload>,
) -> Json<ExplanationResponse> {
    let Some(user_id) = payload.user_id.filter(|id| !id.is_empty()) else {
        return Json(ExplanationResponse::hidden(None));
    };

    state.store.replace(&user_id, payload.snapshot).await;

    let resolution = state.resolver.resolve_user(&user_id, state.store.as_ref()).await;
    let response = if resolution.available {
        ExplanationResponse::shown(Some(user_id), resolution.explanation)
    } else {
        ExplanationResponse::hidden(Some(user_id))
    };
    Json(response)
}

/// POST /engine/explanation
async fn explanation(
    State(state): State<Arc<RestState>>,
    Json(query): Json<ExplanationQuery>,
) -> Json<ExplanationResponse> {
    let Some(user_id) = query.user_id.filter(|id| !id.is_empty()) else {
        return Json(ExplanationResponse::hidden(None));
    };

    let resolution = state.resolver.resolve_user(&user_id, state.store.as_ref()).await;
    if resolution.available {
        Json(ExplanationResponse::shown(None, resolution.explanation))
    } else {
        Json(ExplanationResponse::hidden(None))
    }
}
