//! 入站事件分发
//!
//! 把事件合并进会话存储，必要时调用解析器，返回需要广播的出站事件。
//! 与具体连接无关，便于单独测试。

use std::sync::Arc;

use super::message::{InboundEvent, OutboundEvent};
use crate::core::resolver::ExplanationResolver;
use crate::core::session_store::SessionStore;

#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn SessionStore>,
    resolver: Arc<ExplanationResolver>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn SessionStore>, resolver: Arc<ExplanationResolver>) -> Self {
        Self { store, resolver }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// 处理一条入站事件；返回 Some 时应向所有连接广播
    pub async fn handle(&self, event: InboundEvent) -> Option<OutboundEvent> {
        let Some(user_id) = event
            .user_id()
            .filter(|id| !id.is_empty())
            .map(str::to_string)
        else {
            tracing::debug!("Ignoring event without user_id");
            return None;
        };

        match event {
            InboundEvent::UserMetadata(payload) => {
                self.store.merge_metadata(&user_id, payload.metadata).await;
                tracing::info!("Received metadata for user {}", user_id);
                None
            }

            InboundEvent::UserLog(payload) => {
                let Some(log) = payload.log else {
                    tracing::warn!("user_log for {} carries no log record", user_id);
                    return None;
                };
                let should_explain = log.is_rule();
                self.store.append_log(&user_id, log).await;

                if should_explain {
                    self.explain(&user_id).await
                } else {
                    None
                }
            }

            InboundEvent::ExplanationRequest(_) => self.explain(&user_id).await,
        }
    }

    async fn explain(&self, user_id: &str) -> Option<OutboundEvent> {
        let resolution = self
            .resolver
            .resolve_user(user_id, self.store.as_ref())
            .await;

        resolution.available.then(|| OutboundEvent::ExplanationReceival {
            user_id: user_id.to_string(),
            explanation: resolution.explanation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::corpus::ExplanationCorpus;
    use crate::core::session_store::MemorySessionStore;

    fn dispatcher() -> Dispatcher {
        let corpus = ExplanationCorpus::from_json(
            r#"{"low": {"first": {"warn": "soft"}}}"#,
            r#"{"greet_static": "Hi Alice", "warn_treatment_soft": "Careful"}"#,
        )
        .unwrap();
        Dispatcher::new(
            Arc::new(MemorySessionStore::new()),
            Arc::new(ExplanationResolver::new(Arc::new(corpus))),
        )
    }

    fn event(text: &str) -> InboundEvent {
        serde_json::from_str(text).unwrap()
    }

    #[tokio::test]
    async fn test_metadata_then_rule_log_emits() {
        let d = dispatcher();

        let out = d
            .handle(event(r#"{"event":"user_metadata","data":{"user_id":"u1","current_task":"greet","environment":[{"name":"Condition","value":1},{"name":"User_Name","value":"Eve"}]}}"#))
            .await;
        assert_eq!(out, None);

        let out = d
            .handle(event(r#"{"event":"user_log","data":{"user_id":"u1","log":{"type":"RULE","rule_id":"greet_rule"}}}"#))
            .await;
        assert_eq!(
            out,
            Some(OutboundEvent::ExplanationReceival {
                user_id: "u1".to_string(),
                explanation: "Hi Eve".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_non_rule_log_is_stored_silently() {
        let d = dispatcher();
        let out = d
            .handle(event(r#"{"event":"user_log","data":{"user_id":"u1","log":{"type":"CLICK"}}}"#))
            .await;
        assert_eq!(out, None);

        let snapshot = d.store().get("u1").await.unwrap();
        assert_eq!(snapshot.logs.len(), 1);
    }

    #[tokio::test]
    async fn test_metadata_does_not_touch_logs() {
        let d = dispatcher();
        d.handle(event(r#"{"event":"user_log","data":{"user_id":"u1","log":{"type":"RULE","rule_id":"greet_rule"}}}"#))
            .await;
        d.handle(event(r#"{"event":"user_metadata","data":{"user_id":"u1","current_task":"greet","logs":[]}}"#))
            .await;

        let snapshot = d.store().get("u1").await.unwrap();
        assert_eq!(snapshot.logs.len(), 1);
        assert_eq!(snapshot.current_task.as_deref(), Some("greet"));
    }

    #[tokio::test]
    async fn test_request_for_unknown_user_is_silent() {
        let d = dispatcher();
        let out = d
            .handle(event(r#"{"event":"explanation_request","data":{"user_id":"ghost"}}"#))
            .await;
        assert_eq!(out, None);
        assert_eq!(d.store().user_count().await, 0);
    }

    #[tokio::test]
    async fn test_event_without_user_is_ignored() {
        let d = dispatcher();
        let out = d
            .handle(event(r#"{"event":"user_log","data":{"log":{"type":"RULE","rule_id":"greet_rule"}}}"#))
            .await;
        assert_eq!(out, None);
        assert_eq!(d.store().user_count().await, 0);
    }

    #[tokio::test]
    async fn test_event_with_empty_user_is_ignored() {
        let d = dispatcher();
        let out = d
            .handle(event(r#"{"event":"user_metadata","data":{"user_id":"","current_task":"greet"}}"#))
            .await;
        assert_eq!(out, None);

        let out = d
            .handle(event(r#"{"event":"user_log","data":{"user_id":"","log":{"type":"RULE","rule_id":"greet_rule"}}}"#))
            .await;
        assert_eq!(out, None);
        assert_eq!(d.store().user_count().await, 0);
    }

    #[tokio::test]
    async fn test_request_resolves_treatment() {
        let d = dispatcher();
        d.handle(event(r#"{"event":"user_metadata","data":{"user_id":"u2","current_task":"warn","environment":[{"name":"Condition","value":2},{"name":"Technical_Interest","value":"low"}]}}"#))
            .await;
        d.handle(event(r#"{"event":"user_log","data":{"user_id":"u2","log":{"type":"RULE","rule_id":"warn_rule"}}}"#))
            .await;

        let out = d
            .handle(event(r#"{"event":"explanation_request","data":{"user_id":"u2"}}"#))
            .await;
        assert_eq!(
            out,
            Some(OutboundEvent::ExplanationReceival {
                user_id: "u2".to_string(),
                explanation: "Careful".to_string(),
            })
        );
    }
}
