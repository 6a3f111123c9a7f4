//! 会话存储抽象层
//!
//! user_id -> SessionSnapshot。传输层在每个入站事件上修改存储，解析器只读。
//! 对同一用户的写入在锁内完成，读者只会看到完整的快照。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::session::{LogRecord, SessionMetadata, SessionSnapshot};

/// 会话存储接口
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// 获取用户快照（克隆）
    async fn get(&self, user_id: &str) -> Option<SessionSnapshot>;

    /// 整体替换用户快照
    async fn replace(&self, user_id: &str, snapshot: SessionSnapshot);

    /// 合并元数据（不存在则创建）
    async fn merge_metadata(&self, user_id: &str, metadata: SessionMetadata);

    /// 追加日志（不存在则创建）
    async fn append_log(&self, user_id: &str, log: LogRecord);

    /// 用户是否存在
    async fn contains(&self, user_id: &str) -> bool;

    /// 已知用户数
    async fn user_count(&self) -> usize;
}

/// 内存会话存储
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SessionSnapshot>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, user_id: &str) -> Option<SessionSnapshot> {
        self.sessions.read().await.get(user_id).cloned()
    }

    async fn replace(&self, user_id: &str, snapshot: SessionSnapshot) {
        self.sessions
            .write()
            .await
            .insert(user_id.to_string(), snapshot);
    }

    async fn merge_metadata(&self, user_id: &str, metadata: SessionMetadata) {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(user_id.to_string())
            .or_default()
            .apply_metadata(metadata);
    }

    async fn append_log(&self, user_id: &str, log: LogRecord) {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(user_id.to_string())
            .or_default()
            .append_log(log);
    }

    async fn contains(&self, user_id: &str) -> bool {
        self.sessions.read().await.contains_key(user_id)
    }

    async fn user_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_append_creates_user() {
        let store = MemorySessionStore::new();
        store.append_log("u1", LogRecord::rule("greet_rule")).await;

        let snapshot = store.get("u1").await.unwrap();
        assert_eq!(snapshot.logs.len(), 1);
        assert_eq!(snapshot.current_task, None);
    }

    #[tokio::test]
    async fn test_metadata_merge_preserves_logs() {
        let store = MemorySessionStore::new();
        store.append_log("u1", LogRecord::rule("greet_rule")).await;
        store
            .merge_metadata(
                "u1",
                SessionMetadata {
                    current_task: Some("greet".to_string()),
                    ..Default::default()
                },
            )
            .await;

        let snapshot = store.get("u1").await.unwrap();
        assert_eq!(snapshot.current_task.as_deref(), Some("greet"));
        assert_eq!(snapshot.rule_occurrences(), 1);
    }

    #[tokio::test]
    async fn test_replace_overwrites() {
        let store = MemorySessionStore::new();
        store.append_log("u1", LogRecord::rule("greet_rule")).await;
        store.replace("u1", SessionSnapshot::with_task("warn")).await;

        let snapshot = store.get("u1").await.unwrap();
        assert!(snapshot.logs.is_empty());
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_not_lost() {
        let store = Arc::new(MemorySessionStore::new());
        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.append_log("u1", LogRecord::rule("greet_rule")).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let snapshot = store.get("u1").await.unwrap();
        assert_eq!(snapshot.logs.len(), 50);
    }
}
