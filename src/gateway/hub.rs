//! Hub - WebSocket 持久连接绑定
//!
//! 接受连接、解析入站事件并交给 Dispatcher；出站 explanation_receival
//! 广播给所有已连接的客户端，由客户端按 user_id 过滤。

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message as WsMessage;

use super::dispatcher::Dispatcher;
use super::message::{InboundEvent, OutboundEvent};

/// Hub 配置
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// WebSocket 监听地址
    pub bind_addr: String,
    /// 最大并发连接数
    pub max_connections: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5001".to_string(),
            max_connections: 1000,
        }
    }
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Invalid bind address: {0}")]
    InvalidAddress(String),

    #[error("Failed to bind: {0}")]
    Bind(#[from] std::io::Error),
}

type Connections = Arc<RwLock<HashMap<String, mpsc::UnboundedSender<String>>>>;

/// Hub（WebSocket 服务器）
pub struct Hub {
    config: HubConfig,
    dispatcher: Dispatcher,
    connections: Connections,
    shutdown: tokio::sync::watch::Sender<bool>,
}

impl Hub {
    pub fn new(config: HubConfig, dispatcher: Dispatcher) -> Self {
        let (shutdown_tx, _) = tokio::sync::watch::channel(false);
        Self {
            config,
            dispatcher,
            connections: Arc::new(RwLock::new(HashMap::new())),
            shutdown: shutdown_tx,
        }
    }

    /// 启动网关，返回实际监听地址
    pub async fn start(&self) -> Result<SocketAddr, GatewayError> {
        let addr: SocketAddr = self
            .config
            .bind_addr
            .parse()
            .map_err(|e| GatewayError::InvalidAddress(format!("{}: {}", self.config.bind_addr, e)))?;

        let listener = TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;

        tracing::info!("Gateway listening on ws://{}", local_addr);

        let mut shutdown_rx = self.shutdown.subscribe();
        let connections = Arc::clone(&self.connections);
        let dispatcher = self.dispatcher.clone();
        let max_connections = self.config.max_connections;
        // 计数包含握手中的连接
        let active = Arc::new(AtomicUsize::new(0));

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        // Err 表示 Hub 已被丢弃
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    result = listener.accept() => {
                        match result {
                            Ok((stream, addr)) => {
                                if active.fetch_add(1, Ordering::SeqCst) >= max_connections {
                                    active.fetch_sub(1, Ordering::SeqCst);
                                    tracing::warn!("Connection limit reached, rejecting {}", addr);
                                    drop(stream);
                                    continue;
                                }

                                let connections = Arc::clone(&connections);
                                let dispatcher = dispatcher.clone();
                                let active = Arc::clone(&active);

                                tokio::spawn(async move {
                                    if let Err(e) = handle_connection(stream, addr, connections, dispatcher).await {
                                        tracing::error!("Connection error from {}: {}", addr, e);
                                    }
                                    active.fetch_sub(1, Ordering::SeqCst);
                                });
                            }
                            Err(e) => {
                                tracing::error!("Accept error: {}", e);
                            }
                        }
                    }
                }
            }
        });

        Ok(local_addr)
    }

    /// 停止网关
    pub async fn stop(&self) {
        let _ = self.shutdown.send(true);
        self.connections.write().await.clear();
    }

    /// 获取活跃连接数
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

async fn broadcast(connections: &Connections, event: &OutboundEvent) {
    let json = match serde_json::to_string(event) {
        Ok(j) => j,
        Err(e) => {
            tracing::error!("Serialize error: {}", e);
            return;
        }
    };

    for tx in connections.read().await.values() {
        let _ = tx.send(json.clone());
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    connections: Connections,
    dispatcher: Dispatcher,
) -> Result<(), String> {
    let ws_stream = tokio_tungstenite::accept_async(stream)
        .await
        .map_err(|e| format!("WebSocket handshake failed: {}", e))?;

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let client_id = format!("ws_{}_{}", addr, uuid::Uuid::new_v4());
    connections.write().await.insert(client_id.clone(), tx);

    tracing::info!("Client connected: {}", addr);

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_tx.send(WsMessage::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = ws_rx.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("WebSocket receive error: {}", e);
                break;
            }
        };

        match msg {
            WsMessage::Text(text) => {
                let event: InboundEvent = match serde_json::from_str(&text) {
                    Ok(e) => e,
                    Err(e) => {
                        tracing::warn!("Unparseable event from {}: {}", addr, e);
                        continue;
                    }
                };

                if let Some(out) = dispatcher.handle(event).await {
                    broadcast(&connections, &out).await;
                }
            }

            WsMessage::Close(_) => {
                break;
            }

            _ => {}
        }
    }

    connections.write().await.remove(&client_id);
    writer.abort();

    tracing::info!("Client disconnected: {}", addr);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::corpus::ExplanationCorpus;
    use crate::core::resolver::ExplanationResolver;
    use crate::core::session_store::MemorySessionStore;
    use std::time::Duration;

    fn test_hub() -> Hub {
        test_hub_with_limit(10)
    }

    fn test_hub_with_limit(max_connections: usize) -> Hub {
        let corpus = ExplanationCorpus::from_json("{}", r#"{"greet_static": "Hello Alice"}"#).unwrap();
        let dispatcher = Dispatcher::new(
            Arc::new(MemorySessionStore::new()),
            Arc::new(ExplanationResolver::new(Arc::new(corpus))),
        );
        Hub::new(
            HubConfig {
                bind_addr: "127.0.0.1:0".to_string(),
                max_connections,
            },
            dispatcher,
        )
    }

    #[tokio::test]
    async fn test_invalid_bind_address() {
        let hub = Hub::new(
            HubConfig {
                bind_addr: "not-an-address".to_string(),
                max_connections: 1,
            },
            test_hub().dispatcher.clone(),
        );
        assert!(matches!(hub.start().await, Err(GatewayError::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn test_round_trip_over_websocket() {
        let hub = test_hub();
        let addr = hub.start().await.unwrap();

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}", addr))
            .await
            .unwrap();

        ws.send(WsMessage::Text(
            r#"{"event":"user_metadata","data":{"user_id":"u1","current_task":"greet","environment":[{"name":"Condition","value":1},{"name":"User_Name","value":"Max"}]}}"#.to_string(),
        ))
        .await
        .unwrap();
        ws.send(WsMessage::Text("not json".to_string())).await.unwrap();
        ws.send(WsMessage::Text(
            r#"{"event":"user_log","data":{"user_id":"u1","log":{"type":"RULE","rule_id":"greet_rule"}}}"#.to_string(),
        ))
        .await
        .unwrap();

        let reply = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let out: OutboundEvent = serde_json::from_str(reply.to_text().unwrap()).unwrap();
        assert_eq!(
            out,
            OutboundEvent::ExplanationReceival {
                user_id: "u1".to_string(),
                explanation: "Hello Max".to_string(),
            }
        );

        assert_eq!(hub.connection_count().await, 1);
        hub.stop().await;
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_connection_limit_rejects_extra_clients() {
        let hub = test_hub_with_limit(1);
        let addr = hub.start().await.unwrap();
        let url = format!("ws://{}", addr);

        let (_first, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
        let second = tokio::time::timeout(
            Duration::from_secs(5),
            tokio_tungstenite::connect_async(url.as_str()),
        )
        .await
        .unwrap();
        assert!(second.is_err());

        hub.stop().await;
    }

    #[tokio::test]
    async fn test_dropped_hub_releases_listener() {
        let hub = test_hub();
        let addr = hub.start().await.unwrap();
        drop(hub);

        let mut rebound = false;
        for _ in 0..50 {
            if TcpListener::bind(addr).await.is_ok() {
                rebound = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(rebound, "accept loop kept the listener after the hub was dropped");
    }
}
