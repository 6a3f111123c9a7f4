//! Explainer - 规则触发的解释服务
//!
//! 入口：初始化日志、加载配置与语料，按 `[server] transport` 启动 REST 或 WebSocket 绑定。

use std::sync::Arc;

use anyhow::Context;
use explainer::config::{load_config, AppConfig, Transport};
use explainer::core::{create_corpus, ExplanationResolver, MemorySessionStore, SessionStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    explainer::observability::init();

    let cfg = load_config(None).context("Failed to load config")?;

    let corpus = create_corpus(
        &cfg.corpus.type_table,
        &cfg.corpus.text_table,
        cfg.corpus.reload_on_read,
    )
    .context("Failed to load explanation corpus")?;

    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let resolver = Arc::new(ExplanationResolver::new(corpus));

    match cfg.server.transport {
        Transport::Rest => run_rest(&cfg, store, resolver).await,
        Transport::Websocket => run_gateway(&cfg, store, resolver).await,
    }
}

#[cfg(feature = "rest")]
async fn run_rest(
    cfg: &AppConfig,
    store: Arc<dyn SessionStore>,
    resolver: Arc<ExplanationResolver>,
) -> anyhow::Result<()> {
    use explainer::integrations::rest::{create_router, RestState};

    let app = create_router(Arc::new(RestState { store, resolver }));

    let listener = tokio::net::TcpListener::bind(&cfg.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", cfg.server.bind_addr))?;
    tracing::info!("Explainer REST server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tracing::info!("Shutting down...");
    Ok(())
}

#[cfg(not(feature = "rest"))]
async fn run_rest(
    _cfg: &AppConfig,
    _store: Arc<dyn SessionStore>,
    _resolver: Arc<ExplanationResolver>,
) -> anyhow::Result<()> {
    anyhow::bail!("REST transport requires the `rest` feature")
}

#[cfg(feature = "gateway")]
async fn run_gateway(
    cfg: &AppConfig,
    store: Arc<dyn SessionStore>,
    resolver: Arc<ExplanationResolver>,
) -> anyhow::Result<()> {
    use explainer::gateway::{Dispatcher, Hub, HubConfig};

    let hub = Hub::new(
        HubConfig {
            bind_addr: cfg.server.bind_addr.clone(),
            max_connections: cfg.gateway.max_connections,
        },
        Dispatcher::new(store, resolver),
    );

    let addr = hub.start().await?;
    tracing::info!("Explainer gateway on ws://{}", addr);
    tracing::info!("Press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down gateway...");
    hub.stop().await;
    Ok(())
}

#[cfg(not(feature = "gateway"))]
async fn run_gateway(
    _cfg: &AppConfig,
    _store: Arc<dyn SessionStore>,
    _resolver: Arc<ExplanationResolver>,
) -> anyhow::Result<()> {
    anyhow::bail!("WebSocket transport requires the `gateway` feature")
}
