//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `EXPLAINER__*` 覆盖（双下划线表示嵌套，如 `EXPLAINER__SERVER__TRANSPORT=websocket`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub corpus: CorpusSection,
    #[serde(default)]
    pub gateway: GatewaySection,
}

/// 传输绑定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// 请求/响应（HTTP）
    #[default]
    Rest,
    /// 持久双向连接（WebSocket）
    Websocket,
}

/// [server] 段：传输方式与监听地址
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default)]
    pub transport: Transport,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:5001".to_string()
}

/// [corpus] 段：两张表的路径，以及是否每次查找都重新读文件
#[derive(Debug, Clone, Deserialize)]
pub struct CorpusSection {
    #[serde(default = "default_type_table")]
    pub type_table: PathBuf,
    #[serde(default = "default_text_table")]
    pub text_table: PathBuf,
    #[serde(default)]
    pub reload_on_read: bool,
}

impl Default for CorpusSection {
    fn default() -> Self {
        Self {
            type_table: default_type_table(),
            text_table: default_text_table(),
            reload_on_read: false,
        }
    }
}

fn default_type_table() -> PathBuf {
    PathBuf::from("resources/explanation_table.json")
}

fn default_text_table() -> PathBuf {
    PathBuf::from("resources/explanations.json")
}

/// [gateway] 段：WebSocket 连接上限
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySection {
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> usize {
    1000
}

/// 从 config 目录加载配置，环境变量 EXPLAINER__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 EXPLAINER__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("EXPLAINER")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
