//! 解释引擎错误类型
//!
//! ExplainError 只在解析器内部流转，对外统一降级为 `available = false`；
//! CorpusError 只在加载语料时出现。

use thiserror::Error;

use super::corpus::Occurrence;

/// 解析过程中可能出现的错误（均在本地恢复，不会抛给传输层）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExplainError {
    /// 用户不存在或没有 current_task
    #[error("No data available for explanation.")]
    NoData,

    /// 当前规则尚未触发过
    #[error("Nothing to explain yet.")]
    NothingToExplain,

    /// treatment 分支缺少必需的环境属性（如 Technical_Interest）
    #[error("Missing environment attribute: {0}")]
    MissingAttribute(String),

    /// 类型表中没有 (interest, occurrence, task) 对应的条目
    #[error("No explanation type for interest={interest} occurrence={occurrence} task={task}")]
    TableMiss {
        interest: String,
        occurrence: Occurrence,
        task: String,
    },
}

/// 语料加载错误
#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("Failed to read corpus file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid corpus JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Corpus schema violation: {0}")]
    Schema(String),
}
