//! 解释语料：类型表 + 文本表
//!
//! - 类型表：`interest -> occurrence -> task -> 解释类型后缀`，加载时校验出现次数分档
//! - 文本表：`explanation_key -> 模板`，模板中的占位名 `Alice` 在渲染时替换为用户名
//!
//! 语料在进程生命周期内视为只读；可启动时加载一次（ExplanationCorpus），
//! 也可每次查找时重新读取文件（FileCorpus）。

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::CorpusError;

/// 规则出现次数分档（超过两次后不再细分）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Occurrence {
    None,
    First,
    Second,
    More,
}

impl Occurrence {
    pub fn from_count(count: usize) -> Self {
        match count {
            0 => Occurrence::None,
            1 => Occurrence::First,
            2 => Occurrence::Second,
            _ => Occurrence::More,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Occurrence::None => "none",
            Occurrence::First => "first",
            Occurrence::Second => "second",
            Occurrence::More => "more",
        }
    }
}

impl fmt::Display for Occurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 类型表：interest -> occurrence -> task -> suffix
pub type TypeTable = HashMap<String, HashMap<Occurrence, HashMap<String, String>>>;

/// 文本表：explanation_key -> template
pub type TextTable = HashMap<String, String>;

/// 语料只读访问接口
pub trait Corpus: Send + Sync {
    /// 类型表查找；未命中返回 None
    fn explanation_type(&self, interest: &str, occurrence: Occurrence, task: &str) -> Option<String>;

    /// 文本表查找；未命中返回 None
    fn template(&self, key: &str) -> Option<String>;
}

/// 内存语料（启动时加载并校验）
#[derive(Debug, Clone, Default)]
pub struct ExplanationCorpus {
    types: TypeTable,
    texts: TextTable,
}

impl ExplanationCorpus {
    pub fn new(types: TypeTable, texts: TextTable) -> Result<Self, CorpusError> {
        validate_type_table(&types)?;
        Ok(Self { types, texts })
    }

    /// 从两段 JSON 文本构建
    pub fn from_json(type_table: &str, text_table: &str) -> Result<Self, CorpusError> {
        let types = serde_json::from_str(type_table).map_err(|source| CorpusError::Json {
            path: "<type table>".to_string(),
            source,
        })?;
        let texts = serde_json::from_str(text_table).map_err(|source| CorpusError::Json {
            path: "<text table>".to_string(),
            source,
        })?;
        Self::new(types, texts)
    }

    /// 从磁盘加载两张表
    pub fn load(type_path: impl AsRef<Path>, text_path: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let types: TypeTable = read_json(type_path.as_ref())?;
        let texts: TextTable = read_json(text_path.as_ref())?;
        Self::new(types, texts)
    }

    pub fn type_entries(&self) -> usize {
        self.types
            .values()
            .flat_map(|by_occurrence| by_occurrence.values())
            .map(|by_task| by_task.len())
            .sum()
    }

    pub fn text_entries(&self) -> usize {
        self.texts.len()
    }
}

impl Corpus for ExplanationCorpus {
    fn explanation_type(&self, interest: &str, occurrence: Occurrence, task: &str) -> Option<String> {
        self.types
            .get(interest)?
            .get(&occurrence)?
            .get(task)
            .cloned()
    }

    fn template(&self, key: &str) -> Option<String> {
        self.texts.get(key).cloned()
    }
}

/// 每次查找都重新读取文件的语料；读取失败按未命中处理
#[derive(Debug, Clone)]
pub struct FileCorpus {
    type_path: PathBuf,
    text_path: PathBuf,
}

impl FileCorpus {
    pub fn new(type_path: impl Into<PathBuf>, text_path: impl Into<PathBuf>) -> Self {
        Self {
            type_path: type_path.into(),
            text_path: text_path.into(),
        }
    }
}

impl Corpus for FileCorpus {
    fn explanation_type(&self, interest: &str, occurrence: Occurrence, task: &str) -> Option<String> {
        let types: TypeTable = match read_json(&self.type_path) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("Type table unavailable: {}", e);
                return None;
            }
        };
        if let Err(e) = validate_type_table(&types) {
            tracing::warn!("Type table rejected: {}", e);
            return None;
        }
        types.get(interest)?.get(&occurrence)?.get(task).cloned()
    }

    fn template(&self, key: &str) -> Option<String> {
        let texts: TextTable = match read_json(&self.text_path) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("Text table unavailable: {}", e);
                return None;
            }
        };
        texts.get(key).cloned()
    }
}

/// 创建语料
///
/// 启动时总是完整加载一次以校验格式；`reload_on_read` 为 true 时之后每次查找重新读文件
pub fn create_corpus(
    type_path: &Path,
    text_path: &Path,
    reload_on_read: bool,
) -> Result<Arc<dyn Corpus>, CorpusError> {
    let corpus = ExplanationCorpus::load(type_path, text_path)?;
    tracing::info!(
        "Loaded corpus: {} type entries, {} templates",
        corpus.type_entries(),
        corpus.text_entries()
    );

    if reload_on_read {
        tracing::info!("Corpus files are re-read on every lookup");
        return Ok(Arc::new(FileCorpus::new(type_path, text_path)));
    }
    Ok(Arc::new(corpus))
}

fn validate_type_table(types: &TypeTable) -> Result<(), CorpusError> {
    for (interest, by_occurrence) in types {
        if by_occurrence.contains_key(&Occurrence::None) {
            return Err(CorpusError::Schema(format!(
                "interest '{}' declares a 'none' bucket; only first/second/more are allowed",
                interest
            )));
        }
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CorpusError> {
    let display = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|source| CorpusError::Io {
        path: display.clone(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| CorpusError::Json { path: display, source })
}
