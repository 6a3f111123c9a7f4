//! 解释解析器
//!
//! 会话快照 -> (解释文本, 是否可用)。流程：
//! 1. 统计当前规则出现次数并分档
//! 2. 按实验分组决定 static / treatment，treatment 需查类型表得到后缀
//! 3. 拼接 explanation_key，查文本表并替换用户名
//!
//! 解析器本身无状态、无副作用，可对同一用户并发重复调用。

use std::sync::Arc;

use serde::Serialize;

use super::corpus::{Corpus, Occurrence};
use super::error::ExplainError;
use super::session::{SessionSnapshot, TECHNICAL_INTEREST};
use super::session_store::SessionStore;

/// 文本表未命中时返回的文本（此时 available 仍为 true）
pub const FALLBACK_TEXT: &str = "Explanation not found.";

/// 模板中的占位用户名
pub const PLACEHOLDER_NAME: &str = "Alice";

/// 解析结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub explanation: String,
    pub available: bool,
}

impl Resolution {
    pub fn available(explanation: impl Into<String>) -> Self {
        Self {
            explanation: explanation.into(),
            available: true,
        }
    }

    pub fn unavailable(error: &ExplainError) -> Self {
        Self {
            explanation: error.to_string(),
            available: false,
        }
    }
}

/// 实验分组分支
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionBranch {
    /// 对照组，无后缀
    Static,
    /// 实验组，携带类型表给出的后缀
    Treatment(String),
}

/// 当前规则的出现次数分档
pub fn classify_occurrence(snapshot: &SessionSnapshot) -> Occurrence {
    Occurrence::from_count(snapshot.rule_occurrences())
}

/// 决定分支；treatment 时查类型表
pub fn condition_branch(
    snapshot: &SessionSnapshot,
    task: &str,
    occurrence: Occurrence,
    corpus: &dyn Corpus,
) -> Result<ConditionBranch, ExplainError> {
    if snapshot.is_static_condition() {
        return Ok(ConditionBranch::Static);
    }

    let interest = snapshot
        .technical_interest()
        .ok_or_else(|| ExplainError::MissingAttribute(TECHNICAL_INTEREST.to_string()))?;

    corpus
        .explanation_type(interest, occurrence, task)
        .map(ConditionBranch::Treatment)
        .ok_or_else(|| ExplainError::TableMiss {
            interest: interest.to_string(),
            occurrence,
            task: task.to_string(),
        })
}

/// `task_static` 或 `task_treatment_<suffix>`
pub fn build_key(task: &str, branch: &ConditionBranch) -> String {
    match branch {
        ConditionBranch::Static => format!("{}_static", task),
        ConditionBranch::Treatment(suffix) => format!("{}_treatment_{}", task, suffix),
    }
}

/// 按短路顺序检查前置条件并生成 explanation_key
pub fn explanation_key(
    snapshot: &SessionSnapshot,
    occurrence: Occurrence,
    corpus: &dyn Corpus,
) -> Result<String, ExplainError> {
    let task = snapshot.current_task.as_deref().ok_or(ExplainError::NoData)?;
    if occurrence == Occurrence::None {
        return Err(ExplainError::NothingToExplain);
    }
    let branch = condition_branch(snapshot, task, occurrence, corpus)?;
    Ok(build_key(task, &branch))
}

/// 渲染模板：未命中返回 FALLBACK_TEXT；未设置用户名时模板原样返回
pub fn render_text(template: Option<String>, user_name: Option<&str>) -> String {
    let Some(template) = template else {
        return FALLBACK_TEXT.to_string();
    };
    match user_name {
        Some(name) => template.replace(PLACEHOLDER_NAME, name),
        None => template,
    }
}

/// 解释解析器
#[derive(Clone)]
pub struct ExplanationResolver {
    corpus: Arc<dyn Corpus>,
}

impl ExplanationResolver {
    pub fn new(corpus: Arc<dyn Corpus>) -> Self {
        Self { corpus }
    }

    /// 解析快照；失败统一编码为 available = false
    pub fn resolve(&self, snapshot: &SessionSnapshot) -> Resolution {
        match self.try_resolve(snapshot) {
            Ok(text) => Resolution::available(text),
            Err(e) => {
                match &e {
                    ExplainError::NoData | ExplainError::NothingToExplain => {
                        tracing::debug!("No explanation: {}", e);
                    }
                    ExplainError::MissingAttribute(_) | ExplainError::TableMiss { .. } => {
                        tracing::warn!("Explanation degraded: {}", e);
                    }
                }
                Resolution::unavailable(&e)
            }
        }
    }

    /// 解析快照，保留具体错误
    pub fn try_resolve(&self, snapshot: &SessionSnapshot) -> Result<String, ExplainError> {
        let occurrence = classify_occurrence(snapshot);
        let key = explanation_key(snapshot, occurrence, self.corpus.as_ref())?;
        tracing::debug!("Generated explanation_key: {} (occurrence={})", key, occurrence);

        Ok(render_text(self.corpus.template(&key), snapshot.user_name()))
    }

    /// 按用户 ID 从会话存储读取快照后解析；不修改存储
    pub async fn resolve_user(&self, user_id: &str, store: &dyn SessionStore) -> Resolution {
        match store.get(user_id).await {
            Some(snapshot) => self.resolve(&snapshot),
            None => Resolution::unavailable(&ExplainError::NoData),
        }
    }
}
