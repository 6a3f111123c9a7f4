//! 会话快照数据模型
//!
//! 每个用户一份：当前任务、环境属性、日志历史。解析器只读快照，
//! 传输层负责合并元数据与追加日志。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 实验分组属性名（值为 1 表示 static/对照组）
pub const CONDITION: &str = "Condition";
/// 技术兴趣属性名（类型表的第一级索引）
pub const TECHNICAL_INTEREST: &str = "Technical_Interest";
/// 用户名属性名（替换模板中的占位名）
pub const USER_NAME: &str = "User_Name";
/// 规则触发日志的 type
pub const RULE_LOG_TYPE: &str = "RULE";

/// 环境属性记录 `{name, value}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvAttribute {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

impl EnvAttribute {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// 日志记录；未识别的字段原样保留
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LogRecord {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            rule_id: None,
            extra: Map::new(),
        }
    }

    /// 构造一条 RULE 日志
    pub fn rule(rule_id: impl Into<String>) -> Self {
        Self {
            kind: RULE_LOG_TYPE.to_string(),
            rule_id: Some(rule_id.into()),
            extra: Map::new(),
        }
    }

    pub fn is_rule(&self) -> bool {
        self.kind == RULE_LOG_TYPE
    }
}

/// 用户会话快照
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task: Option<String>,
    #[serde(default)]
    pub environment: Vec<EnvAttribute>,
    #[serde(default)]
    pub logs: Vec<LogRecord>,
    /// 客户端附带的其他字段
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 元数据合并载荷：除 logs 以外的所有字段，出现即覆盖
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Vec<EnvAttribute>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionSnapshot {
    pub fn with_task(task: impl Into<String>) -> Self {
        Self {
            current_task: Some(task.into()),
            ..Self::default()
        }
    }

    /// 按名称取环境属性；同名多条时后出现的生效
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.environment
            .iter()
            .rev()
            .find(|attr| attr.name == name)
            .map(|attr| &attr.value)
    }

    /// Condition 等于 1（数值 1 / 1.0，或 true）时为 static，其余（包括缺失）都是 treatment
    pub fn is_static_condition(&self) -> bool {
        match self.attribute(CONDITION) {
            Some(Value::Number(n)) => n.as_f64() == Some(1.0),
            Some(Value::Bool(b)) => *b,
            _ => false,
        }
    }

    pub fn technical_interest(&self) -> Option<&str> {
        self.attribute(TECHNICAL_INTEREST).and_then(Value::as_str)
    }

    pub fn user_name(&self) -> Option<&str> {
        self.attribute(USER_NAME).and_then(Value::as_str)
    }

    /// 当前任务对应的规则 ID：`lowercase(task) + "_rule"`
    pub fn rule_id(&self) -> Option<String> {
        self.current_task
            .as_deref()
            .map(|task| format!("{}_rule", task.to_lowercase()))
    }

    /// 当前规则在日志中的触发次数（每次调用都从日志重新计数）
    pub fn rule_occurrences(&self) -> usize {
        let Some(rule_id) = self.rule_id() else {
            return 0;
        };
        self.logs
            .iter()
            .filter(|log| log.is_rule() && log.rule_id.as_deref() == Some(rule_id.as_str()))
            .count()
    }

    /// 合并元数据（logs 不受影响）
    pub fn apply_metadata(&mut self, metadata: SessionMetadata) {
        if let Some(task) = metadata.current_task {
            self.current_task = Some(task);
        }
        if let Some(environment) = metadata.environment {
            self.environment = environment;
        }
        for (key, value) in metadata.extra {
            if key == "logs" {
                continue;
            }
            self.extra.insert(key, value);
        }
    }

    pub fn append_log(&mut self, log: LogRecord) {
        self.logs.push(log);
    }
}
