//! 核心层：会话模型、语料、解析器、采样、会话存储

pub mod corpus;
pub mod error;
pub mod resolver;
pub mod sampler;
pub mod session;
pub mod session_store;

pub use corpus::{create_corpus, Corpus, ExplanationCorpus, FileCorpus, Occurrence};
pub use error::{CorpusError, ExplainError};
pub use resolver::{
    build_key, classify_occurrence, render_text, ConditionBranch, ExplanationResolver, Resolution,
    FALLBACK_TEXT, PLACEHOLDER_NAME,
};
pub use sampler::{explanation_needed, explanation_needed_with};
pub use session::{EnvAttribute, LogRecord, SessionMetadata, SessionSnapshot};
pub use session_store::{MemorySessionStore, SessionStore};
