//! Request and result types for the embedding engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// ============================================================================
// Options
// ============================================================================

/// Per-call embedding options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingOptions {
    /// Rescale to unit L2 norm.
    pub normalize: bool,
    /// Run [`preprocess_text_for_embedding`](crate::preprocess_text_for_embedding) first.
    pub preprocess: bool,
}

impl Default for EmbeddingOptions {
    fn default() -> Self {
        Self {
            normalize: true,
            preprocess: true,
        }
    }
}

impl EmbeddingOptions {
    /// Sets normalization.
    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Sets preprocessing.
    pub fn with_preprocess(mut self, preprocess: bool) -> Self {
        self.preprocess = preprocess;
        self
    }
}

// ============================================================================
// Results
// ============================================================================

/// How an embedding was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingMetadata {
    /// When the vector was produced.
    pub generated_at: DateTime<Utc>,
    /// Wall time spent in the engine, in milliseconds.
    pub processing_time_ms: u64,
    /// Vector length.
    pub dimensions: usize,
    /// Whether the vector was rescaled to unit length.
    pub normalized: bool,
    /// The backend returned an all-zero vector (left as is).
    pub zero_vector: bool,
    /// Served from the embedding cache.
    pub from_cache: bool,
    /// Estimated tokens in the embedded text.
    pub token_estimate: usize,
    /// Backend or model name.
    pub model: String,
}

/// One embedding plus its generation and document metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingResult {
    /// The vector.
    pub embedding: Vec<f32>,
    /// Generation metadata.
    pub metadata: EmbeddingMetadata,
    /// Caller-supplied document metadata, passed through untouched.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub document: Map<String, Value>,
}

/// Result of a batched embedding call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEmbeddingResult {
    /// One result per non-blank input, in input order.
    pub embeddings: Vec<EmbeddingResult>,
    /// Estimated tokens the backend actually processed.
    pub total_tokens: usize,
    /// Inputs served from cache.
    pub cache_hits: usize,
    /// Inputs computed by the backend.
    pub cache_misses: usize,
    /// Blank inputs dropped before the backend call.
    pub skipped: usize,
    /// Wall time for the whole batch, in milliseconds.
    pub processing_time_ms: u64,
}

// ============================================================================
// Domain inputs
// ============================================================================

/// Speaker of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// End user.
    User,
    /// The assistant.
    Assistant,
    /// System prompt or notice.
    System,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        })
    }
}

/// One message of a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Who said it.
    pub role: MessageRole,
    /// What was said.
    pub content: String,
    /// When, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ConversationMessage {
    /// Create a message without a timestamp.
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: None,
        }
    }
}

/// A note remembered about one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryNote {
    /// Note identifier.
    pub id: String,
    /// Owner of the note.
    pub user_id: String,
    /// Free-form category (e.g., "preference", "goal").
    pub memory_type: String,
    /// The note itself.
    pub content: String,
    /// Optional weight in `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<f32>,
}

/// A fact from the institutional knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstitutionalFact {
    /// Fact identifier.
    pub id: String,
    /// Category (e.g., "policy", "deadline", "faq").
    pub knowledge_type: String,
    /// Short title.
    pub title: String,
    /// Body text.
    pub content: String,
    /// Where the fact came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}
