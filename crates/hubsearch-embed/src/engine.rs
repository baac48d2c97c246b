//! The embedding engine.
//!
//! Validates and preprocesses input, delegates to an [`EmbeddingBackend`]
//! for raw vectors, checks dimensions, and normalizes. Domain helpers
//! flatten conversations, memory notes, and institutional facts into plain
//! text and tag the result with a typed metadata envelope.

use hubsearch_core::math;
use hubsearch_core::{Error, Result};
use log::{debug, warn};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Instant;

use crate::backend::{CacheStats, EmbeddingBackend};
use crate::config::EmbeddingConfig;
use crate::text::{estimate_tokens, preprocess_text_for_embedding};
use crate::types::{
    BatchEmbeddingResult, ConversationMessage, EmbeddingMetadata, EmbeddingOptions,
    EmbeddingResult, InstitutionalFact, MemoryNote,
};

/// Text-to-vector engine over a shared backend.
pub struct EmbeddingEngine {
    backend: Arc<dyn EmbeddingBackend>,
    config: EmbeddingConfig,
}

impl EmbeddingEngine {
    /// Create an engine. The backend should already be initialized.
    pub fn new(backend: Arc<dyn EmbeddingBackend>, config: EmbeddingConfig) -> Self {
        Self { backend, config }
    }

    /// The underlying backend.
    pub fn backend(&self) -> &Arc<dyn EmbeddingBackend> {
        &self.backend
    }

    /// Engine configuration.
    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    /// Configured embedding dimension.
    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    /// Whether the backend has finished initializing.
    pub fn is_ready(&self) -> bool {
        self.backend.is_ready()
    }

    /// Options used when a call passes `None`.
    pub fn default_options(&self) -> EmbeddingOptions {
        EmbeddingOptions::default().with_normalize(self.config.normalize)
    }

    /// Backend cache counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.backend.cache_stats()
    }

    /// Preprocess text with the configured character budget.
    pub fn preprocess(&self, text: &str) -> String {
        preprocess_text_for_embedding(text, self.config.max_text_chars)
    }

    // ------------------------------------------------------------------------
    // Generation
    // ------------------------------------------------------------------------

    /// Embed one text.
    ///
    /// Empty or whitespace-only text is a validation error. With
    /// `normalize`, the vector has unit length unless the backend returned
    /// the zero vector, which is passed through and flagged.
    pub async fn generate_embedding(
        &self,
        text: &str,
        metadata: Option<Map<String, Value>>,
        options: Option<EmbeddingOptions>,
    ) -> Result<EmbeddingResult> {
        let options = options.unwrap_or_else(|| self.default_options());
        let started = Instant::now();

        let prepared = self
            .prepare(text, &options)
            .ok_or_else(|| Error::validation("Text cannot be empty"))?;

        let raw = self.backend.generate_single_embedding(&prepared).await?;
        let result = self.finish(
            raw,
            &options,
            estimate_tokens(&prepared),
            false,
            started,
            metadata.unwrap_or_default(),
        )?;

        debug!(
            "Generated {}-dim embedding in {}ms",
            result.metadata.dimensions, result.metadata.processing_time_ms
        );
        Ok(result)
    }

    /// Embed many texts with one backend call.
    ///
    /// Blank entries are dropped; the remaining texts keep their metadata
    /// (matched by position in the input). The result holds one embedding
    /// per kept text, in input order.
    pub async fn generate_batch_embeddings(
        &self,
        texts: &[String],
        metadata: Option<Vec<Map<String, Value>>>,
        options: Option<EmbeddingOptions>,
    ) -> Result<BatchEmbeddingResult> {
        let options = options.unwrap_or_else(|| self.default_options());
        let started = Instant::now();

        if let Some(meta) = &metadata
            && meta.len() != texts.len()
        {
            return Err(Error::validation(format!(
                "metadata length {} does not match texts length {}",
                meta.len(),
                texts.len()
            )));
        }

        let mut metadata = metadata.map(|m| m.into_iter().map(Some).collect::<Vec<_>>());
        let mut prepared = Vec::with_capacity(texts.len());
        let mut documents = Vec::with_capacity(texts.len());
        for (i, text) in texts.iter().enumerate() {
            let Some(p) = self.prepare(text, &options) else {
                continue;
            };
            prepared.push(p);
            documents.push(
                metadata
                    .as_mut()
                    .and_then(|m| m[i].take())
                    .unwrap_or_default(),
            );
        }
        let skipped = texts.len() - prepared.len();
        if skipped > 0 {
            debug!("Skipping {skipped} blank texts in batch");
        }

        if prepared.is_empty() {
            return Ok(BatchEmbeddingResult {
                skipped,
                processing_time_ms: elapsed_ms(started),
                ..Default::default()
            });
        }

        let response = self.backend.generate_embeddings(&prepared).await?;
        if response.embeddings.len() != prepared.len() {
            return Err(Error::backend(
                "generate_embeddings",
                format!(
                    "backend returned {} embeddings for {} texts",
                    response.embeddings.len(),
                    prepared.len()
                ),
            ));
        }

        let mut embeddings = Vec::with_capacity(prepared.len());
        for (i, (raw, document)) in response.embeddings.into_iter().zip(documents).enumerate() {
            let from_cache = response.from_cache.get(i).copied().unwrap_or(false);
            embeddings.push(self.finish(
                raw,
                &options,
                estimate_tokens(&prepared[i]),
                from_cache,
                started,
                document,
            )?);
        }

        Ok(BatchEmbeddingResult {
            embeddings,
            total_tokens: response.total_tokens,
            cache_hits: response.cache_hits,
            cache_misses: response.cache_misses,
            skipped,
            processing_time_ms: elapsed_ms(started),
        })
    }

    // ------------------------------------------------------------------------
    // Domain helpers
    // ------------------------------------------------------------------------

    /// Embed a role-tagged transcript.
    pub async fn generate_conversation_embedding(
        &self,
        conversation_id: &str,
        messages: &[ConversationMessage],
        user_id: Option<&str>,
    ) -> Result<EmbeddingResult> {
        let text = conversation_text(messages);
        let mut meta = envelope("conversation");
        meta.insert("conversationId".into(), json!(conversation_id));
        meta.insert("messageCount".into(), json!(messages.len()));
        if let Some(user_id) = user_id {
            meta.insert("userId".into(), json!(user_id));
        }
        self.generate_embedding(&text, Some(meta), None).await
    }

    /// Embed a user memory note.
    pub async fn generate_user_memory_embedding(&self, note: &MemoryNote) -> Result<EmbeddingResult> {
        let mut meta = envelope("user_memory");
        meta.insert("memoryId".into(), json!(note.id));
        meta.insert("userId".into(), json!(note.user_id));
        meta.insert("memoryType".into(), json!(note.memory_type));
        if let Some(importance) = note.importance {
            meta.insert("importance".into(), json!(importance));
        }
        self.generate_embedding(&user_memory_text(note), Some(meta), None)
            .await
    }

    /// Embed an institutional knowledge fact.
    pub async fn generate_institutional_embedding(
        &self,
        fact: &InstitutionalFact,
    ) -> Result<EmbeddingResult> {
        let mut meta = envelope("institutional");
        meta.insert("factId".into(), json!(fact.id));
        meta.insert("knowledgeType".into(), json!(fact.knowledge_type));
        meta.insert("title".into(), json!(fact.title));
        if let Some(source) = &fact.source {
            meta.insert("source".into(), json!(source));
        }
        self.generate_embedding(&institutional_text(fact), Some(meta), None)
            .await
    }

    // ------------------------------------------------------------------------
    // Vector utilities
    // ------------------------------------------------------------------------

    /// Cosine similarity; lengths must match, zero magnitude yields 0.
    pub fn calculate_cosine_similarity(&self, a: &[f32], b: &[f32]) -> Result<f32> {
        math::cosine_similarity(a, b)
    }

    /// True iff `vector` has the configured dimension and only finite entries.
    pub fn validate_embedding(&self, vector: &[f32]) -> bool {
        vector.len() == self.config.dimension && math::all_finite(vector)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Preprocessed text, or `None` when nothing embeddable remains.
    fn prepare(&self, text: &str, options: &EmbeddingOptions) -> Option<String> {
        if text.trim().is_empty() {
            return None;
        }
        let prepared = if options.preprocess {
            self.preprocess(text)
        } else {
            text.to_string()
        };
        (!prepared.is_empty()).then_some(prepared)
    }

    fn finish(
        &self,
        mut vector: Vec<f32>,
        options: &EmbeddingOptions,
        token_estimate: usize,
        from_cache: bool,
        started: Instant,
        document: Map<String, Value>,
    ) -> Result<EmbeddingResult> {
        if vector.len() != self.config.dimension {
            if self.config.allow_dimension_mismatch {
                warn!(
                    "Embedding dimension mismatch: expected {}, got {} (tolerated)",
                    self.config.dimension,
                    vector.len()
                );
            } else {
                return Err(Error::dimension_mismatch(self.config.dimension, vector.len()));
            }
        }
        if !math::all_finite(&vector) {
            return Err(Error::backend(
                "generate_embedding",
                "backend returned non-finite values",
            ));
        }

        let zero_vector = math::l2_norm(&vector) == 0.0;
        if zero_vector {
            warn!("Backend returned a zero vector; leaving it unnormalized");
        }
        let normalized = options.normalize && math::normalize_in_place(&mut vector);

        Ok(EmbeddingResult {
            metadata: EmbeddingMetadata {
                generated_at: chrono::Utc::now(),
                processing_time_ms: elapsed_ms(started),
                dimensions: vector.len(),
                normalized,
                zero_vector,
                from_cache,
                token_estimate,
                model: self.backend.name().to_string(),
            },
            embedding: vector,
            document,
        })
    }
}

impl std::fmt::Debug for EmbeddingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingEngine")
            .field("backend", &self.backend.name())
            .field("dimension", &self.config.dimension)
            .finish()
    }
}

/// Flatten a transcript to `role: content` lines, skipping blank messages.
pub fn conversation_text(messages: &[ConversationMessage]) -> String {
    messages
        .iter()
        .filter(|m| !m.content.trim().is_empty())
        .map(|m| format!("{}: {}", m.role, m.content.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `[memory_type] content`
pub fn user_memory_text(note: &MemoryNote) -> String {
    format!("[{}] {}", note.memory_type, note.content)
}

/// `[knowledge_type] title: content`
pub fn institutional_text(fact: &InstitutionalFact) -> String {
    format!("[{}] {}: {}", fact.knowledge_type, fact.title, fact.content)
}

fn envelope(kind: &str) -> Map<String, Value> {
    let mut meta = Map::new();
    meta.insert("type".into(), json!(kind));
    meta
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

// ============================================================================
// Tests
// ============================================================================
