//! Semantic indexing: embed text, then store or search it.

use hubsearch_core::{Error, Result};
use hubsearch_embed::{ConversationMessage, EmbeddingEngine, InstitutionalFact, MemoryNote};
use hubsearch_lexical::ProjectRecord;
use hubsearch_vector::{Payload, PayloadKind, PointInput, SearchOptions, VectorSearchResult, VectorStore};
use log::debug;
use std::sync::Arc;

/// Logical collection for conversation transcripts.
pub const CONVERSATIONS: &str = "conversations";
/// Logical collection for user memory notes.
pub const USER_MEMORY: &str = "user_memory";
/// Logical collection for institutional knowledge.
pub const INSTITUTIONAL_KNOWLEDGE: &str = "institutional_knowledge";
/// Logical collection for project abstracts.
pub const PROJECTS: &str = "projects";

/// One text to index in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexItem {
    /// Text to embed.
    pub text: String,
    /// Payload stored with the vector.
    pub payload: Payload,
    /// Explicit point id; generated when absent.
    pub id: Option<String>,
}

impl IndexItem {
    /// An item with a generated id.
    pub fn new(text: impl Into<String>, payload: Payload) -> Self {
        Self {
            text: text.into(),
            payload,
            id: None,
        }
    }

    /// Sets an explicit id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Joins an [`EmbeddingEngine`] to a [`VectorStore`].
///
/// Typed helpers key points by the record's own id, so re-indexing a
/// record replaces its previous vector.
#[derive(Clone)]
pub struct SemanticIndex {
    engine: Arc<EmbeddingEngine>,
    store: Arc<VectorStore>,
}

impl SemanticIndex {
    /// Create an index over a connected store.
    pub fn new(engine: Arc<EmbeddingEngine>, store: Arc<VectorStore>) -> Self {
        Self { engine, store }
    }

    /// The embedding engine.
    pub fn engine(&self) -> &Arc<EmbeddingEngine> {
        &self.engine
    }

    /// The vector store.
    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    /// Embed `text` and store it. Returns the point id.
    pub async fn index_text(
        &self,
        collection: &str,
        text: &str,
        payload: Payload,
        id: Option<String>,
    ) -> Result<String> {
        let result = self.engine.generate_embedding(text, None, None).await?;
        self.store
            .store_vector(collection, result.embedding, payload, id)
            .await
    }

    /// Embed and store many texts with one embedding call and one store
    /// call. Ids are returned in input order.
    pub async fn index_batch(&self, collection: &str, items: Vec<IndexItem>) -> Result<Vec<String>> {
        if let Some(i) = items.iter().position(|item| item.text.trim().is_empty()) {
            return Err(Error::validation(format!("text at index {i} is empty")));
        }
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = items.iter().map(|item| item.text.clone()).collect();
        let batch = self
            .engine
            .generate_batch_embeddings(&texts, None, None)
            .await?;
        if batch.embeddings.len() != items.len() {
            return Err(Error::backend(
                "index_batch",
                format!(
                    "{} embeddings for {} texts",
                    batch.embeddings.len(),
                    items.len()
                ),
            ));
        }

        let points = items
            .into_iter()
            .zip(batch.embeddings)
            .map(|(item, embedded)| PointInput {
                id: item.id,
                vector: embedded.embedding,
                payload: item.payload,
            })
            .collect();
        let ids = self.store.store_batch_vectors(collection, points).await?;
        debug!("Indexed {} texts into '{collection}'", ids.len());
        Ok(ids)
    }

    /// Embed `query` (always normalized) and search `collection`.
    pub async fn search_text(
        &self,
        collection: &str,
        query: &str,
        options: SearchOptions,
    ) -> Result<Vec<VectorSearchResult>> {
        let opts = self.engine.default_options().with_normalize(true);
        let embedded = self.engine.generate_embedding(query, None, Some(opts)).await?;
        self.store
            .search_similar(collection, &embedded.embedding, options)
            .await
    }

    // ------------------------------------------------------------------------
    // Typed records
    // ------------------------------------------------------------------------

    /// Index a conversation transcript under its conversation id.
    pub async fn index_conversation(
        &self,
        conversation_id: &str,
        messages: &[ConversationMessage],
        user_id: Option<&str>,
    ) -> Result<String> {
        let result = self
            .engine
            .generate_conversation_embedding(conversation_id, messages, user_id)
            .await?;
        let payload = Payload::new(PayloadKind::Conversation {
            conversation_id: conversation_id.to_string(),
            user_id: user_id.map(str::to_string),
            message_count: messages.len(),
        });
        self.store
            .store_vector(
                CONVERSATIONS,
                result.embedding,
                payload,
                Some(conversation_id.to_string()),
            )
            .await
    }

    /// Index a user memory note under its id.
    pub async fn index_user_memory(&self, note: &MemoryNote) -> Result<String> {
        let result = self.engine.generate_user_memory_embedding(note).await?;
        let payload = Payload::new(PayloadKind::UserMemory {
            memory_id: note.id.clone(),
            user_id: note.user_id.clone(),
            memory_type: note.memory_type.clone(),
            importance: note.importance,
        });
        self.store
            .store_vector(USER_MEMORY, result.embedding, payload, Some(note.id.clone()))
            .await
    }

    /// Index an institutional fact under its id.
    pub async fn index_institutional(&self, fact: &InstitutionalFact) -> Result<String> {
        let result = self.engine.generate_institutional_embedding(fact).await?;
        let payload = Payload::new(PayloadKind::Institutional {
            fact_id: fact.id.clone(),
            knowledge_type: fact.knowledge_type.clone(),
            title: fact.title.clone(),
            source: fact.source.clone(),
        });
        self.store
            .store_vector(
                INSTITUTIONAL_KNOWLEDGE,
                result.embedding,
                payload,
                Some(fact.id.clone()),
            )
            .await
    }

    /// Index a project's title and abstract under its id.
    pub async fn index_project(&self, project: &ProjectRecord) -> Result<String> {
        let text = if project.abstract_text.trim().is_empty() {
            project.title.clone()
        } else {
            format!("{}\n\n{}", project.title, project.abstract_text)
        };
        let payload = Payload::new(PayloadKind::Project {
            project_id: project.id.clone(),
            title: project.title.clone(),
            status: Some(project.status.as_str().to_string()),
            supervisor_id: (!project.owner_id.is_empty()).then(|| project.owner_id.clone()),
        });
        self.index_text(PROJECTS, &text, payload, Some(project.id.clone()))
            .await
    }
}

impl std::fmt::Debug for SemanticIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticIndex")
            .field("dimension", &self.engine.dimension())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use hubsearch_embed::{EmbeddingConfig, MessageRole, MockEmbeddingBackend};
    use hubsearch_vector::{Filter, MemoryVectorBackend, VectorStoreConfig};

    const DIM: usize = 32;

    async fn index() -> SemanticIndex {
        let engine = EmbeddingEngine::new(
            Arc::new(MockEmbeddingBackend::new(DIM)),
            EmbeddingConfig {
                dimension: DIM,
                ..Default::default()
            },
        );
        let store = VectorStore::new(
            Arc::new(MemoryVectorBackend::new()),
            VectorStoreConfig {
                dimension: DIM,
                ..Default::default()
            },
        );
        store.connect().await.unwrap();
        SemanticIndex::new(Arc::new(engine), Arc::new(store))
    }

    #[tokio::test]
    async fn test_index_then_search_finds_same_text() {
        let index = index().await;
        let id = index
            .index_text(
                PROJECTS,
                "graph neural networks for chemistry",
                Payload::generic().with_extra("lang", "en"),
                None,
            )
            .await
            .unwrap();
        index
            .index_text(PROJECTS, "soil sensors", Payload::generic(), None)
            .await
            .unwrap();

        let hits = index
            .search_text(
                PROJECTS,
                "graph neural networks for chemistry",
                SearchOptions::new().with_limit(1),
            )
            .await
            .unwrap();
        assert_eq!(hits[0].id, id);
        assert!((hits[0].score - 1.0).abs() < 1e-4);
        assert_eq!(hits[0].payload.extra["lang"], "en");
    }

    #[tokio::test]
    async fn test_batch_keeps_ids_aligned() {
        let index = index().await;
        let items = vec![
            IndexItem::new("first", Payload::generic()).with_id("a"),
            IndexItem::new("second", Payload::generic()),
            IndexItem::new("third", Payload::generic()).with_id("c"),
        ];
        let ids = index.index_batch(CONVERSATIONS, items).await.unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[0], "a");
        assert_eq!(ids[2], "c");
        assert_eq!(index.store().count_vectors(CONVERSATIONS, None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_batch_rejects_blank_text_before_storing() {
        let index = index().await;
        let items = vec![
            IndexItem::new("fine", Payload::generic()),
            IndexItem::new("  ", Payload::generic()),
        ];
        let err = index.index_batch(CONVERSATIONS, items).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(index.store().count_vectors(CONVERSATIONS, None).await.unwrap(), 0);
        assert!(index.index_batch(CONVERSATIONS, Vec::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_typed_helpers_store_typed_payloads() {
        let index = index().await;
        let messages = vec![
            ConversationMessage::new(MessageRole::User, "Which supervisors work on NLP?"),
            ConversationMessage::new(MessageRole::Assistant, "Dr. Rivera and Dr. Okafor."),
        ];
        let id = index
            .index_conversation("conv-1", &messages, Some("u1"))
            .await
            .unwrap();
        assert_eq!(id, "conv-1");

        // re-indexing replaces
        index
            .index_conversation("conv-1", &messages[..1], Some("u1"))
            .await
            .unwrap();
        let stored = index.store().get_vector(CONVERSATIONS, "conv-1", false).await.unwrap().unwrap();
        assert_eq!(
            stored.payload.kind,
            PayloadKind::Conversation {
                conversation_id: "conv-1".into(),
                user_id: Some("u1".into()),
                message_count: 1,
            }
        );

        let note = MemoryNote {
            id: "m1".into(),
            user_id: "u1".into(),
            memory_type: "preference".into(),
            content: "Prefers Rust projects".into(),
            importance: Some(0.8),
        };
        index.index_user_memory(&note).await.unwrap();
        let by_user = Filter::eq("userId", "u1");
        assert_eq!(
            index.store().count_vectors(USER_MEMORY, Some(&by_user)).await.unwrap(),
            1
        );

        let fact = InstitutionalFact {
            id: "f1".into(),
            knowledge_type: "deadline".into(),
            title: "Proposal deadline".into(),
            content: "Proposals are due in week 6.".into(),
            source: None,
        };
        index.index_institutional(&fact).await.unwrap();
        let hits = index
            .search_text(INSTITUTIONAL_KNOWLEDGE, "Proposal deadline", SearchOptions::new())
            .await
            .unwrap();
        assert_eq!(hits[0].id, "f1");
        assert_eq!(hits[0].payload.kind.tag(), "institutional");
    }

    #[tokio::test]
    async fn test_index_project_payload() {
        let index = index().await;
        let project = ProjectRecord::new("p1", "Rust Compilers")
            .with_abstract("Borrow checking at scale")
            .with_owner("sup-1");
        index.index_project(&project).await.unwrap();

        let stored = index.store().get_vector(PROJECTS, "p1", false).await.unwrap().unwrap();
        match stored.payload.kind {
            PayloadKind::Project {
                project_id,
                status,
                supervisor_id,
                ..
            } => {
                assert_eq!(project_id, "p1");
                assert_eq!(status.as_deref(), Some("approved"));
                assert_eq!(supervisor_id.as_deref(), Some("sup-1"));
            }
            other => unreachable!("unexpected payload: {other:?}"),
        }
    }
}
