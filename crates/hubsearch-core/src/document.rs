//! The logical unit of text handed to the embedding engine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Kind of text a [`Document`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// A role-tagged chat transcript.
    Conversation,
    /// A note remembered about one user.
    UserMemory,
    /// A fact from the institutional knowledge base.
    Institutional,
    /// A project title and abstract.
    Project,
}

impl DocumentType {
    /// Stable tag used in payloads and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conversation => "conversation",
            Self::UserMemory => "user_memory",
            Self::Institutional => "institutional",
            Self::Project => "project",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "conversation" => Ok(Self::Conversation),
            "user_memory" => Ok(Self::UserMemory),
            "institutional" => Ok(Self::Institutional),
            "project" => Ok(Self::Project),
            other => Err(Error::validation(format!("unknown document type '{other}'"))),
        }
    }
}

/// A piece of text to embed, with ownership and free-form metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Document identifier.
    pub id: String,
    /// What kind of text this is.
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    /// Owning user or project, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    /// Raw text.
    pub text: String,
    /// Arbitrary caller metadata.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Document {
    /// Create a document with no owner and empty metadata.
    pub fn new(id: impl Into<String>, doc_type: DocumentType, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            doc_type,
            owner_id: None,
            text: text.into(),
            metadata: Map::new(),
        }
    }

    /// Sets the owner reference.
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    /// Adds one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Whether the text is empty after trimming.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_document_type_roundtrip_str() {
        for ty in [
            DocumentType::Conversation,
            DocumentType::UserMemory,
            DocumentType::Institutional,
            DocumentType::Project,
        ] {
            assert_eq!(ty.as_str().parse::<DocumentType>().unwrap(), ty);
        }
        assert!("podcast".parse::<DocumentType>().is_err());
    }

    #[test]
    fn test_document_serializes_camel_case() {
        let doc = Document::new("d1", DocumentType::UserMemory, "likes rust")
            .with_owner("u1")
            .with_metadata("source", "chat");

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["type"], "user_memory");
        assert_eq!(json["ownerId"], "u1");
        assert_eq!(json["metadata"]["source"], "chat");
    }

    #[test]
    fn test_is_blank() {
        assert!(Document::new("d", DocumentType::Project, " \n\t").is_blank());
        assert!(!Document::new("d", DocumentType::Project, "x").is_blank());
    }
}
