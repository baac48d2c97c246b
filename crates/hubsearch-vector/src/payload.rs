//! Typed point payloads.
//!
//! On the wire a payload is a flat JSON object. In Rust it is a tagged
//! union of the record types the store knows about, plus timestamps and an
//! open extension map for everything else. Conversion is lossless for
//! well-formed payloads; anything that does not parse as a known kind
//! comes back as [`PayloadKind::Generic`] with all fields in `extra`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Key holding the record type tag.
pub const TYPE_KEY: &str = "type";
/// Key holding the creation stamp (RFC 3339).
pub const CREATED_AT_KEY: &str = "createdAt";
/// Key holding the last-write stamp (RFC 3339).
pub const UPDATED_AT_KEY: &str = "updatedAt";

/// Well-known record types and their typed fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum PayloadKind {
    /// An embedded conversation transcript.
    Conversation {
        /// Conversation id.
        conversation_id: String,
        /// Participant, when known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        /// Messages in the transcript.
        #[serde(default)]
        message_count: usize,
    },
    /// A user memory note.
    UserMemory {
        /// Note id.
        memory_id: String,
        /// Owner.
        user_id: String,
        /// Category.
        memory_type: String,
        /// Optional weight.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        importance: Option<f32>,
    },
    /// An institutional knowledge fact.
    Institutional {
        /// Fact id.
        fact_id: String,
        /// Category.
        knowledge_type: String,
        /// Short title.
        title: String,
        /// Origin.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    /// A project abstract.
    Project {
        /// Project id in the relational store.
        project_id: String,
        /// Project title.
        title: String,
        /// Lifecycle status.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<String>,
        /// Supervising user.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        supervisor_id: Option<String>,
    },
    /// No typed fields; everything lives in `extra`.
    Generic,
}

impl PayloadKind {
    /// The wire tag.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Conversation { .. } => "conversation",
            Self::UserMemory { .. } => "user_memory",
            Self::Institutional { .. } => "institutional",
            Self::Project { .. } => "project",
            Self::Generic => "generic",
        }
    }
}

/// A point payload: typed kind, write stamps, and open extension fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    /// Record type and its typed fields.
    pub kind: PayloadKind,
    /// First write; stamped by the store when absent.
    pub created_at: Option<DateTime<Utc>>,
    /// Last write; refreshed by the store on every write.
    pub updated_at: Option<DateTime<Utc>>,
    /// Fields outside the typed set.
    pub extra: Map<String, Value>,
}

impl Payload {
    /// A payload of the given kind with no stamps or extra fields.
    pub fn new(kind: PayloadKind) -> Self {
        Self {
            kind,
            created_at: None,
            updated_at: None,
            extra: Map::new(),
        }
    }

    /// An untyped payload.
    pub fn generic() -> Self {
        Self::new(PayloadKind::Generic)
    }

    /// Adds an extension field.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Look a field up on the flattened form (typed fields, stamps, extras).
    pub fn get(&self, key: &str) -> Option<Value> {
        self.to_map().remove(key)
    }

    /// Flatten to the wire form.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = self.extra.clone();
        match serde_json::to_value(&self.kind) {
            Ok(Value::Object(typed)) => {
                let keep_custom_type =
                    matches!(self.kind, PayloadKind::Generic) && map.contains_key(TYPE_KEY);
                for (k, v) in typed {
                    if k == TYPE_KEY && keep_custom_type {
                        continue;
                    }
                    map.insert(k, v);
                }
            }
            _ => {
                map.entry(TYPE_KEY)
                    .or_insert_with(|| Value::from(self.kind.tag()));
            }
        }
        if let Some(ts) = self.created_at {
            map.insert(CREATED_AT_KEY.into(), Value::from(ts.to_rfc3339()));
        }
        if let Some(ts) = self.updated_at {
            map.insert(UPDATED_AT_KEY.into(), Value::from(ts.to_rfc3339()));
        }
        map
    }

    /// Consume into the wire form.
    pub fn into_map(self) -> Map<String, Value> {
        self.to_map()
    }

    /// Parse the wire form. Never fails.
    pub fn from_map(mut map: Map<String, Value>) -> Self {
        let created_at = take_timestamp(&mut map, CREATED_AT_KEY);
        let updated_at = take_timestamp(&mut map, UPDATED_AT_KEY);

        let kind = serde_json::from_value::<PayloadKind>(Value::Object(map.clone()))
            .unwrap_or(PayloadKind::Generic);

        match &kind {
            PayloadKind::Generic => {
                if map.get(TYPE_KEY).and_then(Value::as_str) == Some("generic") {
                    map.remove(TYPE_KEY);
                }
            }
            typed => {
                if let Ok(Value::Object(known)) = serde_json::to_value(typed) {
                    for key in known.keys() {
                        map.remove(key);
                    }
                }
            }
        }

        Self {
            kind,
            created_at,
            updated_at,
            extra: map,
        }
    }
}

fn take_timestamp(map: &mut Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    let parsed = map
        .get(key)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|ts| ts.with_timezone(&Utc));
    if parsed.is_some() {
        map.remove(key);
    }
    parsed
}

impl Default for Payload {
    fn default() -> Self {
        Self::generic()
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(map: Map<String, Value>) -> Self {
        Self::from_map(map)
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Map::<String, Value>::deserialize(deserializer).map(Self::from_map)
    }
}

// ============================================================================
// Tests
// ============================================================================
