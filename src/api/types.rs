use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Backend-assigned key correlating an answer with later feedback.
///
/// The backend may send either a JSON string or an integer. Equality and
/// hashing go by the textual form, so `42` and `"42"` name the same answer,
/// but serialization echoes the id back in the form it arrived in.
#[derive(Debug, Clone)]
pub struct InteractionId {
    text: String,
    numeric: bool,
}

impl InteractionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            text: id.into(),
            numeric: false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// True when the backend sent this id as a JSON integer.
    pub fn is_numeric(&self) -> bool {
        self.numeric
    }
}

impl From<i64> for InteractionId {
    fn from(id: i64) -> Self {
        Self {
            text: id.to_string(),
            numeric: true,
        }
    }
}

impl PartialEq for InteractionId {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for InteractionId {}

impl Hash for InteractionId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl std::fmt::Display for InteractionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

impl Serialize for InteractionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.text.parse::<i64>() {
            Ok(n) if self.numeric => serializer.serialize_i64(n),
            _ => serializer.serialize_str(&self.text),
        }
    }
}

impl<'de> Deserialize<'de> for InteractionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Integer(i64),
            Text(String),
        }

        Ok(match Wire::deserialize(deserializer)? {
            Wire::Integer(n) => InteractionId::from(n),
            Wire::Text(s) => InteractionId::new(s),
        })
    }
}

/// Opaque retrieval diagnostics, passed through unmodified.
pub type RetrievalMetrics = serde_json::Map<String, serde_json::Value>;

/// Body of `POST /query`.
#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest {
    pub question: String,
}

/// Response of `POST /query`.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub interaction_id: InteractionId,
    #[serde(default)]
    pub file_references: Option<Vec<String>>,
    #[serde(default)]
    pub retrieval_metrics: Option<RetrievalMetrics>,
}

/// User rating of an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    Positive,
    Negative,
}

impl Rating {
    /// Wire value: +1 or -1.
    pub fn score(self) -> i8 {
        match self {
            Rating::Positive => 1,
            Rating::Negative => -1,
        }
    }
}

/// Body of `POST /feedback`. `comment` is always sent as `null`.
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackRequest {
    pub interaction_id: InteractionId,
    pub rating: i8,
    pub comment: Option<String>,
}

impl FeedbackRequest {
    pub fn new(interaction_id: InteractionId, rating: Rating) -> Self {
        Self {
            interaction_id,
            rating: rating.score(),
            comment: None,
        }
    }
}

// Dashboard aggregates. Shapes are owned by the backend; only the fields
// the dashboard reads are declared.

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FeedbackStats {
    pub positive_feedback: u64,
    pub negative_feedback: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResponseTimeStats {
    pub min_response_time: f64,
    pub average_response_time: f64,
    pub max_response_time: f64,
}

/// Topic name to query count.
pub type QueryTopics = BTreeMap<String, u64>;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UsageStats {
    pub total_queries: u64,
    pub queries_last_week: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AnswerMetrics {
    #[serde(default)]
    pub average_tokens: f64,
}

/// A single hit from `/api/search`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchHit>,
}
