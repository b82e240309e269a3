use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Face embedding vector (128-dimensional for dlib-style extractors).
///
/// Every embedding compared in one request must come from the same
/// extractor; only the length is checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
    pub values: Vec<f64>,
}

impl Embedding {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// Number of dimensions.
    pub fn dim(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}

impl From<Vec<f64>> for Embedding {
    fn from(values: Vec<f64>) -> Self {
        Self { values }
    }
}

/// Metadata supplied when enrolling a person.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewIdentity {
    pub name: String,
    pub age: Option<u32>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Path of the stored source image. A plain reference; the file's
    /// lifetime is not managed here.
    pub image_path: String,
}

/// An enrolled person as read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub name: String,
    pub age: Option<u32>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub image_path: String,
    pub enrolled_at: DateTime<Utc>,
}

/// One gallery entry: an identity with its single embedding.
#[derive(Debug, Clone)]
pub struct EnrolledFace {
    pub identity: Identity,
    pub embedding: Embedding,
}

/// Outcome of matching a query embedding against a gallery.
///
/// `NoMatch` is an ordinary result, not a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    NoMatch,
    Matched {
        identity: Identity,
        /// Euclidean distance between the query and the matched embedding.
        distance: f64,
    },
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchResult::Matched { .. })
    }

    /// The matched identity, if any.
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            MatchResult::Matched { identity, .. } => Some(identity),
            MatchResult::NoMatch => None,
        }
    }

    pub fn distance(&self) -> Option<f64> {
        match self {
            MatchResult::Matched { distance, .. } => Some(*distance),
            MatchResult::NoMatch => None,
        }
    }
}
