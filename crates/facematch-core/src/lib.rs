//! facematch-core — Face identification over pre-extracted embeddings.
//!
//! Matches a query embedding against every enrolled face by Euclidean
//! distance and accepts the nearest one when it falls under a threshold.
//! Embedding extraction and persistence are collaborators behind the
//! [`FaceEncoder`] and [`EmbeddingStore`] traits.

pub mod codec;
pub mod encoder;
pub mod matcher;
pub mod service;
pub mod store;
pub mod types;

pub use codec::CodecError;
pub use encoder::FaceEncoder;
pub use matcher::{Distance, Euclidean, LinearScanMatcher, MatchError, Matcher};
pub use service::{FaceError, FaceService, Identification, ServiceConfig, DEFAULT_MATCH_THRESHOLD};
pub use store::{EmbeddingStore, PersistenceError};
pub use types::{Embedding, EnrolledFace, Identity, MatchResult, NewIdentity};
