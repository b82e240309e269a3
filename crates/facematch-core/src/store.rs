//! Persistence seam for enrolled identities.

use crate::codec::CodecError;
use crate::types::{Embedding, EnrolledFace, Identity, NewIdentity};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store rejected write: {0}")]
    Rejected(String),
    #[error("stored embedding for identity {identity_id} is corrupt: {source}")]
    Corrupt {
        identity_id: i64,
        #[source]
        source: CodecError,
    },
    #[error("store error: {0}")]
    Backend(String),
}

/// Durable mapping from enrolled identities to their embeddings.
pub trait EmbeddingStore {
    /// Persist an identity and its embedding as one unit.
    ///
    /// On error nothing is left behind: either both the identity row and
    /// its embedding are committed, or neither is.
    fn enroll(
        &mut self,
        identity: &NewIdentity,
        embedding: &Embedding,
    ) -> Result<Identity, PersistenceError>;

    /// Every enrolled identity with its embedding. Order is unspecified.
    fn all(&self) -> Result<Vec<EnrolledFace>, PersistenceError>;

    /// Number of enrolled identities.
    fn count(&self) -> Result<usize, PersistenceError>;
}
