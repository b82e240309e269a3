//! Face embedding extraction seam.
//!
//! Turning pixels into embeddings is done outside this crate (a vision
//! model or a precomputed sidecar); implementors only report what they found.

use crate::types::Embedding;
use std::path::Path;

/// Produces one embedding per detected face in an image.
pub trait FaceEncoder {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Embeddings for every face found in `image`, in detection order.
    /// An empty vector means no face was detected.
    fn encode(&mut self, image: &Path) -> Result<Vec<Embedding>, Self::Error>;
}
