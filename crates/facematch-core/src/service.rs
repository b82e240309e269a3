//! Enrollment and identification over a store and a matcher.

use crate::encoder::FaceEncoder;
use crate::matcher::{LinearScanMatcher, MatchError, Matcher};
use crate::store::{EmbeddingStore, PersistenceError};
use crate::types::{Embedding, Identity, MatchResult, NewIdentity};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

/// Operating point for the Euclidean acceptance threshold.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.5;

#[derive(Error, Debug)]
pub enum FaceError {
    #[error("no face detected in the source image")]
    NoFaceDetected,
    #[error("face encoder returned an empty embedding")]
    EmptyEmbedding,
    #[error("face encoder failed: {0}")]
    Encoder(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Match(#[from] MatchError),
}

/// Matching parameters, fixed for the lifetime of a [`FaceService`].
#[derive(Debug, Clone, Copy)]
pub struct ServiceConfig {
    /// Matches at or above this Euclidean distance are rejected.
    pub match_threshold: f64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            match_threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }
}

/// Caller-facing outcome of an identification request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Identification {
    Matched {
        identity: Identity,
        /// Stored source image of the matched person.
        reference_image: String,
        distance: f64,
    },
    NoMatch,
}

impl From<MatchResult> for Identification {
    fn from(result: MatchResult) -> Self {
        match result {
            MatchResult::Matched { identity, distance } => Identification::Matched {
                reference_image: identity.image_path.clone(),
                identity,
                distance,
            },
            MatchResult::NoMatch => Identification::NoMatch,
        }
    }
}

/// Enrolls people and identifies unknown faces against them.
pub struct FaceService<S, M = LinearScanMatcher> {
    store: S,
    matcher: M,
    config: ServiceConfig,
}

impl<S: EmbeddingStore> FaceService<S> {
    /// Service with the default exhaustive Euclidean matcher.
    pub fn new(store: S, config: ServiceConfig) -> Self {
        Self::with_matcher(store, LinearScanMatcher::new(), config)
    }
}

impl<S: EmbeddingStore, M: Matcher> FaceService<S, M> {
    pub fn with_matcher(store: S, matcher: M, config: ServiceConfig) -> Self {
        Self {
            store,
            matcher,
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Enroll a person using the first detected face.
    pub fn enroll(
        &mut self,
        identity: &NewIdentity,
        faces: Vec<Embedding>,
    ) -> Result<Identity, FaceError> {
        let face_count = faces.len();
        let embedding = first_face(faces)?;
        if embedding.is_empty() {
            return Err(FaceError::EmptyEmbedding);
        }
        if face_count > 1 {
            tracing::info!(faces = face_count, "multiple faces detected; enrolling the first");
        }

        let enrolled = self.store.enroll(identity, &embedding)?;
        tracing::info!(
            id = enrolled.id,
            name = %enrolled.name,
            dim = embedding.dim(),
            "identity enrolled"
        );
        Ok(enrolled)
    }

    /// Identify the first detected face against every enrolled identity.
    pub fn identify(&self, faces: Vec<Embedding>) -> Result<Identification, FaceError> {
        let query = first_face(faces)?;

        let gallery = self.store.all()?;
        if gallery.is_empty() {
            tracing::info!("no identities enrolled; nothing to match against");
        }

        let result = self
            .matcher
            .identify(&query, &gallery, self.config.match_threshold)?;

        match &result {
            MatchResult::Matched { identity, distance } => tracing::info!(
                id = identity.id,
                name = %identity.name,
                distance,
                gallery = gallery.len(),
                "face matched"
            ),
            MatchResult::NoMatch => tracing::info!(
                gallery = gallery.len(),
                threshold = self.config.match_threshold,
                "no matching face"
            ),
        }

        Ok(result.into())
    }

    /// Extract faces from `image` with `encoder`, then [`enroll`](Self::enroll).
    pub fn enroll_image<E: FaceEncoder>(
        &mut self,
        encoder: &mut E,
        image: &Path,
        identity: &NewIdentity,
    ) -> Result<Identity, FaceError> {
        let faces = encode(encoder, image)?;
        self.enroll(identity, faces)
    }

    /// Extract faces from `image` with `encoder`, then [`identify`](Self::identify).
    pub fn identify_image<E: FaceEncoder>(
        &self,
        encoder: &mut E,
        image: &Path,
    ) -> Result<Identification, FaceError> {
        let faces = encode(encoder, image)?;
        self.identify(faces)
    }
}

fn encode<E: FaceEncoder>(encoder: &mut E, image: &Path) -> Result<Vec<Embedding>, FaceError> {
    let faces = encoder
        .encode(image)
        .map_err(|e| FaceError::Encoder(Box::new(e)))?;
    tracing::debug!(image = %image.display(), faces = faces.len(), "faces encoded");
    Ok(faces)
}

fn first_face(faces: Vec<Embedding>) -> Result<Embedding, FaceError> {
    faces.into_iter().next().ok_or(FaceError::NoFaceDetected)
}
