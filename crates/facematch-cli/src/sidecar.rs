//! Precomputed face embeddings read from a JSON sidecar file.
//!
//! The vision model runs elsewhere and writes, next to each image,
//! `<image>.faces.json`:
//!
//! ```json
//! { "model": "dlib_resnet_v1", "faces": [[0.01, -0.12, ...], ...] }
//! ```

use facematch_core::{Embedding, FaceEncoder};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

const SIDECAR_SUFFIX: &str = ".faces.json";

#[derive(Error, Debug)]
pub enum SidecarError {
    #[error("face file not found: {0} (run the face extractor on the image first)")]
    NotFound(PathBuf),
    #[error("failed to read face file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid face file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct FaceFile {
    #[serde(default)]
    model: Option<String>,
    faces: Vec<Embedding>,
}

/// [`FaceEncoder`] backed by sidecar JSON files.
#[derive(Debug, Default)]
pub struct SidecarEncoder {
    /// Read this file instead of the image's default sidecar.
    explicit: Option<PathBuf>,
}

impl SidecarEncoder {
    pub fn new(explicit: Option<PathBuf>) -> Self {
        Self { explicit }
    }

    fn path_for(&self, image: &Path) -> PathBuf {
        self.explicit
            .clone()
            .unwrap_or_else(|| sidecar_path(image))
    }
}

/// Default sidecar location: `photo.jpg` → `photo.jpg.faces.json`.
pub fn sidecar_path(image: &Path) -> PathBuf {
    let mut name = image.as_os_str().to_owned();
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

impl FaceEncoder for SidecarEncoder {
    type Error = SidecarError;

    fn encode(&mut self, image: &Path) -> Result<Vec<Embedding>, SidecarError> {
        let path = self.path_for(image);
        let text = std::fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                SidecarError::NotFound(path.clone())
            } else {
                SidecarError::Read {
                    path: path.clone(),
                    source,
                }
            }
        })?;

        let file: FaceFile = serde_json::from_str(&text).map_err(|source| SidecarError::Parse {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(
            path = %path.display(),
            model = file.model.as_deref().unwrap_or("unknown"),
            faces = file.faces.len(),
            "read face file"
        );
        Ok(file.faces)
    }
}
