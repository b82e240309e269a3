//! Source image intake: type check, file name sanitizing, and copying into
//! the upload folder.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("unsupported image type {0:?}; allowed: {1}")]
    UnsupportedType(String, String),
    #[error("image path has no usable file name: {0}")]
    BadFileName(PathBuf),
    #[error("failed to create upload folder {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

/// Reject images whose extension is not in `allowed` (case-insensitive).
pub fn check_image_type(image: &Path, allowed: &[String]) -> Result<(), IntakeError> {
    let ext = image
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if allowed.iter().any(|a| *a == ext) {
        Ok(())
    } else {
        Err(IntakeError::UnsupportedType(ext, allowed.join(", ")))
    }
}

/// Reduce a file name to `[A-Za-z0-9._-]`, without leading dots.
///
/// Returns `None` when nothing usable remains.
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_' || c == '.') {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Copy `image` into `upload_dir` under a sanitized name, never overwriting
/// an existing upload. Returns the stored path.
pub fn store_image(
    image: &Path,
    upload_dir: &Path,
    allowed: &[String],
) -> Result<PathBuf, IntakeError> {
    check_image_type(image, allowed)?;

    let name = image
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(sanitize_file_name)
        .ok_or_else(|| IntakeError::BadFileName(image.to_path_buf()))?;

    std::fs::create_dir_all(upload_dir).map_err(|source| IntakeError::CreateDir {
        path: upload_dir.to_path_buf(),
        source,
    })?;

    let mut src = File::open(image).map_err(|source| IntakeError::Copy {
        from: image.to_path_buf(),
        to: upload_dir.join(&name),
        source,
    })?;
    let (dest, mut out) = create_unique(upload_dir, &name).map_err(|(to, source)| {
        IntakeError::Copy {
            from: image.to_path_buf(),
            to,
            source,
        }
    })?;

    if let Err(source) = io::copy(&mut src, &mut out) {
        drop(out);
        let _ = std::fs::remove_file(&dest);
        return Err(IntakeError::Copy {
            from: image.to_path_buf(),
            to: dest,
            source,
        });
    }

    tracing::debug!(from = %image.display(), to = %dest.display(), "image stored");
    Ok(dest)
}

/// Create `dir/name`, or `dir/stem-N.ext` for the first N that does not
/// exist yet. Creation is exclusive.
fn create_unique(dir: &Path, name: &str) -> Result<(PathBuf, File), (PathBuf, io::Error)> {
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) => (stem, format!(".{ext}")),
        None => (name, String::new()),
    };

    for n in 0u32.. {
        let candidate = if n == 0 {
            dir.join(name)
        } else {
            dir.join(format!("{stem}-{n}{ext}"))
        };
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err((candidate, e)),
        }
    }

    let exhausted = io::Error::new(io::ErrorKind::AlreadyExists, "no free upload file name");
    Err((dir.join(name), exhausted))
}
