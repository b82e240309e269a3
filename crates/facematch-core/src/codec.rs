//! Embedding blob encoding.
//!
//! An embedding is stored as its `f64` values laid end to end, 8 bytes each,
//! in native byte order. Decoding is the exact inverse, so stored vectors
//! read back bit-for-bit.

use thiserror::Error;

const F64_WIDTH: usize = std::mem::size_of::<f64>();

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("embedding blob of {len} bytes is not a whole number of f64 values")]
    Truncated { len: usize },
}

/// Encode embedding values as a native-endian `f64` blob.
pub fn encode(values: &[f64]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(values.len() * F64_WIDTH);
    for v in values {
        blob.extend_from_slice(&v.to_ne_bytes());
    }
    blob
}

/// Decode a native-endian `f64` blob back into embedding values.
pub fn decode(blob: &[u8]) -> Result<Vec<f64>, CodecError> {
    if blob.len() % F64_WIDTH != 0 {
        return Err(CodecError::Truncated { len: blob.len() });
    }

    Ok(blob
        .chunks_exact(F64_WIDTH)
        .map(|chunk| {
            let mut bytes = [0u8; F64_WIDTH];
            bytes.copy_from_slice(chunk);
            f64::from_ne_bytes(bytes)
        })
        .collect())
}
