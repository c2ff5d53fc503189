//! error: typed failure kinds of the bank engine.
//!
//! Operations return `anyhow::Result` and attach path context to raw I/O
//! errors. The kinds a caller may want to branch on are raised as `BankError`
//! and can be recovered with `err.downcast_ref::<BankError>()`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BankError {
    /// Missing/invalid cache entry, unknown encoder, unresolved bank name.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Read attempted on a bank that is not valid (or does not exist).
    #[error("unable to load the images from missing bank {}", .0.display())]
    BankNotFound(PathBuf),

    /// Metadata parsed but lacks a usable `bank_config.num_frames`.
    #[error("corrupt metadata in {}: {reason}", .path.display())]
    CorruptMetadata { path: PathBuf, reason: String },

    /// Encoder-level or metadata file is absent.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// File exists but could not be decoded.
    #[error("cannot decode {}: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },

    /// Bank identifier cannot be serialized to JSON.
    #[error("cannot derive bank fingerprint: {0}")]
    InvalidBankId(String),

    /// Selected index outside of the frame sequence.
    #[error("selected index {index} is out of range for {len} frame(s)")]
    IndexOutOfRange { index: i64, len: usize },

    /// Frame/batch dimensions do not line up.
    #[error("shape mismatch: {0}")]
    Shape(String),

    /// A previous series step carries no images.
    #[error("not all previous series have images (step {0} is empty)")]
    IncompleteSeries(usize),
}

impl BankError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        BankError::Configuration(msg.into())
    }

    pub fn decode<P: Into<PathBuf>, S: ToString>(path: P, reason: S) -> Self {
        BankError::Decode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn corrupt<P: Into<PathBuf>, S: Into<String>>(path: P, reason: S) -> Self {
        BankError::CorruptMetadata {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience: look up the `BankError` carried by an `anyhow::Error`, if any.
pub fn bank_error(err: &anyhow::Error) -> Option<&BankError> {
    err.downcast_ref::<BankError>()
}
