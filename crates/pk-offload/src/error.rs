use std::path::PathBuf;
use std::time::Duration;

use crate::keys::Curve;
use crate::registry::OperationKind;

/// Failure to read key material from storage.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("key file not found: {}", path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read key file {}: {source}", path.display())]
    ReadFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("key file is empty: {}", path.display())]
    Empty { path: PathBuf },
}

/// Failure to turn loaded bytes into a private key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The text envelope could not be stripped.
    #[error("malformed key encoding: {0}")]
    MalformedEncoding(String),
    /// The inner structure is not a usable EC private key.
    #[error("invalid private key: {0}")]
    InvalidKey(String),
}

/// Either half of the loader failing.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Terminal failure of one sign operation.
///
/// Deferred completion is not an error and never shows up here; it is
/// reported as [`crate::SignStatus::Pending`].
#[derive(Debug, thiserror::Error)]
pub enum SignError {
    #[error("private key unavailable: {0}")]
    KeyUnavailable(#[source] KeyError),
    #[error("signature buffer too small: need {needed} bytes, have {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },
    #[error("key algorithm mismatch: handshake expects {expected}, key file holds {found}")]
    AlgorithmMismatch { expected: Curve, found: Curve },
    #[error("signing failed: {0}")]
    SigningFailed(String),
}

/// Failure surfaced by the handshake engine's advance operation.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("no callback registered for {0:?}")]
    NoSignCallback(OperationKind),
    #[error("no callback context attached to the session")]
    NoContext,
    #[error("offloaded sign operation failed: {0}")]
    Sign(#[from] SignError),
    #[error("offloaded signature rejected by the nominal public key")]
    SignatureRejected,
    #[error("handshake already failed")]
    Failed,
}

/// Failure of the caller-side retry loop around `advance`.
#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error("handshake did not complete within {0:?}")]
    TimedOut(Duration),
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
}
