use std::path::Path;

use rand_chacha::rand_core::CryptoRngCore;
use tracing::{debug, warn};

use crate::context::{CallbackContext, OperationState};
use crate::error::{KeyError, SignError};
use crate::keys::{self, Curve, KeyFormat};

/// The handshake engine's own view of the long-term key: which curve the
/// negotiated suite signs with, and the public half from its certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NominalKey {
    curve: Curve,
    public_key: Vec<u8>,
}

impl NominalKey {
    pub fn new(curve: Curve, public_key: impl Into<Vec<u8>>) -> Self {
        Self {
            curve,
            public_key: public_key.into(),
        }
    }

    /// Derive the nominal key from a private key file. The decoded secret is
    /// dropped before this returns.
    pub fn from_key_file(path: impl AsRef<Path>, format: KeyFormat) -> Result<Self, KeyError> {
        let key = keys::load_private_key(path, format)?;
        Ok(Self::new(key.curve(), key.public_key()))
    }

    pub fn curve(&self) -> Curve {
        self.curve
    }

    /// Uncompressed SEC1 public key.
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }
}

/// One signature the engine needs. The length of `out` is its capacity.
#[derive(Debug)]
pub struct SignRequest<'a> {
    pub digest: &'a [u8],
    pub out: &'a mut [u8],
}

/// Non-error outcome of a sign call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum SignStatus {
    /// `len` bytes of DER signature were written to the front of `out`.
    Complete(usize),
    /// Not ready yet. The caller must invoke again with the same context.
    Pending,
}

/// An external provider for private-key operations.
///
/// Implementations are sync and must return promptly: deferred work is
/// reported as [`SignStatus::Pending`] instead of blocking.
pub trait SignCallback: Send + Sync {
    fn sign(
        &self,
        context: &mut CallbackContext,
        request: SignRequest<'_>,
        key: &NominalKey,
        rng: &mut dyn CryptoRngCore,
    ) -> Result<SignStatus, SignError>;
}

/// ECDSA signing from a key file, with optional simulated hardware latency.
///
/// With pending simulation on, the first call of a request only marks the
/// context pending. The following call reads the key file, signs, and puts
/// the context back to idle whatever the outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct EccSignExecutor;

impl SignCallback for EccSignExecutor {
    fn sign(
        &self,
        context: &mut CallbackContext,
        request: SignRequest<'_>,
        key: &NominalKey,
        rng: &mut dyn CryptoRngCore,
    ) -> Result<SignStatus, SignError> {
        debug!(
            digest_len = request.digest.len(),
            capacity = request.out.len(),
            key_file = %context.key_file(),
            "ecc sign requested"
        );

        if context.simulates_pending() && context.state() == OperationState::Idle {
            context.set_state(OperationState::Pending);
            debug!("ecc sign handed to simulated hardware");
            return Ok(SignStatus::Pending);
        }

        let result = sign_from_key_file(context, request, key, rng);
        context.set_state(OperationState::Idle);

        match &result {
            Ok(SignStatus::Complete(len)) => debug!(len, "ecc sign complete"),
            Ok(SignStatus::Pending) => {}
            Err(e) => warn!(error = %e, "ecc sign failed"),
        }
        result
    }
}

fn sign_from_key_file(
    context: &CallbackContext,
    request: SignRequest<'_>,
    key: &NominalKey,
    rng: &mut dyn CryptoRngCore,
) -> Result<SignStatus, SignError> {
    let private_key = keys::load_private_key(context.key_file(), context.key_format())
        .map_err(SignError::KeyUnavailable)?;
    debug!(curve = %private_key.curve(), "decoded private key");

    if private_key.curve() != key.curve() {
        return Err(SignError::AlgorithmMismatch {
            expected: key.curve(),
            found: private_key.curve(),
        });
    }

    let needed = private_key.curve().max_signature_len();
    if request.out.len() < needed {
        return Err(SignError::BufferTooSmall {
            needed,
            capacity: request.out.len(),
        });
    }

    let signature = private_key.sign_prehash(request.digest, rng)?;
    request.out[..signature.len()].copy_from_slice(&signature);
    Ok(SignStatus::Complete(signature.len()))
}
