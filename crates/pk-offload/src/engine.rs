//! Minimal handshake engine calling convention.
//!
//! Stands in for a TLS engine that offloads its CertificateVerify-style
//! signature through the [`CallbackRegistry`]. Only the part of the engine
//! that matters to the offload contract is modelled: `advance` either finishes
//! the signing step, asks to be called again, or fails the handshake.

use std::sync::Arc;

use rand::rngs::OsRng;
use rand_chacha::ChaCha20Rng;
use rand_chacha::rand_core::{CryptoRngCore, SeedableRng};
use tracing::{debug, info, warn};

use crate::context::CallbackContext;
use crate::error::{HandshakeError, SignError};
use crate::executor::{NominalKey, SignCallback, SignRequest, SignStatus};
use crate::keys;
use crate::registry::{CallbackRegistry, OperationKind};

/// Engine-wide configuration shared by every session.
#[derive(Debug)]
pub struct EngineConfig {
    nominal_key: NominalKey,
    registry: CallbackRegistry,
}

impl EngineConfig {
    pub fn new(nominal_key: NominalKey) -> Self {
        Self {
            nominal_key,
            registry: CallbackRegistry::new(),
        }
    }

    /// Route ECC signatures through `callback` instead of a local key.
    pub fn set_sign_callback(&mut self, callback: impl SignCallback + 'static) {
        if self
            .registry
            .register(OperationKind::EccSign, callback)
            .is_some()
        {
            debug!("replaced existing ecc sign callback");
        }
    }

    pub fn nominal_key(&self) -> &NominalKey {
        &self.nominal_key
    }

    pub fn registry(&self) -> &CallbackRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut CallbackRegistry {
        &mut self.registry
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    InProgress,
    Complete,
    Failed,
}

/// Result of one `advance` call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum HandshakeStatus {
    Complete,
    /// The sign callback is still working. Not fatal: call `advance` again.
    WantRetry,
}

/// One connection's handshake.
///
/// A pending signature leaves the session parked on the signing step, so
/// the retry reaches the callback with the same digest and the same context.
pub struct Session<R = ChaCha20Rng> {
    config: Arc<EngineConfig>,
    context: Option<CallbackContext>,
    rng: R,
    digest: Vec<u8>,
    state: HandshakeState,
    signature: Option<Vec<u8>>,
    pending_retries: u32,
}

impl Session<ChaCha20Rng> {
    /// Start a session whose generator is seeded from the OS.
    pub fn new(config: Arc<EngineConfig>, transcript: &[u8]) -> Result<Self, rand::Error> {
        let rng = ChaCha20Rng::from_rng(OsRng)?;
        Ok(Self::with_rng(config, transcript, rng))
    }
}

impl<R: CryptoRngCore> Session<R> {
    pub fn with_rng(config: Arc<EngineConfig>, transcript: &[u8], rng: R) -> Self {
        let digest = config.nominal_key().curve().transcript_digest(transcript);
        Self {
            config,
            context: None,
            rng,
            digest,
            state: HandshakeState::InProgress,
            signature: None,
            pending_retries: 0,
        }
    }

    /// Attach the context every sign callback for this session receives,
    /// handing back any context attached before.
    pub fn attach_context(&mut self, context: CallbackContext) -> Option<CallbackContext> {
        self.context.replace(context)
    }

    pub fn detach_context(&mut self) -> Option<CallbackContext> {
        self.context.take()
    }

    pub fn context(&self) -> Option<&CallbackContext> {
        self.context.as_ref()
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn transcript_digest(&self) -> &[u8] {
        &self.digest
    }

    /// The offloaded signature, once the handshake is complete.
    pub fn signature(&self) -> Option<&[u8]> {
        self.signature.as_deref()
    }

    /// How many times the callback has answered pending.
    pub fn pending_retries(&self) -> u32 {
        self.pending_retries
    }

    /// Drive the handshake forward.
    ///
    /// `Ok(WantRetry)` means the callback deferred; the caller should do
    /// other work and call again. Any error leaves the session failed.
    pub fn advance(&mut self) -> Result<HandshakeStatus, HandshakeError> {
        match self.state {
            HandshakeState::Complete => return Ok(HandshakeStatus::Complete),
            HandshakeState::Failed => return Err(HandshakeError::Failed),
            HandshakeState::InProgress => {}
        }

        match self.sign_step() {
            Ok(status) => Ok(status),
            Err(e) => {
                warn!(error = %e, "handshake failed");
                self.state = HandshakeState::Failed;
                Err(e)
            }
        }
    }

    fn sign_step(&mut self) -> Result<HandshakeStatus, HandshakeError> {
        let callback = self
            .config
            .registry()
            .get(OperationKind::EccSign)
            .ok_or(HandshakeError::NoSignCallback(OperationKind::EccSign))?;
        let context = self.context.as_mut().ok_or(HandshakeError::NoContext)?;
        let nominal = self.config.nominal_key();

        let mut out = vec![0u8; nominal.curve().max_signature_len()];
        let request = SignRequest {
            digest: &self.digest,
            out: &mut out,
        };

        match callback.sign(context, request, nominal, &mut self.rng)? {
            SignStatus::Pending => {
                self.pending_retries += 1;
                debug!(retries = self.pending_retries, "sign callback pending");
                Ok(HandshakeStatus::WantRetry)
            }
            SignStatus::Complete(len) => {
                let signature = out.get(..len).ok_or_else(|| {
                    HandshakeError::Sign(SignError::SigningFailed(format!(
                        "callback reported {len} bytes for a {} byte buffer",
                        out.len()
                    )))
                })?;
                keys::verify_prehash(nominal.curve(), nominal.public_key(), &self.digest, signature)
                    .map_err(|_| HandshakeError::SignatureRejected)?;

                info!(
                    signature_len = len,
                    retries = self.pending_retries,
                    "handshake complete"
                );
                self.signature = Some(signature.to_vec());
                self.state = HandshakeState::Complete;
                Ok(HandshakeStatus::Complete)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::EccSignExecutor;
    use crate::keys::{Curve, KeyFormat};
    use std::path::{Path, PathBuf};

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    fn config() -> Arc<EngineConfig> {
        let nominal = NominalKey::from_key_file(fixture("ecc-key.pem"), KeyFormat::Pem).unwrap();
        let mut config = EngineConfig::new(nominal);
        config.set_sign_callback(EccSignExecutor);
        Arc::new(config)
    }

    fn session(config: Arc<EngineConfig>) -> Session {
        Session::with_rng(config, b"client hello, server hello", ChaCha20Rng::seed_from_u64(3))
    }

    #[test]
    fn digest_uses_curve_hash() {
        let session = session(config());
        assert_eq!(
            session.transcript_digest(),
            Curve::P256.transcript_digest(b"client hello, server hello").as_slice()
        );
    }

    #[test]
    fn completes_in_one_advance_without_simulation() {
        let mut session = session(config());
        session.attach_context(CallbackContext::new(fixture("ecc-key.pem")));

        assert_eq!(session.advance().unwrap(), HandshakeStatus::Complete);
        assert_eq!(session.state(), HandshakeState::Complete);
        assert_eq!(session.pending_retries(), 0);
        assert!(session.signature().is_some());
    }

    #[test]
    fn advance_after_complete_is_idempotent() {
        let mut session = session(config());
        session.attach_context(CallbackContext::new(fixture("ecc-key.pem")));
        assert_eq!(session.advance().unwrap(), HandshakeStatus::Complete);
        let signature = session.signature().unwrap().to_vec();

        assert_eq!(session.advance().unwrap(), HandshakeStatus::Complete);
        assert_eq!(session.signature().unwrap(), signature.as_slice());
    }

    #[test]
    fn missing_callback_fails() {
        let nominal = NominalKey::from_key_file(fixture("ecc-key.pem"), KeyFormat::Pem).unwrap();
        let mut session = session(Arc::new(EngineConfig::new(nominal)));
        session.attach_context(CallbackContext::new(fixture("ecc-key.pem")));

        let err = session.advance().unwrap_err();
        assert!(matches!(err, HandshakeError::NoSignCallback(OperationKind::EccSign)));
        assert_eq!(session.state(), HandshakeState::Failed);
    }

    #[test]
    fn missing_context_fails() {
        let mut session = session(config());
        let err = session.advance().unwrap_err();
        assert!(matches!(err, HandshakeError::NoContext));
        assert!(matches!(session.advance().unwrap_err(), HandshakeError::Failed));
    }

    #[test]
    fn attach_replaces_previous_context() {
        let mut session = session(config());
        assert!(session.attach_context(CallbackContext::new("/first")).is_none());
        let previous = session.attach_context(CallbackContext::new("/second")).unwrap();
        assert_eq!(previous.key_file().path(), Path::new("/first"));
        assert_eq!(
            session.context().unwrap().key_file().path(),
            Path::new("/second")
        );
    }

    #[test]
    fn wrong_key_of_same_curve_is_rejected() {
        let nominal = NominalKey::from_key_file(fixture("ecc-key.pem"), KeyFormat::Pem).unwrap();
        let other = keys::DecodedPrivateKey::from_scalar(Curve::P256, &[0x33; 32]).unwrap();
        let mut config = EngineConfig::new(NominalKey::new(nominal.curve(), other.public_key()));
        config.set_sign_callback(EccSignExecutor);

        let mut session = session(Arc::new(config));
        session.attach_context(CallbackContext::new(fixture("ecc-key.pem")));
        let err = session.advance().unwrap_err();
        assert!(matches!(err, HandshakeError::SignatureRejected));
    }
}
