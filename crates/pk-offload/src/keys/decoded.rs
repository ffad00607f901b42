use std::fmt;

use ecdsa::signature::hazmat::RandomizedPrehashSigner;
use rand_chacha::rand_core::CryptoRngCore;

use super::Curve;
use crate::error::{DecodeError, SignError};

/// A private key decoded from its key file.
///
/// The signing keys zeroize their scalar on drop, so letting a value go out
/// of scope is enough to wipe it. There is deliberately no `Clone`.
pub enum DecodedPrivateKey {
    P256(p256::ecdsa::SigningKey),
    P384(p384::ecdsa::SigningKey),
    Secp256k1(k256::ecdsa::SigningKey),
}

impl DecodedPrivateKey {
    pub(crate) fn from_scalar(curve: Curve, scalar: &[u8]) -> Result<Self, DecodeError> {
        let invalid = |_| DecodeError::InvalidKey(format!("{curve} private scalar is out of range"));
        Ok(match curve {
            Curve::P256 => Self::P256(p256::ecdsa::SigningKey::from_slice(scalar).map_err(invalid)?),
            Curve::P384 => Self::P384(p384::ecdsa::SigningKey::from_slice(scalar).map_err(invalid)?),
            Curve::Secp256k1 => {
                Self::Secp256k1(k256::ecdsa::SigningKey::from_slice(scalar).map_err(invalid)?)
            }
        })
    }

    pub fn curve(&self) -> Curve {
        match self {
            Self::P256(_) => Curve::P256,
            Self::P384(_) => Curve::P384,
            Self::Secp256k1(_) => Curve::Secp256k1,
        }
    }

    /// Uncompressed SEC1 public key (65 bytes for P-256, 97 for P-384).
    pub fn public_key(&self) -> Vec<u8> {
        self.encoded_public_key(false)
    }

    /// Whether `encoded` is this key's public point, compressed or not.
    pub(crate) fn matches_public_key(&self, encoded: &[u8]) -> bool {
        encoded == self.encoded_public_key(false).as_slice()
            || encoded == self.encoded_public_key(true).as_slice()
    }

    fn encoded_public_key(&self, compress: bool) -> Vec<u8> {
        match self {
            Self::P256(key) => key.verifying_key().to_encoded_point(compress).as_bytes().to_vec(),
            Self::P384(key) => key.verifying_key().to_encoded_point(compress).as_bytes().to_vec(),
            Self::Secp256k1(key) => {
                key.verifying_key().to_encoded_point(compress).as_bytes().to_vec()
            }
        }
    }

    /// Sign an already-hashed digest, returning the DER-encoded signature.
    ///
    /// The per-signature nonce is mixed with bytes drawn from `rng`, which
    /// must be the handshake session's generator.
    pub fn sign_prehash(
        &self,
        digest: &[u8],
        mut rng: &mut dyn CryptoRngCore,
    ) -> Result<Vec<u8>, SignError> {
        let failed = |e: ecdsa::Error| SignError::SigningFailed(e.to_string());
        let der = match self {
            Self::P256(key) => {
                let signature: p256::ecdsa::Signature =
                    key.sign_prehash_with_rng(&mut rng, digest).map_err(failed)?;
                signature.to_der().as_bytes().to_vec()
            }
            Self::P384(key) => {
                let signature: p384::ecdsa::Signature =
                    key.sign_prehash_with_rng(&mut rng, digest).map_err(failed)?;
                signature.to_der().as_bytes().to_vec()
            }
            Self::Secp256k1(key) => {
                let signature: k256::ecdsa::Signature =
                    key.sign_prehash_with_rng(&mut rng, digest).map_err(failed)?;
                signature.to_der().as_bytes().to_vec()
            }
        };
        Ok(der)
    }
}

impl fmt::Debug for DecodedPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedPrivateKey")
            .field("curve", &self.curve())
            .finish_non_exhaustive()
    }
}
