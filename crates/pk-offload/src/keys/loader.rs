use std::io::ErrorKind;
use std::path::Path;

use der::asn1::ObjectIdentifier;
use tracing::trace;
use zeroize::Zeroizing;

use super::{Curve, DecodedPrivateKey, KeyFormat, envelope};
use crate::error::{DecodeError, IoError, KeyError};

const ID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");

/// Read a whole key file into a buffer that is wiped when dropped.
pub fn load_file(path: impl AsRef<Path>) -> Result<Zeroizing<Vec<u8>>, IoError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => IoError::NotFound {
            path: path.to_path_buf(),
            source,
        },
        _ => IoError::ReadFailure {
            path: path.to_path_buf(),
            source,
        },
    })?;
    let bytes = Zeroizing::new(bytes);

    if bytes.is_empty() {
        return Err(IoError::Empty {
            path: path.to_path_buf(),
        });
    }

    trace!(path = %path.display(), len = bytes.len(), "read key file");
    Ok(bytes)
}

/// Decode an EC private key from SEC1 or PKCS#8, optionally PEM-wrapped.
pub fn decode_private_key(bytes: &[u8], format: KeyFormat) -> Result<DecodedPrivateKey, DecodeError> {
    match format {
        KeyFormat::Pem => {
            let envelope = envelope::strip(bytes)?;
            match envelope.label.as_str() {
                "EC PRIVATE KEY" => decode_sec1(&envelope.der, None),
                "PRIVATE KEY" => decode_pkcs8(&envelope.der),
                "ENCRYPTED PRIVATE KEY" => Err(DecodeError::InvalidKey(
                    "encrypted private keys are not supported".into(),
                )),
                other => Err(DecodeError::InvalidKey(format!(
                    "`{other}` is not an EC private key"
                ))),
            }
        }
        KeyFormat::Der => match sec1::EcPrivateKey::try_from(bytes) {
            Ok(_) => decode_sec1(bytes, None),
            Err(_) => decode_pkcs8(bytes),
        },
    }
}

/// Read and decode in one step. Nothing is cached between calls.
pub fn load_private_key(
    path: impl AsRef<Path>,
    format: KeyFormat,
) -> Result<DecodedPrivateKey, KeyError> {
    let bytes = load_file(path)?;
    Ok(decode_private_key(&bytes, format)?)
}

fn decode_sec1(der: &[u8], outer: Option<Curve>) -> Result<DecodedPrivateKey, DecodeError> {
    let key = sec1::EcPrivateKey::try_from(der)
        .map_err(|e| DecodeError::InvalidKey(format!("not a SEC1 EC private key: {e}")))?;

    let inner = key.parameters.as_ref().and_then(|params| params.named_curve());
    let curve = match (outer, inner) {
        (Some(outer), Some(inner)) if outer.oid() != inner => {
            return Err(DecodeError::InvalidKey(format!(
                "key parameters name {inner}, algorithm names {outer}"
            )));
        }
        (Some(curve), _) => curve,
        (None, Some(oid)) => curve_from_oid(oid)?,
        (None, None) => {
            return Err(DecodeError::InvalidKey("missing named curve parameters".into()));
        }
    };

    let decoded = DecodedPrivateKey::from_scalar(curve, key.private_key)?;
    if let Some(public_key) = key.public_key {
        if !decoded.matches_public_key(public_key) {
            return Err(DecodeError::InvalidKey(
                "embedded public key does not match the private scalar".into(),
            ));
        }
    }
    Ok(decoded)
}

fn decode_pkcs8(der: &[u8]) -> Result<DecodedPrivateKey, DecodeError> {
    let info = pkcs8::PrivateKeyInfo::try_from(der)
        .map_err(|e| DecodeError::InvalidKey(format!("not a PKCS#8 private key: {e}")))?;

    if info.algorithm.oid != ID_EC_PUBLIC_KEY {
        return Err(DecodeError::InvalidKey(format!(
            "unsupported key algorithm {}",
            info.algorithm.oid
        )));
    }
    let oid = info
        .algorithm
        .parameters_oid()
        .map_err(|e| DecodeError::InvalidKey(format!("missing named curve parameters: {e}")))?;

    decode_sec1(info.private_key, Some(curve_from_oid(oid)?))
}

fn curve_from_oid(oid: ObjectIdentifier) -> Result<Curve, DecodeError> {
    Curve::from_oid(oid).ok_or_else(|| DecodeError::InvalidKey(format!("unsupported named curve {oid}")))
}
