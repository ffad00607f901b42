use std::fmt;

use zeroize::Zeroizing;

use crate::error::DecodeError;

/// DER payload of the first private-key block in a text envelope.
pub(crate) struct Envelope {
    pub label: String,
    pub der: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Find the first private-key block and decode it.
///
/// Text before the first block and blocks that are not private keys (an
/// `EC PARAMETERS` block written ahead of the key, say) are skipped. The
/// block itself is decoded as RFC 7468 text.
pub(crate) fn strip(input: &[u8]) -> Result<Envelope, DecodeError> {
    let text = std::str::from_utf8(input)
        .map_err(|_| DecodeError::MalformedEncoding("key file is not text".into()))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut lines = text.lines().map(str::trim);
    let mut saw_block = false;

    while let Some(line) = lines.next() {
        let Some(label) = boundary(line, "BEGIN") else {
            continue;
        };
        saw_block = true;

        let mut block = Zeroizing::new(format!("{line}\n"));
        let mut closed = false;
        for line in lines.by_ref() {
            block.push_str(line);
            block.push('\n');
            if let Some(end) = boundary(line, "END") {
                if end != label {
                    return Err(DecodeError::MalformedEncoding(format!(
                        "`{label}` block closed by `{end}`"
                    )));
                }
                closed = true;
                break;
            }
        }

        if !closed {
            return Err(DecodeError::MalformedEncoding(format!(
                "`{label}` block has no END line"
            )));
        }
        if !label.ends_with("PRIVATE KEY") {
            continue;
        }

        let (_, der) = der::pem::decode_vec(block.as_bytes()).map_err(|e| {
            DecodeError::MalformedEncoding(format!("invalid `{label}` block: {e}"))
        })?;
        let der = Zeroizing::new(der);
        if der.is_empty() {
            return Err(DecodeError::MalformedEncoding(format!("`{label}` block is empty")));
        }
        return Ok(Envelope {
            label: label.to_string(),
            der,
        });
    }

    if saw_block {
        Err(DecodeError::InvalidKey("envelope holds no private key block".into()))
    } else {
        Err(DecodeError::MalformedEncoding("no BEGIN line found".into()))
    }
}

fn boundary<'a>(line: &'a str, kind: &str) -> Option<&'a str> {
    line.strip_prefix("-----")?
        .strip_prefix(kind)?
        .strip_prefix(' ')?
        .strip_suffix("-----")
}
