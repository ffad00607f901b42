use std::time::Duration;

use rand_chacha::rand_core::CryptoRngCore;
use tracing::trace;

use crate::engine::{HandshakeStatus, Session};
use crate::error::DriveError;

/// Keep calling `advance` until the handshake completes or fails.
///
/// Each `WantRetry` yields to the runtime so other connections make progress
/// while the signature is outstanding. Retries are unbounded; `timeout` is
/// the only limit.
pub async fn drive_handshake<R: CryptoRngCore + Send>(
    session: &mut Session<R>,
    timeout: Duration,
) -> Result<(), DriveError> {
    let attempts = async {
        loop {
            match session.advance() {
                Ok(HandshakeStatus::Complete) => return Ok(()),
                Ok(HandshakeStatus::WantRetry) => {
                    trace!("handshake wants retry");
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(DriveError::from(e)),
            }
        }
    };

    tokio::time::timeout(timeout, attempts)
        .await
        .map_err(|_| DriveError::TimedOut(timeout))?
}
