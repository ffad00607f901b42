use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use pk_offload::{
    CallbackContext, EccSignExecutor, EngineConfig, KeyFormat, NominalKey, Session,
    drive_handshake,
};
use tokio::task::JoinSet;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KeyEncoding {
    Pem,
    Der,
}

impl From<KeyEncoding> for KeyFormat {
    fn from(encoding: KeyEncoding) -> Self {
        match encoding {
            KeyEncoding::Pem => KeyFormat::Pem,
            KeyEncoding::Der => KeyFormat::Der,
        }
    }
}

#[derive(Parser)]
struct Args {
    #[clap(long, env = "PK_OFFLOAD_KEY_FILE", default_value = "certs/ecc-key.pem")]
    key_file: PathBuf,
    #[clap(long, env = "PK_OFFLOAD_KEY_FORMAT", default_value = "pem")]
    key_format: KeyEncoding,
    /// Answer the first sign call of every handshake with pending.
    #[clap(long, env = "PK_OFFLOAD_SIMULATE_PENDING")]
    simulate_pending: bool,
    #[clap(long, env = "PK_OFFLOAD_TRANSCRIPT", default_value = "ClientHello || ServerHello || Certificate")]
    transcript: String,
    #[clap(long, env = "PK_OFFLOAD_CONNECTIONS", default_value = "1")]
    connections: usize,
    #[clap(long, env = "PK_OFFLOAD_HANDSHAKE_TIMEOUT_MS", default_value = "5000")]
    handshake_timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let key_format = KeyFormat::from(args.key_format);
    let timeout = Duration::from_millis(args.handshake_timeout_ms);

    // The engine learns the public half up front, like loading the server
    // key next to its certificate. Signing itself always goes through the
    // callback.
    let nominal = NominalKey::from_key_file(&args.key_file, key_format)
        .with_context(|| format!("loading server key {}", args.key_file.display()))?;
    info!(curve = %nominal.curve(), key_file = %args.key_file.display(), "server key loaded");

    let mut config = EngineConfig::new(nominal);
    config.set_sign_callback(EccSignExecutor);
    let config = Arc::new(config);

    let mut handshakes = JoinSet::new();
    for connection in 0..args.connections {
        let mut session = Session::new(config.clone(), args.transcript.as_bytes())
            .context("seeding session rng")?;
        session.attach_context(
            CallbackContext::new(&args.key_file)
                .with_key_format(key_format)
                .with_pending_simulation(args.simulate_pending),
        );

        handshakes.spawn(async move {
            let result = drive_handshake(&mut session, timeout).await;
            (connection, session, result)
        });
    }

    let mut failed = 0usize;
    while let Some(joined) = handshakes.join_next().await {
        let (connection, session, result) = joined.context("handshake task panicked")?;
        match result {
            Ok(()) => info!(
                connection,
                retries = session.pending_retries(),
                signature = %hex::encode(session.signature().unwrap_or_default()),
                "client connected"
            ),
            Err(e) => {
                error!(connection, error = %e, "handshake failed");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} handshakes failed", args.connections);
    }
    Ok(())
}
