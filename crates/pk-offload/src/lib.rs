pub mod context;
pub mod driver;
pub mod engine;
pub mod error;
pub mod executor;
pub mod keys;
pub mod registry;

pub use context::{CallbackContext, KeyFileReference, OperationState};
pub use driver::drive_handshake;
pub use engine::{EngineConfig, HandshakeState, HandshakeStatus, Session};
pub use error::{DecodeError, DriveError, HandshakeError, IoError, KeyError, SignError};
pub use executor::{EccSignExecutor, NominalKey, SignCallback, SignRequest, SignStatus};
pub use keys::{Curve, DecodedPrivateKey, KeyFormat};
pub use registry::{CallbackRegistry, OperationKind};
