use std::fmt;
use std::path::{Path, PathBuf};

use crate::keys::KeyFormat;

/// Where a context's key material lives. Fixed for the life of the context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFileReference(PathBuf);

impl KeyFileReference {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for KeyFileReference {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for KeyFileReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Progress of the one signing request a context can have outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationState {
    #[default]
    Idle,
    /// Handed to (simulated) hardware; the next call completes it.
    Pending,
}

/// Per-connection state handed to the sign executor on every invocation.
///
/// One context belongs to exactly one connection. It is not `Clone`, and the
/// executor takes it by `&mut`, so a single context can never see two
/// overlapping sign calls.
#[derive(Debug)]
pub struct CallbackContext {
    key_file: KeyFileReference,
    key_format: KeyFormat,
    simulate_pending: bool,
    state: OperationState,
}

impl CallbackContext {
    pub fn new(key_file: impl Into<PathBuf>) -> Self {
        Self {
            key_file: KeyFileReference::new(key_file),
            key_format: KeyFormat::default(),
            simulate_pending: false,
            state: OperationState::Idle,
        }
    }

    pub fn with_key_format(mut self, key_format: KeyFormat) -> Self {
        self.key_format = key_format;
        self
    }

    /// Make the first call of every signing request return pending, the way
    /// an HSM or TPM working out-of-band would.
    pub fn with_pending_simulation(mut self, enabled: bool) -> Self {
        self.simulate_pending = enabled;
        self
    }

    pub fn key_file(&self) -> &KeyFileReference {
        &self.key_file
    }

    pub fn key_format(&self) -> KeyFormat {
        self.key_format
    }

    pub fn simulates_pending(&self) -> bool {
        self.simulate_pending
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        self.state == OperationState::Pending
    }

    pub(crate) fn set_state(&mut self, state: OperationState) {
        self.state = state;
    }
}
