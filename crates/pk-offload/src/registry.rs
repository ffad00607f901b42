use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::executor::SignCallback;

/// Private-key operations an engine can hand off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// ECDSA signature over a handshake transcript digest.
    EccSign,
}

/// Configuration-time table of offload callbacks, consulted by the engine
/// instead of its built-in signing path.
///
/// Filled in before any connection is accepted and read-only afterwards;
/// mutation during live handshakes is not supported.
#[derive(Clone, Default)]
pub struct CallbackRegistry {
    callbacks: HashMap<OperationKind, Arc<dyn SignCallback>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `callback` for `kind`, returning whatever it replaced.
    pub fn register(
        &mut self,
        kind: OperationKind,
        callback: impl SignCallback + 'static,
    ) -> Option<Arc<dyn SignCallback>> {
        self.callbacks.insert(kind, Arc::new(callback))
    }

    pub fn get(&self, kind: OperationKind) -> Option<Arc<dyn SignCallback>> {
        self.callbacks.get(&kind).cloned()
    }

    pub fn is_registered(&self, kind: OperationKind) -> bool {
        self.callbacks.contains_key(&kind)
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.callbacks.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CallbackContext;
    use crate::error::SignError;
    use crate::executor::{EccSignExecutor, NominalKey, SignRequest, SignStatus};
    use crate::keys::Curve;
    use rand_chacha::ChaCha20Rng;
    use rand_chacha::rand_core::{CryptoRngCore, SeedableRng};

    struct AlwaysPending;

    impl SignCallback for AlwaysPending {
        fn sign(
            &self,
            _context: &mut CallbackContext,
            _request: SignRequest<'_>,
            _key: &NominalKey,
            _rng: &mut dyn CryptoRngCore,
        ) -> Result<SignStatus, SignError> {
            Ok(SignStatus::Pending)
        }
    }

    #[test]
    fn empty_registry_has_no_callbacks() {
        let registry = CallbackRegistry::new();
        assert!(!registry.is_registered(OperationKind::EccSign));
        assert!(registry.get(OperationKind::EccSign).is_none());
    }

    #[test]
    fn register_returns_previous_callback() {
        let mut registry = CallbackRegistry::new();
        assert!(registry.register(OperationKind::EccSign, EccSignExecutor).is_none());
        assert!(registry.register(OperationKind::EccSign, AlwaysPending).is_some());
        assert!(registry.is_registered(OperationKind::EccSign));
    }

    #[test]
    fn last_registration_wins() {
        let mut registry = CallbackRegistry::new();
        registry.register(OperationKind::EccSign, EccSignExecutor);
        registry.register(OperationKind::EccSign, AlwaysPending);

        let callback = registry.get(OperationKind::EccSign).unwrap();
        let mut context = CallbackContext::new("/nonexistent");
        let key = NominalKey::new(Curve::P256, vec![0x04; 65]);
        let mut out = [0u8; 72];
        let status = callback
            .sign(
                &mut context,
                SignRequest { digest: &[0u8; 32], out: &mut out },
                &key,
                &mut ChaCha20Rng::seed_from_u64(0),
            )
            .unwrap();
        assert_eq!(status, SignStatus::Pending);
    }

    #[test]
    fn debug_lists_registered_kinds() {
        let mut registry = CallbackRegistry::new();
        registry.register(OperationKind::EccSign, EccSignExecutor);
        assert_eq!(format!("{registry:?}"), "{EccSign}");
    }
}
