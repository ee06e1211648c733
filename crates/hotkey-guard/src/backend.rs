//! The OS capability the registry drives.
//!
//! Global hotkey registration is process-external state: another program may
//! already own a combination, and registrations outlive any in-memory map
//! unless they are explicitly released. [`HotkeyBackend`] is the narrow seam
//! between the registry and that state, so the registry can be exercised
//! against a fake without a real input subsystem.

use crate::HotkeyIdentity;
use global_hotkey::GlobalHotKeyManager;
use thiserror::Error;
use tracing::debug;

/// Code reported when the OS says the combination is already claimed.
/// Matches the Win32 `ERROR_HOTKEY_ALREADY_REGISTERED` value.
pub const ALREADY_REGISTERED: i32 = 1409;

/// Code reported when the OS gives no more specific reason.
pub const UNKNOWN_FAILURE: i32 = -1;

/// A refusal from the OS hotkey layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason} (code {code})")]
pub struct BackendError {
    pub code: i32,
    pub reason: String,
}

impl BackendError {
    pub fn new(code: i32, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

impl From<global_hotkey::Error> for BackendError {
    fn from(err: global_hotkey::Error) -> Self {
        let code = match &err {
            global_hotkey::Error::OsError(e) => e.raw_os_error().unwrap_or(UNKNOWN_FAILURE),
            global_hotkey::Error::AlreadyRegistered(_) => ALREADY_REGISTERED,
            _ => UNKNOWN_FAILURE,
        };
        BackendError::new(code, err.to_string())
    }
}

/// Registers and releases global hotkeys with the operating system.
pub trait HotkeyBackend: Send + Sync {
    /// Claim the combination system-wide under `identity.id()`.
    fn register(&self, identity: &HotkeyIdentity) -> Result<(), BackendError>;

    /// Release a combination previously claimed with [`register`](Self::register).
    fn unregister(&self, identity: &HotkeyIdentity) -> Result<(), BackendError>;
}

/// The production backend, built on the `global-hotkey` crate.
///
/// Events for hotkeys registered here are delivered through
/// `global_hotkey::GlobalHotKeyEvent`, which requires an OS event loop
/// running on the main thread (a `tao` loop in the application).
pub struct GlobalHotkeyBackend {
    manager: GlobalHotKeyManager,
}

impl GlobalHotkeyBackend {
    /// # Errors
    ///
    /// Returns an error if the underlying global hotkey manager fails to initialize.
    pub fn new() -> Result<Self, BackendError> {
        let manager = GlobalHotKeyManager::new()?;
        Ok(Self { manager })
    }
}

impl HotkeyBackend for GlobalHotkeyBackend {
    fn register(&self, identity: &HotkeyIdentity) -> Result<(), BackendError> {
        debug!("Registering global hotkey {} (id {})", identity, identity.id());
        self.manager.register(identity.to_hotkey())?;
        Ok(())
    }

    fn unregister(&self, identity: &HotkeyIdentity) -> Result<(), BackendError> {
        debug!("Unregistering global hotkey {} (id {})", identity, identity.id());
        self.manager.unregister(identity.to_hotkey())?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// An in-memory stand-in for the OS hotkey table.
    #[derive(Default)]
    pub(crate) struct FakeBackend {
        live: Mutex<HashSet<u32>>,
        /// Ids owned by some other process; registering them fails
        foreign: Mutex<HashSet<u32>>,
        /// Ids whose release fails
        sticky: Mutex<HashSet<u32>>,
        pub(crate) register_calls: Mutex<usize>,
        pub(crate) unregister_calls: Mutex<usize>,
    }

    impl FakeBackend {
        pub(crate) fn claim_elsewhere(&self, identity: &HotkeyIdentity) {
            self.foreign.lock().unwrap().insert(identity.id());
        }

        pub(crate) fn fail_release(&self, identity: &HotkeyIdentity) {
            self.sticky.lock().unwrap().insert(identity.id());
        }

        pub(crate) fn is_live(&self, identity: &HotkeyIdentity) -> bool {
            self.live.lock().unwrap().contains(&identity.id())
        }

        pub(crate) fn live_count(&self) -> usize {
            self.live.lock().unwrap().len()
        }
    }

    impl HotkeyBackend for FakeBackend {
        fn register(&self, identity: &HotkeyIdentity) -> Result<(), BackendError> {
            *self.register_calls.lock().unwrap() += 1;
            let id = identity.id();
            if self.foreign.lock().unwrap().contains(&id) {
                return Err(BackendError::new(ALREADY_REGISTERED, "claimed elsewhere"));
            }
            if !self.live.lock().unwrap().insert(id) {
                return Err(BackendError::new(ALREADY_REGISTERED, "already live"));
            }
            Ok(())
        }

        fn unregister(&self, identity: &HotkeyIdentity) -> Result<(), BackendError> {
            *self.unregister_calls.lock().unwrap() += 1;
            let id = identity.id();
            // The OS drops the registration even when it reports an error
            let removed = self.live.lock().unwrap().remove(&id);
            if self.sticky.lock().unwrap().contains(&id) {
                return Err(BackendError::new(UNKNOWN_FAILURE, "release failed"));
            }
            if !removed {
                return Err(BackendError::new(UNKNOWN_FAILURE, "not registered"));
            }
            Ok(())
        }
    }
}
