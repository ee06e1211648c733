//! Global hotkeys with timeout-guarded asynchronous actions.
//!
//! This crate keeps a registry of global hotkeys consistent with the OS
//! registrations behind it, and dispatches the actions bound to those hotkeys
//! onto a tokio runtime, each bounded by a timeout so that no action can hold
//! up the input event pump.

// Re-export commonly used types
pub use global_hotkey::hotkey::{Code, Modifiers};
pub use global_hotkey::{GlobalHotKeyEvent, HotKeyState};

pub mod backend;
pub mod cancel;
pub mod dispatcher;
mod error;
pub mod guard;
mod identity;
pub mod registry;

pub use backend::{BackendError, GlobalHotkeyBackend, HotkeyBackend};
pub use cancel::{CancelSource, CancellationSignal};
pub use dispatcher::{DEFAULT_TIMEOUT_MS, DispatchReport, DispatchStatus, HotkeyDispatcher};
pub use error::{Error, Result};
pub use guard::{ExpiryPolicy, TimeoutGuard, TimeoutOutcome};
pub use identity::{HotkeyIdentity, MOD_ALT, MOD_CONTROL, MOD_SHIFT, MOD_WIN};
pub use registry::{ActionFuture, HOTKEY_EVENT, HotkeyAction, HotkeyRegistry, RawHotkeyEvent};

/// Route `tracing` output from tests through the test harness, filtered by
/// `RUST_LOG`.
#[cfg(test)]
pub(crate) fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
