use thiserror::Error;

use crate::HotkeyIdentity;

/// The main error type for hotkey-guard operations
#[derive(Error, Debug)]
pub enum Error {
    /// Error parsing or validating a key combination
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// The identity is already bound in this registry
    #[error("Hotkey already bound: {0}")]
    DuplicateIdentity(HotkeyIdentity),

    /// The OS refused to register the hotkey, usually because another
    /// process already claimed the combination
    #[error("OS refused hotkey registration (code {code}): {reason}")]
    OsRegistrationFailed { code: i32, reason: String },

    /// A guarded operation did not finish within its allotted time
    #[error("Operation timed out after {timeout_ms}ms")]
    TimedOut { timeout_ms: u32 },

    /// A guarded operation was cancelled by its caller
    #[error("Operation cancelled")]
    Cancelled,

    /// A bound action failed
    #[error("Action failed: {0}")]
    ActionFaulted(String),

    /// IO-related errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;
