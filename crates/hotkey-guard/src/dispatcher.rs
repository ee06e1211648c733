//! The bridge between the OS message pump and bound actions.
//!
//! The pump callback shares a path with all other input handling, so
//! [`HotkeyDispatcher`] only does a synchronous lookup on the calling thread
//! and hands the action to a tokio runtime under a [`TimeoutGuard`]. Nothing
//! that happens inside an action is ever propagated back to the pump.

use crate::HotkeyIdentity;
use crate::guard::{TimeoutGuard, TimeoutOutcome};
use crate::registry::{HotkeyAction, HotkeyRegistry, RawHotkeyEvent};
use futures_util::FutureExt;
use global_hotkey::GlobalHotKeyEvent;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Time allowed for a dispatched action before it is reported as timed out
pub const DEFAULT_TIMEOUT_MS: u32 = 1000;

/// How a dispatched action ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchStatus {
    Completed,
    Faulted(String),
    TimedOut,
    Cancelled,
}

/// Sent for every dispatched action once its outcome is known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub identity: HotkeyIdentity,
    pub status: DispatchStatus,
}

/// Receives pump events and runs the bound actions under a timeout.
pub struct HotkeyDispatcher {
    registry: Arc<HotkeyRegistry>,
    runtime: Handle,
    guard: TimeoutGuard,
    timeout_ms: u32,
    reports: Option<mpsc::UnboundedSender<DispatchReport>>,
}

impl HotkeyDispatcher {
    /// Create a dispatcher that spawns actions onto `runtime`
    pub fn new(registry: Arc<HotkeyRegistry>, runtime: Handle) -> Self {
        Self {
            registry,
            runtime,
            guard: TimeoutGuard::default(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            reports: None,
        }
    }

    /// Set the time each action is allowed to run
    pub fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the guard used to bound actions
    pub fn with_guard(mut self, guard: TimeoutGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Send a [`DispatchReport`] for every finished action to `reports`
    pub fn with_reports(mut self, reports: mpsc::UnboundedSender<DispatchReport>) -> Self {
        self.reports = Some(reports);
        self
    }

    pub fn registry(&self) -> &Arc<HotkeyRegistry> {
        &self.registry
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    /// Pump entry point for raw hotkey messages. Returns immediately.
    pub fn on_event(&self, raw: RawHotkeyEvent) {
        if let Some((identity, action)) = self.registry.lookup_raw(raw) {
            self.launch(identity, action);
        }
    }

    /// Pump entry point for events delivered by `global-hotkey`. Returns
    /// immediately.
    pub fn on_hotkey_event(&self, event: GlobalHotKeyEvent) {
        if let Some((identity, action)) = self.registry.lookup_event(&event) {
            self.launch(identity, action);
        }
    }

    fn launch(&self, identity: HotkeyIdentity, action: HotkeyAction) {
        let reports = self.reports.clone();

        // Building the future runs user code on the pump thread
        let operation = match panic::catch_unwind(AssertUnwindSafe(|| action())) {
            Ok(operation) => operation,
            Err(payload) => {
                let reason = panic_reason(payload.as_ref());
                error!("Hotkey {} action panicked while starting: {}", identity, reason);
                report(&reports, identity, DispatchStatus::Faulted(reason));
                return;
            }
        };

        let guard = self.guard;
        let timeout_ms = self.timeout_ms;
        self.runtime.spawn(async move {
            let outcome = AssertUnwindSafe(guard.run(operation, timeout_ms, None))
                .catch_unwind()
                .await;
            let status = match outcome {
                Ok(TimeoutOutcome::Completed(Ok(()))) => {
                    debug!("Hotkey {} action completed", identity);
                    DispatchStatus::Completed
                }
                Ok(TimeoutOutcome::Completed(Err(e))) => {
                    error!("Hotkey {} action failed: {}", identity, e);
                    DispatchStatus::Faulted(e.to_string())
                }
                Ok(TimeoutOutcome::TimedOut) => {
                    warn!("Hotkey {} action timed out after {}ms", identity, timeout_ms);
                    DispatchStatus::TimedOut
                }
                Ok(TimeoutOutcome::Cancelled) => {
                    debug!("Hotkey {} action cancelled", identity);
                    DispatchStatus::Cancelled
                }
                Err(payload) => {
                    let reason = panic_reason(payload.as_ref());
                    error!("Hotkey {} action panicked: {}", identity, reason);
                    DispatchStatus::Faulted(reason)
                }
            };
            report(&reports, identity, status);
        });
    }
}

fn report(
    reports: &Option<mpsc::UnboundedSender<DispatchReport>>,
    identity: HotkeyIdentity,
    status: DispatchStatus,
) {
    if let Some(reports) = reports {
        let _ = reports.send(DispatchReport { identity, status });
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    let message = if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown cause"
    };
    format!("Action panicked: {message}")
}
