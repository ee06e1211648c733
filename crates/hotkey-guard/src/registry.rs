use crate::backend::{ALREADY_REGISTERED, HotkeyBackend};
use crate::{Error, HotkeyIdentity, Result};
use global_hotkey::hotkey::Code;
use global_hotkey::{GlobalHotKeyEvent, HotKeyState};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, trace, warn};

/// The future produced each time a bound action fires
pub type ActionFuture = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

/// A bound action: a zero-argument factory for an asynchronous operation
pub type HotkeyAction = Arc<dyn Fn() -> ActionFuture + Send + Sync>;

/// Event code of a hotkey press message. Matches `WM_HOTKEY`.
pub const HOTKEY_EVENT: u32 = 0x0312;

/// An undecoded input event as delivered by the message pump.
///
/// Only the event code and modifier bits are raw. The key is carried as a
/// `Code` because native key numbers differ per platform (virtual-key codes
/// on Windows, keysyms on X11, Carbon key codes on macOS) and `global-hotkey`
/// already translates them when it registers and reports hotkeys. A pump
/// that receives a native key number maps it to a `Code` before building
/// the event; a key with no `Code` can never have been registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawHotkeyEvent {
    pub event_code: u32,
    /// Bitwise OR of `MOD_ALT`, `MOD_CONTROL`, `MOD_SHIFT` and `MOD_WIN`.
    /// Other bits are ignored.
    pub modifier_bits: u32,
    pub key: Code,
}

impl RawHotkeyEvent {
    /// A hotkey press for the given identity
    pub fn pressed(identity: &HotkeyIdentity) -> Self {
        Self {
            event_code: HOTKEY_EVENT,
            modifier_bits: identity.modifier_bits(),
            key: identity.code,
        }
    }

    /// Decode the identity this event refers to, or `None` if it is not a
    /// hotkey press at all.
    pub fn decode(&self) -> Option<HotkeyIdentity> {
        if self.event_code != HOTKEY_EVENT {
            return None;
        }
        Some(HotkeyIdentity::from_raw(self.modifier_bits, self.key))
    }
}

/// A live binding. The OS registration exists for as long as this does.
struct Binding {
    action: HotkeyAction,
    os_id: u32,
}

#[derive(Default)]
struct Bindings {
    by_identity: HashMap<HotkeyIdentity, Binding>,
    /// Reverse index for events that only carry the OS id
    by_id: HashMap<u32, HotkeyIdentity>,
}

/// Owns the mapping from hotkey identities to actions and keeps it in step
/// with the OS registrations.
///
/// Every binding in the registry has a live OS registration: registration is
/// all-or-nothing, and removing a binding always releases it. Lookups take a
/// shared lock, mutations an exclusive one, so a lookup can never observe a
/// half-completed registration.
///
/// The registry is created once and torn down once. [`teardown`](Self::teardown)
/// releases every remaining registration; dropping the registry does the same.
pub struct HotkeyRegistry {
    backend: Arc<dyn HotkeyBackend>,
    bindings: RwLock<Bindings>,
}

impl HotkeyRegistry {
    /// Creates an empty registry on top of the given OS backend.
    pub fn new(backend: Arc<dyn HotkeyBackend>) -> Self {
        Self {
            backend,
            bindings: RwLock::new(Bindings::default()),
        }
    }

    /// Binds `identity` to `action` and claims it with the OS.
    ///
    /// # Errors
    ///
    /// - [`Error::DuplicateIdentity`] if the identity is already bound here.
    /// - [`Error::OsRegistrationFailed`] if the OS refuses the combination,
    ///   typically because another process owns it.
    ///
    /// On error the registry is left exactly as it was.
    pub fn register<F, Fut>(&self, identity: HotkeyIdentity, action: F) -> Result<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let action: HotkeyAction = Arc::new(move || Box::pin(action()) as ActionFuture);
        let os_id = identity.id();

        let mut bindings = self.write();
        if bindings.by_identity.contains_key(&identity) {
            return Err(Error::DuplicateIdentity(identity));
        }
        if let Some(other) = bindings.by_id.get(&os_id) {
            return Err(Error::OsRegistrationFailed {
                code: ALREADY_REGISTERED,
                reason: format!("id {os_id} is already used by {other}"),
            });
        }

        self.backend
            .register(&identity)
            .map_err(|e| Error::OsRegistrationFailed {
                code: e.code,
                reason: e.reason,
            })?;

        bindings.by_identity.insert(identity, Binding { action, os_id });
        bindings.by_id.insert(os_id, identity);
        info!("Registered hotkey {}", identity);
        Ok(())
    }

    /// Parses `key_str` and registers it.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use hotkey_guard::{GlobalHotkeyBackend, HotkeyRegistry};
    ///
    /// let registry = HotkeyRegistry::new(Arc::new(GlobalHotkeyBackend::new().unwrap()));
    /// registry
    ///     .register_str("ctrl+alt+volumeup", || async { Ok(()) })
    ///     .unwrap();
    /// ```
    pub fn register_str<F, Fut>(&self, key_str: &str, action: F) -> Result<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let identity = HotkeyIdentity::parse(key_str)?;
        self.register(identity, action)
    }

    /// Removes the binding for `identity` and releases its OS registration.
    ///
    /// Returns whether a binding existed. Unregistering an unknown identity
    /// is a no-op. If the OS reports a failure the binding is still removed.
    pub fn unregister(&self, identity: &HotkeyIdentity) -> bool {
        let mut bindings = self.write();
        let Some(binding) = bindings.by_identity.remove(identity) else {
            return false;
        };
        bindings.by_id.remove(&binding.os_id);

        match self.backend.unregister(identity) {
            Ok(()) => info!("Unregistered hotkey {}", identity),
            Err(e) => warn!("Failed to release hotkey {}: {}", identity, e),
        }
        true
    }

    /// Unregisters every remaining binding.
    ///
    /// Releases are best-effort: a failure is logged and the remaining
    /// bindings are still released. Returns how many bindings were removed;
    /// calling this again afterwards does nothing and returns 0.
    pub fn teardown(&self) -> usize {
        let mut bindings = self.write();
        bindings.by_id.clear();

        let mut released = 0;
        for (identity, _) in bindings.by_identity.drain() {
            if let Err(e) = self.backend.unregister(&identity) {
                warn!("Failed to release hotkey {} during teardown: {}", identity, e);
            }
            released += 1;
        }

        if released > 0 {
            info!("Released {} hotkeys", released);
        }
        released
    }

    /// Looks up the action bound to `identity`.
    pub fn resolve(&self, identity: &HotkeyIdentity) -> Option<HotkeyAction> {
        self.read()
            .by_identity
            .get(identity)
            .map(|binding| binding.action.clone())
    }

    /// Decodes a raw pump event and, if it names a bound hotkey, invokes the
    /// action and returns the identity with the resulting future.
    ///
    /// Unknown identities and non-hotkey events are ignored: global
    /// listeners routinely see combinations owned by other processes.
    pub fn on_raw_event(&self, raw: RawHotkeyEvent) -> Option<(HotkeyIdentity, ActionFuture)> {
        self.lookup_raw(raw).map(|(identity, action)| (identity, action()))
    }

    /// Like [`on_raw_event`](Self::on_raw_event) for events from
    /// `global-hotkey`, which identify hotkeys by id. Only presses fire.
    pub fn on_hotkey_event(
        &self,
        event: &GlobalHotKeyEvent,
    ) -> Option<(HotkeyIdentity, ActionFuture)> {
        self.lookup_event(event).map(|(identity, action)| (identity, action()))
    }

    /// Decodes a raw pump event and looks up its action without invoking it.
    pub fn lookup_raw(&self, raw: RawHotkeyEvent) -> Option<(HotkeyIdentity, HotkeyAction)> {
        let Some(identity) = raw.decode() else {
            trace!("Ignoring non-hotkey event {:#06x}", raw.event_code);
            return None;
        };
        self.bound(identity)
    }

    /// Looks up the action for a `global-hotkey` press without invoking it.
    pub fn lookup_event(
        &self,
        event: &GlobalHotKeyEvent,
    ) -> Option<(HotkeyIdentity, HotkeyAction)> {
        if event.state != HotKeyState::Pressed {
            return None;
        }
        let identity = self.read().by_id.get(&event.id).copied();
        let Some(identity) = identity else {
            trace!("Ignoring event for unknown hotkey id {}", event.id);
            return None;
        };
        self.bound(identity)
    }

    fn bound(&self, identity: HotkeyIdentity) -> Option<(HotkeyIdentity, HotkeyAction)> {
        // The returned action is a clone, so callers run it with the lock released
        let Some(action) = self.resolve(&identity) else {
            trace!("Ignoring unbound hotkey {}", identity);
            return None;
        };
        debug!("Hotkey {} pressed", identity);
        Some((identity, action))
    }

    pub fn contains(&self, identity: &HotkeyIdentity) -> bool {
        self.read().by_identity.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.read().by_identity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All currently bound identities, in no particular order.
    pub fn identities(&self) -> Vec<HotkeyIdentity> {
        self.read().by_identity.keys().copied().collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, Bindings> {
        self.bindings.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Bindings> {
        self.bindings.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for HotkeyRegistry {
    fn drop(&mut self) {
        self.teardown();
    }
}
