use crate::volume::{VolumeCommand, VolumeSettings};
use anyhow::{Context, Result, bail};
use hotkey_guard::{Code, DEFAULT_TIMEOUT_MS, ExpiryPolicy, HotkeyIdentity, Modifiers};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

/// Port TotalMix FX listens on for OSC by default
pub const DEFAULT_OSC_PORT: u16 = 7001;

/// Application configuration, read from a RON file.
///
/// Every field is optional in the file; missing fields take their defaults.
///
/// ```ron
/// (
///     endpoint: "127.0.0.1:7001",
///     timeout_ms: 1000,
///     on_expiry: Abandon,
///     volume: (increment: 0.02, fine_increment: 0.01, max: 0.8),
///     bindings: [
///         ("ctrl+alt+volumeup", VolumeUp),
///         ("ctrl+alt+volumedown", VolumeDown),
///     ],
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where TotalMix listens for OSC
    pub endpoint: SocketAddr,
    /// Time allowed for each hotkey action
    pub timeout_ms: u32,
    /// What happens to an action that runs out of time
    pub on_expiry: ExpiryPolicy,
    pub volume: VolumeSettings,
    pub bindings: Vec<(HotkeyIdentity, VolumeCommand)>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: (Ipv4Addr::LOCALHOST, DEFAULT_OSC_PORT).into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            on_expiry: ExpiryPolicy::default(),
            volume: VolumeSettings::default(),
            bindings: default_bindings(),
        }
    }
}

/// Ctrl+Alt with the volume keys, plus Shift for fine steps
pub fn default_bindings() -> Vec<(HotkeyIdentity, VolumeCommand)> {
    let regular = Modifiers::CONTROL | Modifiers::ALT;
    let fine = regular | Modifiers::SHIFT;
    vec![
        (
            HotkeyIdentity::new(regular, Code::AudioVolumeUp),
            VolumeCommand::VolumeUp,
        ),
        (
            HotkeyIdentity::new(regular, Code::AudioVolumeDown),
            VolumeCommand::VolumeDown,
        ),
        (
            HotkeyIdentity::new(fine, Code::AudioVolumeUp),
            VolumeCommand::VolumeUpFine,
        ),
        (
            HotkeyIdentity::new(fine, Code::AudioVolumeDown),
            VolumeCommand::VolumeDownFine,
        ),
        (
            HotkeyIdentity::new(regular, Code::AudioVolumeMute),
            VolumeCommand::ToggleDim,
        ),
    ]
}

impl Config {
    pub fn from_ron(s: &str) -> Result<Self> {
        let config: Config = ron::from_str(s).context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path:?}"))?;
        Self::from_ron(&content).with_context(|| format!("In config file: {path:?}"))
    }

    /// Reject settings the volume controller cannot work with
    pub fn validate(&self) -> Result<()> {
        let volume = &self.volume;
        if !(volume.max > 0.0 && volume.max <= 1.0) {
            bail!("volume.max must be in (0, 1], got {}", volume.max);
        }
        if !(0.0..=volume.max).contains(&volume.initial) {
            bail!(
                "volume.initial must be between 0 and {}, got {}",
                volume.max,
                volume.initial
            );
        }
        for (name, step) in [
            ("increment", volume.increment),
            ("fine_increment", volume.fine_increment),
        ] {
            if !(step > 0.0 && step <= volume.max) {
                bail!("volume.{name} must be in (0, {}], got {step}", volume.max);
            }
        }

        let mut seen = std::collections::HashSet::new();
        for (identity, _) in &self.bindings {
            if !seen.insert(identity) {
                bail!("Hotkey {identity} is bound more than once");
            }
        }
        Ok(())
    }
}
