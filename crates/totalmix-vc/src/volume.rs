//! Volume commands and the controller that turns them into OSC messages.

use crate::osc;
use crate::sender::OscSender;
use hotkey_guard::{HotkeyIdentity, HotkeyRegistry};
use rosc::OscMessage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Something a hotkey can ask the mixer to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeCommand {
    VolumeUp,
    VolumeDown,
    VolumeUpFine,
    VolumeDownFine,
    ToggleDim,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeSettings {
    /// Fader position assumed at startup
    pub initial: f32,
    pub increment: f32,
    pub fine_increment: f32,
    /// Upper bound for the fader, at most 1.0
    pub max: f32,
}

impl Default for VolumeSettings {
    fn default() -> Self {
        Self {
            initial: 0.5,
            increment: 0.02,
            fine_increment: 0.01,
            max: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Mixer {
    volume: f32,
    dimmed: bool,
}

/// Tracks the main fader and sends changes to TotalMix.
///
/// Commands are applied one at a time: the mixer state stays locked until
/// the corresponding datagram has been sent, and it only changes once the
/// send succeeds.
pub struct VolumeController {
    sender: OscSender,
    settings: VolumeSettings,
    mixer: Mutex<Mixer>,
}

impl VolumeController {
    pub fn new(sender: OscSender, settings: VolumeSettings) -> Self {
        let volume = settings.initial.clamp(0.0, settings.max);
        Self {
            sender,
            settings,
            mixer: Mutex::new(Mixer {
                volume,
                dimmed: false,
            }),
        }
    }

    /// Apply one command. Commands that would not move the fader send nothing.
    pub async fn apply(&self, command: VolumeCommand) -> hotkey_guard::Result<()> {
        let mut mixer = self.mixer.lock().await;
        let Some((next, message)) = plan(&self.settings, *mixer, command) else {
            debug!("{:?} has no effect at volume {:.2}", command, mixer.volume);
            return Ok(());
        };

        self.sender.send(message).await?;
        if next.dimmed != mixer.dimmed {
            info!("Dim {}", if next.dimmed { "on" } else { "off" });
        } else {
            info!("Volume {:.2}", next.volume);
        }
        *mixer = next;
        Ok(())
    }
}

/// Work out the mixer state after `command` and the message that gets there.
fn plan(
    settings: &VolumeSettings,
    mixer: Mixer,
    command: VolumeCommand,
) -> Option<(Mixer, OscMessage)> {
    let step = match command {
        VolumeCommand::VolumeUp => settings.increment,
        VolumeCommand::VolumeDown => -settings.increment,
        VolumeCommand::VolumeUpFine => settings.fine_increment,
        VolumeCommand::VolumeDownFine => -settings.fine_increment,
        VolumeCommand::ToggleDim => {
            let next = Mixer {
                dimmed: !mixer.dimmed,
                ..mixer
            };
            return Some((next, osc::toggle_dim()));
        }
    };

    let volume = (mixer.volume + step).clamp(0.0, settings.max);
    if (volume - mixer.volume).abs() < f32::EPSILON {
        return None;
    }
    Some((Mixer { volume, ..mixer }, osc::volume(volume)))
}

/// Bind every `(hotkey, command)` pair to `controller`.
///
/// A hotkey that cannot be bound is logged and skipped, so one combination
/// claimed by another program does not prevent the rest from working.
/// Returns the number of hotkeys bound.
pub fn bind_all(
    registry: &HotkeyRegistry,
    bindings: &[(HotkeyIdentity, VolumeCommand)],
    controller: &Arc<VolumeController>,
) -> usize {
    let mut bound = 0;
    for &(identity, command) in bindings {
        let controller = controller.clone();
        let result = registry.register(identity, move || {
            let controller = controller.clone();
            async move { controller.apply(command).await }
        });
        match result {
            Ok(()) => bound += 1,
            Err(e) => warn!("Could not bind {} to {:?}: {}", identity, command, e),
        }
    }
    bound
}
