use crate::error::{Error, Result};
use global_hotkey::hotkey::{Code, HotKey, Modifiers};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Raw modifier bit for Alt, as carried by hotkey messages.
pub const MOD_ALT: u32 = 0x0001;
/// Raw modifier bit for Control.
pub const MOD_CONTROL: u32 = 0x0002;
/// Raw modifier bit for Shift.
pub const MOD_SHIFT: u32 = 0x0004;
/// Raw modifier bit for the Windows / Super key.
pub const MOD_WIN: u32 = 0x0008;

/// A global hotkey combination: a set of modifiers plus a key.
///
/// Identities compare and hash by value. Modifiers form a bit set, so the
/// order in which they were written never matters: `alt+ctrl+a` and
/// `ctrl+alt+a` are the same identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HotkeyIdentity {
    pub modifiers: Modifiers,
    pub code: Code,
}

impl HotkeyIdentity {
    /// Create a new identity with the given modifiers and key code
    pub fn new(modifiers: Modifiers, code: Code) -> Self {
        HotkeyIdentity { modifiers, code }
    }

    /// Parse an identity from a string representation
    ///
    /// Supports formats like:
    /// - "f13" (just a key)
    /// - "ctrl+alt+volumeup" (with modifiers)
    /// - "control+win+shift+volumedown" (alternative names, any order)
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('+').map(|p| p.trim()).collect();

        // split always yields at least one part
        let (key_part, modifier_parts) = match parts.split_last() {
            Some(split) => split,
            None => return Err(Error::InvalidKey("Empty key string".to_string())),
        };

        let code = parse_code(key_part)?;

        let mut modifiers = Modifiers::empty();
        for part in modifier_parts {
            match part.to_lowercase().as_str() {
                "ctrl" | "control" => modifiers |= Modifiers::CONTROL,
                "alt" | "option" => modifiers |= Modifiers::ALT,
                "shift" => modifiers |= Modifiers::SHIFT,
                "win" | "windows" | "super" | "cmd" | "command" | "meta" => {
                    modifiers |= Modifiers::SUPER
                }
                _ => return Err(Error::InvalidKey(format!("Unknown modifier: {part}"))),
            }
        }

        Ok(HotkeyIdentity { modifiers, code })
    }

    /// Decode an identity from the raw modifier bits carried by a hotkey
    /// message. Unknown bits are ignored.
    pub fn from_raw(modifier_bits: u32, code: Code) -> Self {
        let mut modifiers = Modifiers::empty();
        if modifier_bits & MOD_ALT != 0 {
            modifiers |= Modifiers::ALT;
        }
        if modifier_bits & MOD_CONTROL != 0 {
            modifiers |= Modifiers::CONTROL;
        }
        if modifier_bits & MOD_SHIFT != 0 {
            modifiers |= Modifiers::SHIFT;
        }
        if modifier_bits & MOD_WIN != 0 {
            modifiers |= Modifiers::SUPER;
        }
        HotkeyIdentity { modifiers, code }
    }

    /// Encode the modifier set as raw modifier bits
    pub fn modifier_bits(&self) -> u32 {
        let mut bits = 0;
        if self.modifiers.contains(Modifiers::ALT) {
            bits |= MOD_ALT;
        }
        if self.modifiers.contains(Modifiers::CONTROL) {
            bits |= MOD_CONTROL;
        }
        if self.modifiers.contains(Modifiers::SHIFT) {
            bits |= MOD_SHIFT;
        }
        if self.modifiers.contains(Modifiers::SUPER) {
            bits |= MOD_WIN;
        }
        bits
    }

    /// The deterministic identity hash used for OS registration.
    ///
    /// Equal identities always produce the same id, and the id matches the
    /// one `global-hotkey` reports in its events for this combination.
    pub fn id(&self) -> u32 {
        self.to_hotkey().id()
    }

    /// Convert this identity to a global_hotkey HotKey
    pub fn to_hotkey(&self) -> HotKey {
        let modifiers = if self.modifiers.is_empty() {
            None
        } else {
            Some(self.modifiers)
        };
        HotKey::new(modifiers, self.code)
    }
}

impl From<HotkeyIdentity> for HotKey {
    fn from(identity: HotkeyIdentity) -> Self {
        identity.to_hotkey()
    }
}

impl From<&HotKey> for HotkeyIdentity {
    fn from(hotkey: &HotKey) -> Self {
        HotkeyIdentity {
            modifiers: hotkey.mods,
            code: hotkey.key,
        }
    }
}

impl From<HotkeyIdentity> for String {
    fn from(identity: HotkeyIdentity) -> Self {
        identity.to_string()
    }
}

impl TryFrom<&str> for HotkeyIdentity {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        HotkeyIdentity::parse(s)
    }
}

impl TryFrom<String> for HotkeyIdentity {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        HotkeyIdentity::parse(&s)
    }
}

impl FromStr for HotkeyIdentity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        HotkeyIdentity::parse(s)
    }
}

impl fmt::Display for HotkeyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();

        if self.modifiers.contains(Modifiers::CONTROL) {
            parts.push("ctrl");
        }
        if self.modifiers.contains(Modifiers::ALT) {
            parts.push("alt");
        }
        if self.modifiers.contains(Modifiers::SHIFT) {
            parts.push("shift");
        }
        if self.modifiers.contains(Modifiers::SUPER) {
            parts.push("win");
        }

        parts.push(format_code(&self.code));
        write!(f, "{}", parts.join("+"))
    }
}

fn parse_code(s: &str) -> Result<Code> {
    let lower = s.to_lowercase();
    let code = match lower.as_str() {
        // Media and volume keys
        "volumeup" | "volume_up" | "audiovolumeup" => Code::AudioVolumeUp,
        "volumedown" | "volume_down" | "audiovolumedown" => Code::AudioVolumeDown,
        "volumemute" | "volume_mute" | "mute" | "audiovolumemute" => Code::AudioVolumeMute,
        "playpause" | "mediaplaypause" => Code::MediaPlayPause,
        "stop" | "mediastop" => Code::MediaStop,
        "nexttrack" | "mediatracknext" => Code::MediaTrackNext,
        "prevtrack" | "mediatrackprevious" => Code::MediaTrackPrevious,

        // Letters
        "a" => Code::KeyA,
        "b" => Code::KeyB,
        "c" => Code::KeyC,
        "d" => Code::KeyD,
        "e" => Code::KeyE,
        "f" => Code::KeyF,
        "g" => Code::KeyG,
        "h" => Code::KeyH,
        "i" => Code::KeyI,
        "j" => Code::KeyJ,
        "k" => Code::KeyK,
        "l" => Code::KeyL,
        "m" => Code::KeyM,
        "n" => Code::KeyN,
        "o" => Code::KeyO,
        "p" => Code::KeyP,
        "q" => Code::KeyQ,
        "r" => Code::KeyR,
        "s" => Code::KeyS,
        "t" => Code::KeyT,
        "u" => Code::KeyU,
        "v" => Code::KeyV,
        "w" => Code::KeyW,
        "x" => Code::KeyX,
        "y" => Code::KeyY,
        "z" => Code::KeyZ,

        // Numbers
        "0" => Code::Digit0,
        "1" => Code::Digit1,
        "2" => Code::Digit2,
        "3" => Code::Digit3,
        "4" => Code::Digit4,
        "5" => Code::Digit5,
        "6" => Code::Digit6,
        "7" => Code::Digit7,
        "8" => Code::Digit8,
        "9" => Code::Digit9,

        // Function keys, including the extended row often used for global bindings
        "f1" => Code::F1,
        "f2" => Code::F2,
        "f3" => Code::F3,
        "f4" => Code::F4,
        "f5" => Code::F5,
        "f6" => Code::F6,
        "f7" => Code::F7,
        "f8" => Code::F8,
        "f9" => Code::F9,
        "f10" => Code::F10,
        "f11" => Code::F11,
        "f12" => Code::F12,
        "f13" => Code::F13,
        "f14" => Code::F14,
        "f15" => Code::F15,
        "f16" => Code::F16,

        // Navigation
        "up" | "arrowup" => Code::ArrowUp,
        "down" | "arrowdown" => Code::ArrowDown,
        "left" | "arrowleft" => Code::ArrowLeft,
        "right" | "arrowright" => Code::ArrowRight,
        "pageup" | "pgup" => Code::PageUp,
        "pagedown" | "pgdn" => Code::PageDown,
        "home" => Code::Home,
        "end" => Code::End,

        // Punctuation
        "minus" | "-" => Code::Minus,
        "equal" | "=" => Code::Equal,
        "space" => Code::Space,

        "" => return Err(Error::InvalidKey("Empty key code".to_string())),
        _ => return Err(Error::InvalidKey(format!("Unknown key code: {s}"))),
    };
    Ok(code)
}

fn format_code(code: &Code) -> &'static str {
    match code {
        Code::AudioVolumeUp => "volumeup",
        Code::AudioVolumeDown => "volumedown",
        Code::AudioVolumeMute => "volumemute",
        Code::MediaPlayPause => "playpause",
        Code::MediaStop => "stop",
        Code::MediaTrackNext => "nexttrack",
        Code::MediaTrackPrevious => "prevtrack",

        Code::KeyA => "a",
        Code::KeyB => "b",
        Code::KeyC => "c",
        Code::KeyD => "d",
        Code::KeyE => "e",
        Code::KeyF => "f",
        Code::KeyG => "g",
        Code::KeyH => "h",
        Code::KeyI => "i",
        Code::KeyJ => "j",
        Code::KeyK => "k",
        Code::KeyL => "l",
        Code::KeyM => "m",
        Code::KeyN => "n",
        Code::KeyO => "o",
        Code::KeyP => "p",
        Code::KeyQ => "q",
        Code::KeyR => "r",
        Code::KeyS => "s",
        Code::KeyT => "t",
        Code::KeyU => "u",
        Code::KeyV => "v",
        Code::KeyW => "w",
        Code::KeyX => "x",
        Code::KeyY => "y",
        Code::KeyZ => "z",

        Code::Digit0 => "0",
        Code::Digit1 => "1",
        Code::Digit2 => "2",
        Code::Digit3 => "3",
        Code::Digit4 => "4",
        Code::Digit5 => "5",
        Code::Digit6 => "6",
        Code::Digit7 => "7",
        Code::Digit8 => "8",
        Code::Digit9 => "9",

        Code::F1 => "f1",
        Code::F2 => "f2",
        Code::F3 => "f3",
        Code::F4 => "f4",
        Code::F5 => "f5",
        Code::F6 => "f6",
        Code::F7 => "f7",
        Code::F8 => "f8",
        Code::F9 => "f9",
        Code::F10 => "f10",
        Code::F11 => "f11",
        Code::F12 => "f12",
        Code::F13 => "f13",
        Code::F14 => "f14",
        Code::F15 => "f15",
        Code::F16 => "f16",

        Code::ArrowUp => "up",
        Code::ArrowDown => "down",
        Code::ArrowLeft => "left",
        Code::ArrowRight => "right",
        Code::PageUp => "pageup",
        Code::PageDown => "pagedown",
        Code::Home => "home",
        Code::End => "end",

        Code::Minus => "minus",
        Code::Equal => "equal",
        Code::Space => "space",

        _ => "unknown",
    }
}
