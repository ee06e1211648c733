//! The OSC messages TotalMix FX understands.

use rosc::{OscMessage, OscPacket, OscType, encoder};
use std::io;

/// Main fader address
pub const VOLUME_ADDRESS: &str = "/1/mastervolume";
/// Main dim toggle address
pub const DIM_ADDRESS: &str = "/1/mainDim";

/// Set the main fader to `value`, between 0.0 and 1.0
pub fn volume(value: f32) -> OscMessage {
    float_message(VOLUME_ADDRESS, value)
}

/// TotalMix flips the dim state on every press it receives
pub fn toggle_dim() -> OscMessage {
    float_message(DIM_ADDRESS, 1.0)
}

fn float_message(addr: &str, value: f32) -> OscMessage {
    OscMessage {
        addr: addr.to_string(),
        args: vec![OscType::Float(value)],
    }
}

/// Encode a message as a datagram payload
pub fn encode(message: OscMessage) -> io::Result<Vec<u8>> {
    encoder::encode(&OscPacket::Message(message)).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to encode OSC message: {e:?}"),
        )
    })
}
