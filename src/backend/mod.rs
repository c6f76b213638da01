//! Concrete session backends
//!
//! Both backends adapt an opaque, already-authenticated device client to
//! [`SessionBackend`](crate::worker::SessionBackend). The wire protocols
//! themselves live behind the connector traits; these types only add the
//! session lifecycle around them.

pub mod mqtt;
pub mod video;

pub use mqtt::{MqttBackend, MqttClient, MqttCommand, MqttConnector, MqttMessage};
pub use video::{DeviceCommand, PeerClient, PeerConnector, VideoBackend, VideoConfig};

/// Bytes of a payload shown in debug logs
const HEX_PREVIEW_LEN: usize = 16;

/// Lowercase hex of the first bytes of `data`, with a trailing `...` when cut
pub(crate) fn hex_preview(data: &[u8]) -> String {
    use std::fmt::Write;

    let shown = data.len().min(HEX_PREVIEW_LEN);
    let mut out = String::with_capacity(shown * 2 + 3);
    for byte in &data[..shown] {
        let _ = write!(out, "{:02x}", byte);
    }
    if data.len() > shown {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_preview() {
        assert_eq!(hex_preview(&[]), "");
        assert_eq!(hex_preview(&[0x00, 0xab, 0x7f]), "00ab7f");

        let long = [0xffu8; 20];
        let preview = hex_preview(&long);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.len(), HEX_PREVIEW_LEN * 2 + 3);
    }
}
