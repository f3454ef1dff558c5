//! JSON datagram codec
//!
//! One datagram carries exactly one JSON object. Decoding is all-or-nothing:
//! a payload either validates into an [`Inbound`] or yields an error and has
//! no effect anywhere.

use crate::message::{Inbound, Outbound, WireInbound};
use crate::{Error, Result};
use bytes::Bytes;

/// Encode an outbound message to datagram bytes
pub fn encode(message: &Outbound) -> Result<Bytes> {
    serde_json::to_vec(message)
        .map(Bytes::from)
        .map_err(|e| Error::EncodeError(e.to_string()))
}

/// Decode and validate an inbound datagram
pub fn decode(bytes: &[u8]) -> Result<Inbound> {
    let wire: WireInbound = serde_json::from_slice(trim_nul(bytes))?;
    wire.validate()
}

/// Devices and some hub builds pad datagrams with a trailing NUL
fn trim_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Assignment, DeviceIdentity};

    #[test]
    fn test_encode_register_is_flat_json() {
        let identity = DeviceIdentity::new("tally-01", "Stage Left");
        let bytes = encode(&Outbound::register(&identity, &Assignment::new("cam1", "Camera 1"))).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(json["type"], "register");
        assert_eq!(json["deviceId"], "tally-01");
        assert_eq!(json["assignedSource"], "cam1");
        assert_eq!(json["isAssigned"], true);
    }

    #[test]
    fn test_decode_trailing_nul() {
        let msg = decode(b"{\"type\":\"registered\"}\0\0").unwrap();
        assert_eq!(msg, Inbound::Registered);
    }

    #[test]
    fn test_decode_empty_is_error() {
        assert!(decode(b"").is_err());
        assert!(decode(b"\0").is_err());
    }
}
