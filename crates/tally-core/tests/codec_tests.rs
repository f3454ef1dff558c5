//! Codec tests (tally-core)
//!
//! Covers the inbound catalog in both the flat and the `data`-nested forms,
//! rejection of malformed payloads, and the outbound field names the hub
//! expects.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tally_core::{
    decode, encode, AdminNotice, Assignment, AssignmentUpdate, DeviceIdentity, HubAddress, Inbound,
    Outbound,
};

fn decode_str(s: &str) -> tally_core::Result<Inbound> {
    decode(s.as_bytes())
}

// ============================================================================
// Acknowledgement family
// ============================================================================

#[test]
fn test_decode_registered_with_extra_fields() {
    let msg = decode_str(r#"{"type":"registered","deviceId":"tally-1","timestamp":"2024-01-01"}"#)
        .expect("registered should decode");
    assert_eq!(msg, Inbound::Registered);
}

#[test]
fn test_decode_heartbeat_ack() {
    assert_eq!(decode_str(r#"{"type":"heartbeat_ack"}"#).unwrap(), Inbound::HeartbeatAck);
}

#[test]
fn test_decode_register_required() {
    let msg = decode_str(r#"{"type":"register_required","message":"Please register with the hub"}"#);
    assert_eq!(msg.unwrap(), Inbound::RegisterRequired);
}

// ============================================================================
// Discovery
// ============================================================================

#[test]
fn test_decode_discover_reply() {
    let msg = decode_str(r#"{"type":"discover_reply","hubIp":"10.0.0.5","udpPort":7411,"apiPort":3000}"#)
        .unwrap();
    assert_eq!(
        msg,
        Inbound::DiscoverReply(HubAddress::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)), 7411))
    );
}

#[test]
fn test_decode_discover_reply_rejects_hostname() {
    assert!(decode_str(r#"{"type":"discover_reply","hubIp":"hub.local","udpPort":7411}"#).is_err());
}

#[test]
fn test_decode_discover_reply_rejects_unspecified() {
    assert!(decode_str(r#"{"type":"discover_reply","hubIp":"0.0.0.0","udpPort":7411}"#).is_err());
}

#[test]
fn test_decode_discover_reply_requires_port() {
    assert!(decode_str(r#"{"type":"discover_reply","hubIp":"10.0.0.5"}"#).is_err());
}

// ============================================================================
// Tally
// ============================================================================

#[test]
fn test_decode_tally_flat() {
    let msg = decode_str(r#"{"type":"tally","sourceId":"cam1","program":true,"preview":false}"#).unwrap();
    match msg {
        Inbound::Tally(tally) => {
            assert_eq!(tally.source_id, "cam1");
            assert!(tally.program);
            assert!(!tally.preview);
            assert!(!tally.recording, "recording defaults to false");
            assert!(!tally.streaming, "streaming defaults to false");
        }
        other => panic!("Expected tally, got {:?}", other),
    }
}

#[test]
fn test_decode_tally_nested() {
    let msg = decode_str(
        r#"{"type":"tally","data":{"id":"cam2","name":"Camera 2","program":false,"preview":true,"recording":true,"streaming":false}}"#,
    )
    .unwrap();
    match msg {
        Inbound::Tally(tally) => {
            assert_eq!(tally.source_id, "cam2");
            assert_eq!(tally.source_name.as_deref(), Some("Camera 2"));
            assert!(tally.preview);
            assert!(tally.recording);
        }
        other => panic!("Expected tally, got {:?}", other),
    }
}

#[test]
fn test_decode_tally_missing_bits_is_error() {
    assert!(decode_str(r#"{"type":"tally","sourceId":"cam1","program":true}"#).is_err());
}

#[test]
fn test_decode_tally_empty_source_is_error() {
    assert!(decode_str(r#"{"type":"tally","sourceId":"","program":true,"preview":false}"#).is_err());
}

#[test]
fn test_decode_tally_wrong_type_is_error() {
    assert!(decode_str(r#"{"type":"tally","sourceId":"cam1","program":"yes","preview":false}"#).is_err());
}

// ============================================================================
// Assignment
// ============================================================================

#[test]
fn test_decode_assignment_flat() {
    let msg = decode_str(
        r#"{"type":"assignment","mode":"assigned","sourceId":"cam2","sourceName":"Camera 2"}"#,
    )
    .unwrap();
    assert_eq!(
        msg,
        Inbound::Assignment(AssignmentUpdate::Assigned {
            source_id: "cam2".to_string(),
            source_name: "Camera 2".to_string(),
        })
    );
}

#[test]
fn test_decode_assignment_nested_unassigned() {
    let msg = decode_str(r#"{"type":"assignment","data":{"mode":"unassigned"}}"#).unwrap();
    assert_eq!(msg, Inbound::Assignment(AssignmentUpdate::Unassigned));
}

#[test]
fn test_decode_assignment_without_mode() {
    let assigned = decode_str(r#"{"type":"assignment","sourceId":"cam3"}"#).unwrap();
    assert!(matches!(
        assigned,
        Inbound::Assignment(AssignmentUpdate::Assigned { ref source_id, .. }) if source_id == "cam3"
    ));

    let cleared = decode_str(r#"{"type":"assignment","sourceId":""}"#).unwrap();
    assert_eq!(cleared, Inbound::Assignment(AssignmentUpdate::Unassigned));
}

#[test]
fn test_decode_assigned_without_source_is_error() {
    assert!(decode_str(r#"{"type":"assignment","mode":"assigned","sourceName":"Camera 2"}"#).is_err());
}

#[test]
fn test_decode_assignment_unknown_mode_is_error() {
    assert!(decode_str(r#"{"type":"assignment","mode":"borrowed","sourceId":"cam2"}"#).is_err());
}

// ============================================================================
// Admin messages
// ============================================================================

#[test]
fn test_decode_admin_message() {
    let msg = decode_str(
        r##"{"type":"admin_message","id":"lk2-abc","text":"Stand by","color":"#ff0000","duration":5000,"timestamp":1}"##,
    )
    .unwrap();
    assert_eq!(
        msg,
        Inbound::AdminMessage(AdminNotice {
            id: Some("lk2-abc".to_string()),
            text: "Stand by".to_string(),
            color: Some("#ff0000".to_string()),
            duration: Some(Duration::from_millis(5000)),
        })
    );
}

#[test]
fn test_decode_admin_message_requires_text() {
    assert!(decode_str(r#"{"type":"admin_message","id":"x"}"#).is_err());
}

// ============================================================================
// Malformed and unknown input
// ============================================================================

#[test]
fn test_decode_unknown_type() {
    assert_eq!(decode_str(r#"{"type":"firmware_update","url":"x"}"#).unwrap(), Inbound::Unknown);
}

#[test]
fn test_decode_missing_type_is_error() {
    assert!(decode_str(r#"{"sourceId":"cam1","program":true,"preview":false}"#).is_err());
}

#[test]
fn test_decode_garbage_is_error() {
    assert!(decode(b"\xff\xfe not json").is_err());
    assert!(decode_str("[1,2,3]").is_err());
    assert!(decode_str(r#"{"type":"tally""#).is_err());
}

// ============================================================================
// Outbound
// ============================================================================

#[test]
fn test_encode_register_unassigned_omits_source() {
    let identity = DeviceIdentity::new("tally-02", "Booth");
    let bytes = encode(&Outbound::register(&identity, &Assignment::unassigned())).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(json["type"], "register");
    assert_eq!(json["deviceName"], "Booth");
    assert_eq!(json["isAssigned"], false);
    assert!(json.get("assignedSource").is_none());
    assert!(json.get("model").is_some());
    assert!(json.get("firmware").is_some());
}

#[test]
fn test_encode_heartbeat() {
    let identity = DeviceIdentity::new("tally-02", "Booth");
    let msg = Outbound::heartbeat(&identity, &Assignment::new("cam1", ""), Duration::from_secs(90));
    let json: serde_json::Value = serde_json::from_slice(&encode(&msg).unwrap()).unwrap();

    assert_eq!(json["type"], "heartbeat");
    assert_eq!(json["deviceId"], "tally-02");
    assert_eq!(json["uptime"], 90_000);
}

#[test]
fn test_encode_discover() {
    let identity = DeviceIdentity::new("tally-03", "Jib");
    let json: serde_json::Value =
        serde_json::from_slice(&encode(&Outbound::discover(&identity)).unwrap()).unwrap();
    assert_eq!(json["type"], "discover");
    assert_eq!(json["deviceId"], "tally-03");
}

#[test]
fn test_encode_admin_ack_snippet() {
    let identity = DeviceIdentity::new("tally-04", "Jib");
    let notice = AdminNotice {
        id: Some("m1".to_string()),
        text: "Please return to the control room now".to_string(),
        color: None,
        duration: None,
    };
    let json: serde_json::Value =
        serde_json::from_slice(&encode(&Outbound::admin_ack(&identity, &notice)).unwrap()).unwrap();

    assert_eq!(json["type"], "admin_message_ack");
    assert_eq!(json["id"], "m1");
    assert_eq!(json["method"], "display");
    assert_eq!(json["textSnippet"].as_str().unwrap().chars().count(), 20);
}
