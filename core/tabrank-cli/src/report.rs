//! `tabrank report`: forwards one probe activity payload to the daemon.
//!
//! The payload is read from stdin in the probe's own JSON shape
//! (`firstSeen`, `activeTime`, `idleTime`, ...).

use std::io::Read;

use tabrank_daemon_protocol::ActivityPayload;

const MAX_PAYLOAD_BYTES: u64 = 64 * 1024;

pub fn read_payload<R: Read>(reader: R) -> Result<ActivityPayload, String> {
    let mut input = String::new();
    reader
        .take(MAX_PAYLOAD_BYTES + 1)
        .read_to_string(&mut input)
        .map_err(|err| format!("Failed to read activity payload: {}", err))?;

    if input.len() as u64 > MAX_PAYLOAD_BYTES {
        return Err("Activity payload is too large".to_string());
    }
    if input.trim().is_empty() {
        return Err("Activity payload was empty".to_string());
    }

    serde_json::from_str(&input).map_err(|err| format!("Invalid activity payload: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_probe_payload() {
        let input = r#"{"firstSeen": 1700000000000, "activeTime": 4, "tabTitle": "Inbox"}"#;
        let payload = read_payload(input.as_bytes()).expect("payload");
        assert_eq!(payload.first_seen, Some(1_700_000_000_000));
        assert_eq!(payload.active_time, Some(4.0));
        assert_eq!(payload.tab_title.as_deref(), Some("Inbox"));
    }

    #[test]
    fn unknown_probe_fields_are_ignored() {
        let payload = read_payload(r#"{"idleTime": 2, "frameCount": 9}"#.as_bytes())
            .expect("payload");
        assert_eq!(payload.idle_time, Some(2.0));
    }

    #[test]
    fn rejects_empty_input() {
        assert!(read_payload("  \n".as_bytes()).is_err());
    }

    #[test]
    fn rejects_oversized_input() {
        let input = format!(r#"{{"tabTitle": "{}"}}"#, "x".repeat(70 * 1024));
        let err = read_payload(input.as_bytes()).unwrap_err();
        assert_eq!(err, "Activity payload is too large");
    }
}
