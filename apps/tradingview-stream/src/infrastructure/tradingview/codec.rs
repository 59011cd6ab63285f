//! Wire Frame Codec
//!
//! Encoding and decoding for the length-prefixed multiplexed frame format.
//! Every wire unit is `~m~<decimal-length>~m~<payload>` where the length is
//! the UTF-8 **byte** length of the payload. A single WebSocket text message
//! may carry zero or more concatenated frames, and heartbeats
//! (`~m~<n>~m~~h~<counter>`) are interleaved with data frames on the same
//! socket.

use super::messages::Packet;

/// Frame header delimiter.
const DELIMITER: &str = "~m~";

/// Heartbeat payload marker.
const HEARTBEAT_MARKER: &str = "~h~";

/// Wrap a payload in a frame header.
///
/// The header carries the byte length of the UTF-8 encoded payload, not the
/// character count, which matters for multi-byte content.
#[must_use]
pub fn encode_frame(payload: &str) -> String {
    format!("{DELIMITER}{}{DELIMITER}{payload}", payload.len())
}

/// Split a raw WebSocket text message into its frame payloads.
///
/// Splits on every `~m~<digits>~m~` header occurrence and drops empty
/// payloads. Input without any header is passed through as a single payload,
/// and a message that is purely a heartbeat yields its `~h~<n>` body.
#[must_use]
pub fn split_frames(raw: &str) -> Vec<&str> {
    let mut frames = Vec::new();
    let mut cursor = 0;
    let mut search = 0;

    while let Some((start, end)) = next_header(raw, search) {
        if start > cursor {
            frames.push(&raw[cursor..start]);
        }
        cursor = end;
        search = end;
    }
    if cursor < raw.len() {
        frames.push(&raw[cursor..]);
    }
    frames
}

/// True iff the whole message is a single heartbeat frame.
///
/// The receiver must echo the literal message back verbatim; the echo is
/// part of the protocol's liveness contract.
#[must_use]
pub fn is_heartbeat(raw: &str) -> bool {
    let Some(rest) = raw.strip_prefix(DELIMITER) else {
        return false;
    };
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return false;
    }
    let Some(rest) = rest[digits..].strip_prefix(DELIMITER) else {
        return false;
    };
    let Some(counter) = rest.strip_prefix(HEARTBEAT_MARKER) else {
        return false;
    };
    !counter.is_empty() && counter.bytes().all(|b| b.is_ascii_digit())
}

/// Decode every data packet carried by a raw WebSocket text message.
///
/// A payload that is not valid JSON is logged and skipped; a malformed unit
/// must never abort the receive loop.
#[must_use]
pub fn decode_packets(raw: &str) -> Vec<Packet> {
    split_frames(raw)
        .into_iter()
        .filter_map(|payload| match Packet::parse(payload) {
            Ok(packet) => Some(packet),
            Err(error) => {
                tracing::warn!(%error, payload, "skipping undecodable frame payload");
                None
            }
        })
        .collect()
}

/// Find the next `~m~<digits>~m~` header at or after `from`, returning the
/// byte offsets of its start and of the payload that follows it.
fn next_header(raw: &str, from: usize) -> Option<(usize, usize)> {
    let bytes = raw.as_bytes();
    let mut i = from;

    while let Some(pos) = raw[i..].find(DELIMITER) {
        let start = i + pos;
        let digits_start = start + DELIMITER.len();
        let mut j = digits_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > digits_start && raw[j..].starts_with(DELIMITER) {
            return Some((start, j + DELIMITER.len()));
        }
        i = start + DELIMITER.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encode_uses_byte_length_for_multibyte_payloads() {
        // "π" is two bytes in UTF-8 but one character.
        assert_eq!(encode_frame("π"), "~m~2~m~π");
        assert_eq!(encode_frame(r#"{"m":"x"}"#), "~m~9~m~{\"m\":\"x\"}");
    }

    #[test]
    fn split_recovers_a_single_frame() {
        let raw = encode_frame(r#"{"m":"du","p":[]}"#);
        assert_eq!(split_frames(&raw), vec![r#"{"m":"du","p":[]}"#]);
    }

    #[test]
    fn split_recovers_concatenated_frames() {
        let a = r#"{"m":"du","p":[]}"#;
        let b = r#"{"m":"timescale_update","p":[]}"#;
        let raw = format!("{}{}", encode_frame(a), encode_frame(b));
        assert_eq!(split_frames(&raw), vec![a, b]);
    }

    #[test]
    fn split_tolerates_a_pure_heartbeat() {
        assert_eq!(split_frames("~m~4~m~~h~1"), vec!["~h~1"]);
    }

    #[test]
    fn split_passes_through_unframed_input() {
        assert_eq!(split_frames(r#"{"m":"x"}"#), vec![r#"{"m":"x"}"#]);
        assert!(split_frames("").is_empty());
    }

    #[test]
    fn split_drops_empty_payloads() {
        let raw = format!("{}{}", encode_frame(""), encode_frame("a"));
        assert_eq!(split_frames(&raw), vec!["a"]);
    }

    #[test]
    fn heartbeat_detection() {
        assert!(is_heartbeat("~m~4~m~~h~1"));
        assert!(is_heartbeat("~m~6~m~~h~123"));
        assert!(!is_heartbeat("~m~13~m~{\"m\":\"x\"}"));
        assert!(!is_heartbeat("~m~~m~~h~1"));
        assert!(!is_heartbeat("~m~4~m~~h~"));
        assert!(!is_heartbeat("~h~1"));
        assert!(!is_heartbeat(""));
    }

    #[test]
    fn heartbeat_with_trailing_data_is_not_a_heartbeat() {
        let raw = format!("~m~4~m~~h~1{}", encode_frame(r#"{"m":"x"}"#));
        assert!(!is_heartbeat(&raw));
    }

    #[test]
    fn decode_skips_invalid_json_without_dropping_the_rest() {
        let raw = format!(
            "{}{}",
            encode_frame("not json"),
            encode_frame(r#"{"m":"du","p":[]}"#)
        );
        let packets = decode_packets(&raw);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].method(), "du");
    }

    proptest! {
        // Payloads never contain the delimiter in practice (they are JSON
        // without literal "~m~" runs), so the property alphabet excludes '~'.
        #[test]
        fn frame_round_trip(payload in "[a-zA-Z0-9{}:,\\[\\]\" éπΩ]{1,80}") {
            let raw = encode_frame(&payload);
            prop_assert_eq!(split_frames(&raw), vec![payload.as_str()]);
        }

        #[test]
        fn multi_frame_round_trip(
            a in "[a-zA-Z0-9{}:,\" ]{1,40}",
            b in "[a-zA-Z0-9{}:,\" ]{1,40}",
        ) {
            let raw = format!("{}{}", encode_frame(&a), encode_frame(&b));
            prop_assert_eq!(split_frames(&raw), vec![a.as_str(), b.as_str()]);
        }
    }
}
