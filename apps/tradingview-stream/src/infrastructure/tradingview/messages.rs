//! Protocol Message Types
//!
//! Outbound messages are `{"m": <method>, "p": [<params>...]}` objects,
//! serialized compactly and wrapped in a wire frame. Inbound payloads are
//! classified into a tagged [`Packet`] enum keyed on the method name, with
//! an explicit [`Packet::Unknown`] fallback so undocumented server messages
//! stay forward-compatible instead of failing decode.

use serde::Serialize;
use serde_json::Value;

use super::codec;

// =============================================================================
// Outbound
// =============================================================================

/// One outbound protocol message.
#[derive(Debug, Clone, Serialize)]
pub struct ClientMessage {
    /// Method name, e.g. `set_auth_token`.
    #[serde(rename = "m")]
    pub method: String,

    /// Positional parameters.
    #[serde(rename = "p")]
    pub params: Vec<Value>,
}

impl ClientMessage {
    /// Create a message from a method name and its parameters.
    #[must_use]
    pub fn new(method: &str, params: Vec<Value>) -> Self {
        Self {
            method: method.to_string(),
            params,
        }
    }

    /// Serialize to the compact JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize and wrap in a wire frame, ready to send.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        Ok(codec::encode_frame(&self.to_json()?))
    }
}

// =============================================================================
// Inbound
// =============================================================================

/// One decoded inbound packet.
///
/// Variants carry the raw `p` params array; the extractors walk it lazily
/// because the payload shape is semi-structured and varies per study.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Full OHLCV series snapshot (`timescale_update`).
    TimescaleUpdate(Value),
    /// Incremental data update carrying study series (`du`).
    DataUpdate(Value),
    /// A study started loading (`study_loading`).
    StudyLoading(Value),
    /// A study finished loading (`study_completed`).
    StudyCompleted(Value),
    /// The chart series started loading (`series_loading`).
    SeriesLoading(Value),
    /// The chart series finished loading (`series_completed`).
    SeriesCompleted(Value),
    /// Per-symbol quote field update (`qsd`).
    QuoteSeriesData(Value),
    /// Quote snapshot delivery finished (`quote_completed`).
    QuoteCompleted(Value),
    /// Symbol resolution result (`symbol_resolved`).
    SymbolResolved(Value),
    /// Recoverable server-side protocol fault (`protocol_error`).
    ProtocolError(Value),
    /// Fatal server-side fault (`critical_error`).
    CriticalError(Value),
    /// Any other message, kept whole for forward compatibility.
    Unknown {
        /// The method name, empty when the payload carried none.
        method: String,
        /// The full decoded payload.
        payload: Value,
    },
}

impl Packet {
    /// Parse one frame payload into a packet.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not valid JSON.
    pub fn parse(payload: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::from_value(serde_json::from_str(payload)?))
    }

    /// Classify a decoded JSON value.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        let method = value
            .get("m")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let params = value.get("p").cloned().unwrap_or(Value::Null);

        match method.as_str() {
            "timescale_update" => Self::TimescaleUpdate(params),
            "du" => Self::DataUpdate(params),
            "study_loading" => Self::StudyLoading(params),
            "study_completed" => Self::StudyCompleted(params),
            "series_loading" => Self::SeriesLoading(params),
            "series_completed" => Self::SeriesCompleted(params),
            "qsd" => Self::QuoteSeriesData(params),
            "quote_completed" => Self::QuoteCompleted(params),
            "symbol_resolved" => Self::SymbolResolved(params),
            "protocol_error" => Self::ProtocolError(params),
            "critical_error" => Self::CriticalError(params),
            _ => Self::Unknown {
                method,
                payload: value,
            },
        }
    }

    /// The packet's method name.
    #[must_use]
    pub fn method(&self) -> &str {
        match self {
            Self::TimescaleUpdate(_) => "timescale_update",
            Self::DataUpdate(_) => "du",
            Self::StudyLoading(_) => "study_loading",
            Self::StudyCompleted(_) => "study_completed",
            Self::SeriesLoading(_) => "series_loading",
            Self::SeriesCompleted(_) => "series_completed",
            Self::QuoteSeriesData(_) => "qsd",
            Self::QuoteCompleted(_) => "quote_completed",
            Self::SymbolResolved(_) => "symbol_resolved",
            Self::ProtocolError(_) => "protocol_error",
            Self::CriticalError(_) => "critical_error",
            Self::Unknown { method, .. } => method,
        }
    }

    /// The packet's params array (or the full payload for unknown packets).
    #[must_use]
    pub const fn params(&self) -> &Value {
        match self {
            Self::TimescaleUpdate(p)
            | Self::DataUpdate(p)
            | Self::StudyLoading(p)
            | Self::StudyCompleted(p)
            | Self::SeriesLoading(p)
            | Self::SeriesCompleted(p)
            | Self::QuoteSeriesData(p)
            | Self::QuoteCompleted(p)
            | Self::SymbolResolved(p)
            | Self::ProtocolError(p)
            | Self::CriticalError(p)
            | Self::Unknown { payload: p, .. } => p,
        }
    }

    /// True for server fault packets that should abort collection.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(self, Self::ProtocolError(_) | Self::CriticalError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_message_serializes_compactly() {
        let msg = ClientMessage::new("set_auth_token", vec![json!("token")]);
        assert_eq!(msg.to_json().unwrap(), r#"{"m":"set_auth_token","p":["token"]}"#);
    }

    #[test]
    fn client_message_frame_carries_byte_length() {
        let msg = ClientMessage::new("quote_create_session", vec![json!("qs_abc")]);
        let frame = msg.to_frame().unwrap();
        let body = msg.to_json().unwrap();
        assert_eq!(frame, format!("~m~{}~m~{}", body.len(), body));
    }

    #[test]
    fn known_methods_are_classified() {
        let packet = Packet::parse(r#"{"m":"timescale_update","p":[1,2]}"#).unwrap();
        assert!(matches!(packet, Packet::TimescaleUpdate(_)));
        assert_eq!(packet.method(), "timescale_update");
        assert_eq!(packet.params(), &json!([1, 2]));

        let packet = Packet::parse(r#"{"m":"du","p":[]}"#).unwrap();
        assert!(matches!(packet, Packet::DataUpdate(_)));

        let packet = Packet::parse(r#"{"m":"critical_error","p":["boom"]}"#).unwrap();
        assert!(packet.is_server_error());
    }

    #[test]
    fn unknown_method_falls_back_without_failing() {
        let packet = Packet::parse(r#"{"m":"quote_list_fields","p":[]}"#).unwrap();
        match &packet {
            Packet::Unknown { method, .. } => assert_eq!(method, "quote_list_fields"),
            other => panic!("expected Unknown, got {other:?}"),
        }
    }

    #[test]
    fn methodless_payload_is_kept_whole() {
        let packet = Packet::parse(r#"{"session_id":"x","timestamp":1}"#).unwrap();
        match &packet {
            Packet::Unknown { method, payload } => {
                assert!(method.is_empty());
                assert_eq!(payload.get("session_id"), Some(&json!("x")));
            }
            other => panic!("expected Unknown, got {other:?}"),
        }
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(Packet::parse("~h~1").is_err());
    }
}
