//! Session Management
//!
//! Generates quote/chart session identifiers and builds the handshake and
//! subscription message sequences. Message order matters: the server
//! associates subsequent symbol/series messages with whichever session id
//! was most recently created of the matching kind, and there is no explicit
//! ack for any of these messages.
//!
//! Session ids are never reused across connections; a reconnect generates a
//! fresh pair and replays the same subscription verbatim.

use rand::Rng;
use serde_json::{Value, json};

use crate::application::ports::StudyPayload;
use crate::domain::subscription::{Subscription, Symbol};

use super::messages::ClientMessage;

/// Chart series identifier within the chart session.
pub const SERIES_ID: &str = "sds_1";

/// Symbol reference identifier within the chart session.
pub const SYMBOL_REF: &str = "sds_sym_1";

/// Series sub-id sent with `create_series`.
const SERIES_SUB_ID: &str = "s1";

/// Resolution code requested for the chart series. The series is always
/// streamed at one minute; coarser timeframes are resampled client-side.
const SERIES_RESOLUTION: &str = "1";

/// Child study id sent with `create_study`.
const STUDY_CHILD_ID: &str = "st1";

/// Fields requested for the quote session.
pub const QUOTE_FIELDS: [&str; 23] = [
    "ch",
    "chp",
    "current_session",
    "description",
    "local_description",
    "language",
    "exchange",
    "fractional",
    "is_tradable",
    "lp",
    "lp_time",
    "minmov",
    "minmove2",
    "original_name",
    "pricescale",
    "pro_name",
    "short_name",
    "type",
    "update_mode",
    "volume",
    "currency_code",
    "rchp",
    "rtc",
];

/// Generate a session identifier: prefix + 12 random lowercase letters.
///
/// `rand::rng` is CSPRNG-backed, which keeps concurrent subscriptions within
/// one process from colliding.
#[must_use]
pub fn generate_session_id(prefix: &str) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..12)
        .map(|_| char::from(rng.random_range(b'a'..=b'z')))
        .collect();
    format!("{prefix}{suffix}")
}

/// The session identifier pair for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIds {
    /// Quote session id (`qs_` prefixed).
    pub quote: String,
    /// Chart session id (`cs_` prefixed).
    pub chart: String,
}

impl SessionIds {
    /// Generate a fresh pair.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            quote: generate_session_id("qs_"),
            chart: generate_session_id("cs_"),
        }
    }
}

/// A study prepared for subscription: the assigned slot plus the opaque
/// payload fetched from the metadata collaborator. Cached per subscription
/// so re-subscription replays it verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedStudy {
    /// Assigned study slot, e.g. `st9`.
    pub slot: String,
    /// Study-creation payload.
    pub payload: StudyPayload,
}

/// Build the handshake sequence for a fresh connection.
#[must_use]
pub fn handshake_sequence(
    ids: &SessionIds,
    auth_token: &str,
    locale: &(String, String),
) -> Vec<ClientMessage> {
    let mut fields: Vec<Value> = vec![json!(ids.quote)];
    fields.extend(QUOTE_FIELDS.iter().map(|f| json!(f)));

    vec![
        ClientMessage::new("set_auth_token", vec![json!(auth_token)]),
        ClientMessage::new("set_locale", vec![json!(locale.0), json!(locale.1)]),
        ClientMessage::new("chart_create_session", vec![json!(ids.chart), json!("")]),
        ClientMessage::new("quote_create_session", vec![json!(ids.quote)]),
        ClientMessage::new("quote_set_fields", fields),
        ClientMessage::new("quote_hibernate_all", vec![json!(ids.quote)]),
    ]
}

/// Build the subscription sequence for one chart stream request.
///
/// Studies are attached in slot-assignment order, each followed by a
/// `quote_hibernate_all`.
#[must_use]
pub fn subscribe_sequence(
    ids: &SessionIds,
    subscription: &Subscription,
    studies: &[PreparedStudy],
) -> Vec<ClientMessage> {
    let symbol_param = resolve_param(&subscription.symbol);

    let mut messages = vec![
        ClientMessage::new(
            "quote_add_symbols",
            vec![json!(ids.quote), json!(symbol_param)],
        ),
        ClientMessage::new(
            "resolve_symbol",
            vec![json!(ids.chart), json!(SYMBOL_REF), json!(symbol_param)],
        ),
        ClientMessage::new(
            "create_series",
            vec![
                json!(ids.chart),
                json!(SERIES_ID),
                json!(SERIES_SUB_ID),
                json!(SYMBOL_REF),
                json!(SERIES_RESOLUTION),
                json!(subscription.bar_count),
                json!(""),
            ],
        ),
        ClientMessage::new(
            "quote_fast_symbols",
            vec![json!(ids.quote), json!(subscription.symbol.as_str())],
        ),
    ];

    for study in studies {
        messages.push(ClientMessage::new(
            "create_study",
            vec![
                json!(ids.chart),
                json!(study.slot),
                json!(STUDY_CHILD_ID),
                json!(SERIES_ID),
                json!(study.payload.script),
                study.payload.inputs.clone(),
            ],
        ));
        messages.push(ClientMessage::new(
            "quote_hibernate_all",
            vec![json!(ids.quote)],
        ));
    }

    messages
}

/// Build the quote-only subscription sequence for a set of symbols.
#[must_use]
pub fn quote_subscribe_sequence(ids: &SessionIds, symbols: &[Symbol]) -> Vec<ClientMessage> {
    let Some(first) = symbols.first() else {
        return vec![];
    };

    let descriptor = json!({
        "adjustment": "splits",
        "currency-id": "USD",
        "session": "regular",
        "symbol": first.as_str(),
    })
    .to_string();
    let first_param = format!("={descriptor}");

    let with_symbols = |head: Value| -> Vec<Value> {
        let mut params = vec![head];
        params.extend(symbols.iter().map(|s| json!(s.as_str())));
        params
    };

    vec![
        ClientMessage::new(
            "quote_add_symbols",
            vec![json!(ids.quote), json!(first_param)],
        ),
        ClientMessage::new(
            "quote_fast_symbols",
            vec![json!(ids.quote), json!(first_param)],
        ),
        ClientMessage::new("quote_add_symbols", with_symbols(json!(ids.quote))),
        ClientMessage::new("quote_fast_symbols", with_symbols(json!(ids.quote))),
    ]
}

/// The `=`-prefixed symbol descriptor used by `quote_add_symbols` and
/// `resolve_symbol`.
fn resolve_param(symbol: &Symbol) -> String {
    let descriptor = json!({
        "adjustment": "splits",
        "symbol": symbol.as_str(),
    })
    .to_string();
    format!("={descriptor}")
}
