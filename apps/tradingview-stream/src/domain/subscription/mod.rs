//! Subscription Types
//!
//! Domain types describing one stream request: the symbol, the timeframe,
//! the requested bar count, and the attached indicator studies with their
//! server-side slot assignment.
//!
//! # Design
//!
//! Slot assignment is a deterministic function of indicator position, not of
//! the arrival order of server responses: slots are handed out before any
//! data arrives, and the packet extractor resolves slot -> indicator purely
//! from this map. The same slots are re-requested with the same indicators
//! after a reconnect.

use std::str::FromStr;

use crate::domain::streaming::{Timeframe, UnsupportedTimeframe};

/// First study slot number handed out by the chart session.
pub const STUDY_SLOT_BASE: u32 = 9;

// =============================================================================
// Errors
// =============================================================================

/// Validation errors for stream requests, rejected before any network I/O.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    /// The symbol string was empty.
    #[error("exchange symbol cannot be empty")]
    EmptySymbol,

    /// The symbol string was not of the form `EXCHANGE:SYMBOL`.
    #[error("invalid symbol format '{0}', must be like 'BINANCE:BTCUSDT'")]
    InvalidSymbol(String),

    /// The requested bar count was zero.
    #[error("requested bar count must be at least 1")]
    ZeroBarCount,

    /// An indicator id and version must be provided together.
    #[error("both indicator id and indicator version must be provided together")]
    MismatchedIndicator,

    /// The timeframe code is not supported.
    #[error(transparent)]
    Timeframe(#[from] UnsupportedTimeframe),
}

// =============================================================================
// Symbol
// =============================================================================

/// A validated `EXCHANGE:SYMBOL` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol(String);

impl Symbol {
    /// Parse and validate an `EXCHANGE:SYMBOL` string.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::EmptySymbol`] or
    /// [`SubscriptionError::InvalidSymbol`] when the format does not hold.
    pub fn parse(raw: &str) -> Result<Self, SubscriptionError> {
        if raw.is_empty() {
            return Err(SubscriptionError::EmptySymbol);
        }
        let mut parts = raw.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(exchange), Some(symbol), None) if !exchange.is_empty() && !symbol.is_empty() => {
                Ok(Self(raw.to_string()))
            }
            _ => Err(SubscriptionError::InvalidSymbol(raw.to_string())),
        }
    }

    /// The full `EXCHANGE:SYMBOL` string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The exchange part.
    #[must_use]
    pub fn exchange(&self) -> &str {
        self.0.split(':').next().unwrap_or_default()
    }

    /// The ticker part.
    #[must_use]
    pub fn ticker(&self) -> &str {
        self.0.split(':').nth(1).unwrap_or_default()
    }
}

impl FromStr for Symbol {
    type Err = SubscriptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Indicator
// =============================================================================

/// A published indicator script reference: pine script id plus version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Indicator {
    /// Pine script id, e.g. `STD;RSI`.
    pub id: String,
    /// Script version, e.g. `29.0`.
    pub version: String,
}

impl Indicator {
    /// Create an indicator reference.
    #[must_use]
    pub const fn new(id: String, version: String) -> Self {
        Self { id, version }
    }

    /// Build an optional indicator from optional id/version parts.
    ///
    /// Mirrors the caller-facing surface where both parts are optional but
    /// only valid together.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::MismatchedIndicator`] when exactly one
    /// part is present.
    pub fn from_parts(
        id: Option<String>,
        version: Option<String>,
    ) -> Result<Option<Self>, SubscriptionError> {
        match (id, version) {
            (Some(id), Some(version)) => Ok(Some(Self::new(id, version))),
            (None, None) => Ok(None),
            _ => Err(SubscriptionError::MismatchedIndicator),
        }
    }
}

// =============================================================================
// Subscription
// =============================================================================

/// One stream request, immutable for its lifetime.
///
/// The same subscription value is replayed verbatim (with fresh session ids)
/// after a reconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// The instrument to stream.
    pub symbol: Symbol,
    /// Caller-facing timeframe; coarser frames are resampled client-side.
    pub timeframe: Timeframe,
    /// Number of bars to request from the chart series.
    pub bar_count: u32,
    /// Indicator studies to attach, in slot-assignment order.
    pub indicators: Vec<Indicator>,
}

impl Subscription {
    /// Validate and build a subscription.
    ///
    /// # Errors
    ///
    /// Returns a [`SubscriptionError`] for an invalid symbol, an unsupported
    /// timeframe, or a zero bar count.
    pub fn new(
        symbol: &str,
        timeframe: &str,
        bar_count: u32,
        indicators: Vec<Indicator>,
    ) -> Result<Self, SubscriptionError> {
        if bar_count == 0 {
            return Err(SubscriptionError::ZeroBarCount);
        }
        Ok(Self {
            symbol: Symbol::parse(symbol)?,
            timeframe: timeframe.parse()?,
            bar_count,
            indicators,
        })
    }
}

// =============================================================================
// Study slot map
// =============================================================================

/// Mapping from server-side study slot name to the indicator it carries.
///
/// The k-th requested indicator (0-based) is assigned slot
/// `st{STUDY_SLOT_BASE + k}`. Slot names are unique per subscription and
/// stable across reconnects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudySlotMap {
    slots: Vec<(String, Indicator)>,
}

impl StudySlotMap {
    /// Assign slots to indicators in order.
    #[must_use]
    pub fn assign(indicators: &[Indicator]) -> Self {
        let slots = indicators
            .iter()
            .enumerate()
            .map(|(k, indicator)| {
                #[allow(clippy::cast_possible_truncation)]
                let number = STUDY_SLOT_BASE + k as u32;
                (format!("st{number}"), indicator.clone())
            })
            .collect();
        Self { slots }
    }

    /// Resolve a slot name to its indicator.
    #[must_use]
    pub fn indicator_for(&self, slot: &str) -> Option<&Indicator> {
        self.slots
            .iter()
            .find(|(name, _)| name == slot)
            .map(|(_, indicator)| indicator)
    }

    /// Iterate `(slot name, indicator)` pairs in assignment order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Indicator)> {
        self.slots
            .iter()
            .map(|(name, indicator)| (name.as_str(), indicator))
    }

    /// Number of assigned slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when no studies are attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indicator(id: &str) -> Indicator {
        Indicator::new(id.to_string(), "1.0".to_string())
    }

    #[test]
    fn symbol_parses_exchange_and_ticker() {
        let symbol = Symbol::parse("BINANCE:BTCUSDT").unwrap();
        assert_eq!(symbol.exchange(), "BINANCE");
        assert_eq!(symbol.ticker(), "BTCUSDT");
        assert_eq!(symbol.as_str(), "BINANCE:BTCUSDT");
    }

    #[test]
    fn symbol_rejects_bad_formats() {
        assert_eq!(
            Symbol::parse("").unwrap_err(),
            SubscriptionError::EmptySymbol
        );
        assert!(matches!(
            Symbol::parse("BTCUSDT").unwrap_err(),
            SubscriptionError::InvalidSymbol(_)
        ));
        assert!(matches!(
            Symbol::parse("A:B:C").unwrap_err(),
            SubscriptionError::InvalidSymbol(_)
        ));
        assert!(matches!(
            Symbol::parse(":BTCUSDT").unwrap_err(),
            SubscriptionError::InvalidSymbol(_)
        ));
    }

    #[test]
    fn indicator_parts_must_come_together() {
        assert!(
            Indicator::from_parts(Some("STD;RSI".into()), Some("29.0".into()))
                .unwrap()
                .is_some()
        );
        assert!(Indicator::from_parts(None, None).unwrap().is_none());
        assert_eq!(
            Indicator::from_parts(Some("STD;RSI".into()), None).unwrap_err(),
            SubscriptionError::MismatchedIndicator
        );
        assert_eq!(
            Indicator::from_parts(None, Some("29.0".into())).unwrap_err(),
            SubscriptionError::MismatchedIndicator
        );
    }

    #[test]
    fn subscription_rejects_zero_bar_count() {
        assert_eq!(
            Subscription::new("BINANCE:BTCUSDT", "1m", 0, vec![]).unwrap_err(),
            SubscriptionError::ZeroBarCount
        );
    }

    #[test]
    fn subscription_rejects_unknown_timeframe() {
        assert!(matches!(
            Subscription::new("BINANCE:BTCUSDT", "7m", 10, vec![]).unwrap_err(),
            SubscriptionError::Timeframe(_)
        ));
    }

    #[test]
    fn slots_are_assigned_sequentially_from_the_base() {
        let map = StudySlotMap::assign(&[
            indicator("STD;RSI"),
            indicator("STD;MACD"),
            indicator("STD;CCI"),
        ]);

        let names: Vec<&str> = map.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["st9", "st10", "st11"]);
    }

    #[test]
    fn slot_lookup_is_independent_of_arrival_order() {
        let map = StudySlotMap::assign(&[
            indicator("STD;RSI"),
            indicator("STD;MACD"),
            indicator("STD;CCI"),
        ]);

        // Query in reverse of assignment order, as if the server delivered
        // the later studies first.
        assert_eq!(map.indicator_for("st11").unwrap().id, "STD;CCI");
        assert_eq!(map.indicator_for("st10").unwrap().id, "STD;MACD");
        assert_eq!(map.indicator_for("st9").unwrap().id, "STD;RSI");
        assert!(map.indicator_for("st12").is_none());
    }

    #[test]
    fn empty_slot_map() {
        let map = StudySlotMap::assign(&[]);
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);
    }
}
