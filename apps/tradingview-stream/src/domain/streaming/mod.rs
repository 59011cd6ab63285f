//! Chart Data Types
//!
//! Core market-data types produced by the stream: OHLCV bars, indicator
//! point series, and the batch result returned to callers. These types are
//! plain data - decoding from the wire lives in the infrastructure layer.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Timeframe
// =============================================================================

/// A supported chart timeframe.
///
/// The chart series is always requested from the server at the 1-minute
/// resolution; coarser timeframes are produced client-side by the resampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Timeframe {
    /// One minute.
    #[default]
    M1,
    /// Five minutes.
    M5,
    /// Fifteen minutes.
    M15,
    /// Thirty minutes.
    M30,
    /// One hour.
    H1,
    /// Two hours.
    H2,
    /// Four hours.
    H4,
    /// One day.
    D1,
    /// One week.
    W1,
    /// One month.
    Mo1,
}

/// Error returned when a timeframe code is not in the supported table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported timeframe: {0}")]
pub struct UnsupportedTimeframe(pub String);

impl Timeframe {
    /// The timeframe's width in minutes.
    #[must_use]
    pub const fn minutes(&self) -> u32 {
        match self {
            Self::M1 => 1,
            Self::M5 => 5,
            Self::M15 => 15,
            Self::M30 => 30,
            Self::H1 => 60,
            Self::H2 => 120,
            Self::H4 => 240,
            Self::D1 => 1_440,
            Self::W1 => 10_080,
            Self::Mo1 => 302_400,
        }
    }

    /// The caller-facing timeframe code.
    ///
    /// Note that `1m` (minute) and `1M` (month) differ only in case.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::M1 => "1m",
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::M30 => "30m",
            Self::H1 => "1h",
            Self::H2 => "2h",
            Self::H4 => "4h",
            Self::D1 => "1d",
            Self::W1 => "1w",
            Self::Mo1 => "1M",
        }
    }
}

impl FromStr for Timeframe {
    type Err = UnsupportedTimeframe;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Self::M1),
            "5m" => Ok(Self::M5),
            "15m" => Ok(Self::M15),
            "30m" => Ok(Self::M30),
            "1h" => Ok(Self::H1),
            "2h" => Ok(Self::H2),
            "4h" => Ok(Self::H4),
            "1d" => Ok(Self::D1),
            "1w" => Ok(Self::W1),
            "1M" => Ok(Self::Mo1),
            other => Err(UnsupportedTimeframe(other.to_string())),
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Bar
// =============================================================================

/// A single OHLCV bar.
///
/// Volume is legitimately absent on some instruments (indices, some forex
/// feeds) and on some update packets; absence is not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Position of the bar within the delivered series.
    pub index: i64,
    /// Bar open time as unix seconds (fractional seconds possible).
    pub timestamp: f64,
    /// Opening price.
    pub open: f64,
    /// Highest price.
    pub high: f64,
    /// Lowest price.
    pub low: f64,
    /// Closing price.
    pub close: f64,
    /// Traded volume, when the feed carries it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl Bar {
    /// Bar open time as a UTC datetime, when the timestamp is representable.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        if !self.timestamp.is_finite() {
            return None;
        }
        let secs = self.timestamp.trunc() as i64;
        let nanos = (self.timestamp.fract() * 1e9).round().abs() as u32;
        DateTime::from_timestamp(secs, nanos.min(999_999_999))
    }
}

// =============================================================================
// Indicator point
// =============================================================================

/// One computed point of a study series.
///
/// Values are positional: by convention `values[0]` is the smoothing value
/// and `values[1]` the primary ("close") value; the rest are
/// indicator-specific plots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPoint {
    /// Position of the point within the delivered series.
    pub index: i64,
    /// Point time as unix seconds.
    pub timestamp: f64,
    /// Positional plot values.
    pub values: Vec<f64>,
}

impl IndicatorPoint {
    /// The smoothing value (`values[0]`), when present.
    #[must_use]
    pub fn smoothing(&self) -> Option<f64> {
        self.values.first().copied()
    }

    /// The primary value (`values[1]`), when present.
    #[must_use]
    pub fn primary(&self) -> Option<f64> {
        self.values.get(1).copied()
    }
}

// =============================================================================
// Batch result
// =============================================================================

/// Result of one batch stream request.
///
/// Partial indicator delivery is an expected outcome: free-tier backends
/// silently cap the number of concurrently streamable studies, so studies
/// that never produced data are reported by name rather than failing the
/// whole request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StreamBatch {
    /// The resampled OHLCV series.
    pub bars: Vec<Bar>,
    /// Indicator id -> resampled point series, for studies that delivered.
    pub indicators: HashMap<String, Vec<IndicatorPoint>>,
    /// Indicator ids that never produced a series within the packet ceiling.
    pub failed_indicators: Vec<String>,
}

impl StreamBatch {
    /// True when every requested study delivered a series.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed_indicators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeframe_parses_supported_codes() {
        assert_eq!("1m".parse::<Timeframe>().unwrap(), Timeframe::M1);
        assert_eq!("4h".parse::<Timeframe>().unwrap(), Timeframe::H4);
        assert_eq!("1w".parse::<Timeframe>().unwrap(), Timeframe::W1);
    }

    #[test]
    fn timeframe_month_and_minute_differ_by_case() {
        assert_eq!("1M".parse::<Timeframe>().unwrap(), Timeframe::Mo1);
        assert_eq!("1m".parse::<Timeframe>().unwrap(), Timeframe::M1);
        assert_eq!(Timeframe::Mo1.minutes(), 302_400);
        assert_eq!(Timeframe::M1.minutes(), 1);
    }

    #[test]
    fn timeframe_rejects_unknown_code() {
        let err = "3m".parse::<Timeframe>().unwrap_err();
        assert_eq!(err, UnsupportedTimeframe("3m".to_string()));
    }

    #[test]
    fn bar_serializes_without_volume_key_when_absent() {
        let bar = Bar {
            index: 0,
            timestamp: 1_700_000_000.0,
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            volume: None,
        };
        let json = serde_json::to_string(&bar).unwrap();
        assert!(!json.contains("volume"));
    }

    #[test]
    fn bar_datetime_conversion() {
        let bar = Bar {
            index: 0,
            timestamp: 1_700_000_000.0,
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: Some(10.0),
        };
        let dt = bar.datetime().unwrap();
        assert_eq!(dt.timestamp(), 1_700_000_000);
    }

    #[test]
    fn indicator_point_positional_accessors() {
        let point = IndicatorPoint {
            index: 3,
            timestamp: 1_700_000_060.0,
            values: vec![42.5, 101.25, 7.0],
        };
        assert_eq!(point.smoothing(), Some(42.5));
        assert_eq!(point.primary(), Some(101.25));

        let empty = IndicatorPoint {
            index: 0,
            timestamp: 0.0,
            values: vec![],
        };
        assert_eq!(empty.smoothing(), None);
        assert_eq!(empty.primary(), None);
    }

    #[test]
    fn batch_completeness() {
        let mut batch = StreamBatch::default();
        assert!(batch.is_complete());
        batch.failed_indicators.push("STD;RSI".to_string());
        assert!(!batch.is_complete());
    }
}
