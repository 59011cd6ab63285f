//! Batch Collection
//!
//! The collection policy for batch mode: keep pulling packets until the bar
//! series has arrived and every requested study has produced a full point
//! series, or the packet ceiling is reached. Partial study delivery at the
//! ceiling is an expected outcome (free-tier backends silently cap the
//! number of concurrently streamable studies) and is reported by name, not
//! raised.

use std::collections::HashMap;

use crate::domain::streaming::{Bar, IndicatorPoint};
use crate::infrastructure::config::CollectorSettings;
use crate::infrastructure::tradingview::client::{PacketStream, StreamError};
use crate::infrastructure::tradingview::extract::{extract_bars, extract_indicator_points};

/// Unresampled series collected from one stream.
#[derive(Debug, Clone, Default)]
pub struct RawSeries {
    /// The 1-minute-equivalent bar series.
    pub bars: Vec<Bar>,
    /// Indicator id -> point series, for studies that delivered.
    pub indicators: HashMap<String, Vec<IndicatorPoint>>,
    /// Indicator ids that never delivered within the packet ceiling.
    pub failed_indicators: Vec<String>,
}

/// Poll the stream until the requested series materialize or the packet
/// ceiling is reached.
///
/// # Errors
///
/// Returns [`StreamError::DataNotFound`] when no bar series arrived within
/// the ceiling, [`StreamError::Server`] on a server fault packet,
/// [`StreamError::Cancelled`] when the stream is cancelled mid-collection,
/// and propagates terminal transport errors from the stream.
pub async fn collect_series(
    stream: &mut PacketStream,
    settings: &CollectorSettings,
) -> Result<RawSeries, StreamError> {
    let slot_map = stream.slot_map().cloned().unwrap_or_default();
    let mut expected: Vec<String> = Vec::new();
    for (_, indicator) in slot_map.iter() {
        if !expected.contains(&indicator.id) {
            expected.push(indicator.id.clone());
        }
    }

    let mut bars: Vec<Bar> = Vec::new();
    let mut indicators: HashMap<String, Vec<IndicatorPoint>> = HashMap::new();

    for _ in 0..settings.max_packets {
        let Some(result) = stream.next().await else {
            if stream.is_cancelled() {
                return Err(StreamError::Cancelled);
            }
            break;
        };
        let packet = result?;

        if packet.is_server_error() {
            return Err(StreamError::Server {
                method: packet.method().to_string(),
                detail: packet.params().to_string(),
            });
        }

        if bars.is_empty() {
            let extracted = extract_bars(&packet);
            if !extracted.is_empty() {
                tracing::debug!(bars = extracted.len(), "bar series received");
                bars = extracted;
            }
        }

        for (id, points) in extract_indicator_points(&packet, &slot_map, settings.min_study_points)
        {
            tracing::debug!(indicator = %id, points = points.len(), "study series received");
            indicators.entry(id).or_insert(points);
        }

        if !bars.is_empty() && expected.iter().all(|id| indicators.contains_key(id.as_str())) {
            return Ok(RawSeries {
                bars,
                indicators,
                failed_indicators: Vec::new(),
            });
        }
    }

    if bars.is_empty() {
        let mut missing = vec!["ohlcv".to_string()];
        missing.extend(
            expected
                .iter()
                .filter(|id| !indicators.contains_key(id.as_str()))
                .cloned(),
        );
        return Err(StreamError::DataNotFound {
            packets: settings.max_packets,
            missing,
        });
    }

    let failed_indicators: Vec<String> = expected
        .into_iter()
        .filter(|id| !indicators.contains_key(id.as_str()))
        .collect();
    if !failed_indicators.is_empty() {
        tracing::warn!(
            ?failed_indicators,
            "studies never produced data within the packet ceiling"
        );
    }

    Ok(RawSeries {
        bars,
        indicators,
        failed_indicators,
    })
}
