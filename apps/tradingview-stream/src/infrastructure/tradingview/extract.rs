//! Packet Extractors
//!
//! Pure functions turning raw packets into typed series. The payloads are
//! semi-structured: shapes vary per study and per update kind, so extraction
//! walks the params tree defensively. A structural mismatch in one entry or
//! one slot never fails the whole extraction - the offending unit is logged
//! and skipped.

use std::collections::HashMap;

use serde_json::Value;

use crate::domain::streaming::{Bar, IndicatorPoint};
use crate::domain::subscription::StudySlotMap;

use super::messages::Packet;
use super::session::SERIES_ID;

/// Extract the OHLCV series from a `timescale_update` packet.
///
/// Walks `p[1]["sds_1"]["s"]`; each entry is `{i, v: [timestamp, open,
/// high, low, close, volume?]}`. A missing volume element produces a bar
/// without volume rather than an error. Returns an empty vector for any
/// other packet kind.
#[must_use]
pub fn extract_bars(packet: &Packet) -> Vec<Bar> {
    let Packet::TimescaleUpdate(params) = packet else {
        return Vec::new();
    };
    let Some(entries) = params
        .get(1)
        .and_then(|p| p.get(SERIES_ID))
        .and_then(|series| series.get("s"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    let mut bars = Vec::with_capacity(entries.len());
    for entry in entries {
        match bar_from_entry(entry) {
            Some(bar) => bars.push(bar),
            None => tracing::warn!(%entry, "skipping malformed bar entry"),
        }
    }
    bars
}

/// Extract study point series from a `du` packet.
///
/// For every key in `p[1]` that matches a known study slot and whose `st`
/// array exceeds `min_points` (guarding against partial incremental updates
/// that are not yet a full series), converts each point and keys the result
/// by the slot's indicator id. Returns an empty map for any other packet
/// kind; a malformed slot yields no entries for that slot only.
#[must_use]
pub fn extract_indicator_points(
    packet: &Packet,
    slots: &StudySlotMap,
    min_points: usize,
) -> HashMap<String, Vec<IndicatorPoint>> {
    let Packet::DataUpdate(params) = packet else {
        return HashMap::new();
    };
    let Some(update) = params.get(1).and_then(Value::as_object) else {
        return HashMap::new();
    };

    let mut series_by_id = HashMap::new();
    for (key, body) in update {
        let Some(indicator) = slots.indicator_for(key) else {
            continue;
        };
        let Some(entries) = body.get("st").and_then(Value::as_array) else {
            tracing::warn!(slot = %key, "study update without a point array");
            continue;
        };
        if entries.len() <= min_points {
            tracing::debug!(
                slot = %key,
                points = entries.len(),
                "skipping partial study update"
            );
            continue;
        }

        let mut points = Vec::with_capacity(entries.len());
        for entry in entries {
            match point_from_entry(entry) {
                Some(point) => points.push(point),
                None => tracing::warn!(slot = %key, %entry, "skipping malformed study point"),
            }
        }
        if !points.is_empty() {
            series_by_id.insert(indicator.id.clone(), points);
        }
    }
    series_by_id
}

fn bar_from_entry(entry: &Value) -> Option<Bar> {
    let index = entry.get("i").and_then(Value::as_i64)?;
    let v = entry.get("v").and_then(Value::as_array)?;
    Some(Bar {
        index,
        timestamp: v.first().and_then(Value::as_f64)?,
        open: v.get(1).and_then(Value::as_f64)?,
        high: v.get(2).and_then(Value::as_f64)?,
        low: v.get(3).and_then(Value::as_f64)?,
        close: v.get(4).and_then(Value::as_f64)?,
        volume: v.get(5).and_then(Value::as_f64),
    })
}

fn point_from_entry(entry: &Value) -> Option<IndicatorPoint> {
    let index = entry.get("i").and_then(Value::as_i64)?;
    let v = entry.get("v").and_then(Value::as_array)?;
    let timestamp = v.first().and_then(Value::as_f64)?;
    let values: Option<Vec<f64>> = v.iter().skip(1).map(Value::as_f64).collect();
    Some(IndicatorPoint {
        index,
        timestamp,
        values: values?,
    })
}
