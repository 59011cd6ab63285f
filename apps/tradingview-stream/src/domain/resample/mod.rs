//! Timeframe Resampling
//!
//! Aggregates an ordered 1-minute-equivalent series into coarser buckets.
//! Each bucket covers exactly `target_minutes` consecutive source items; a
//! trailing group shorter than the target is still emitted as a final,
//! smaller bucket.

use crate::domain::streaming::{Bar, IndicatorPoint};

/// Resampling configuration errors, rejected before any aggregation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResampleError {
    /// The target width must be at least one minute.
    #[error("resample target must be at least 1 minute, got {0}")]
    InvalidTarget(u32),
}

/// Resample bars into buckets of `target_minutes` source bars.
///
/// Per bucket: open = first, close = last, high = max, low = min,
/// volume = sum only when every source bar carries volume, timestamp =
/// first bar's timestamp, index = bucket ordinal. A target of `1` is the
/// identity.
///
/// # Errors
///
/// Returns [`ResampleError::InvalidTarget`] when `target_minutes` is zero.
pub fn resample_bars(bars: &[Bar], target_minutes: u32) -> Result<Vec<Bar>, ResampleError> {
    match target_minutes {
        0 => Err(ResampleError::InvalidTarget(0)),
        1 => Ok(bars.to_vec()),
        _ => {
            let mut sorted = bars.to_vec();
            sorted.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

            let buckets = sorted
                .chunks(target_minutes as usize)
                .enumerate()
                .map(|(ordinal, group)| aggregate_bars(ordinal, group))
                .collect();
            Ok(buckets)
        }
    }
}

/// Resample indicator points into buckets of `target_minutes` source points.
///
/// The bucket carries the last point's value vector (latest wins), the first
/// point's timestamp, and the bucket ordinal as its index.
///
/// # Errors
///
/// Returns [`ResampleError::InvalidTarget`] when `target_minutes` is zero.
#[allow(clippy::cast_possible_wrap)]
pub fn resample_points(
    points: &[IndicatorPoint],
    target_minutes: u32,
) -> Result<Vec<IndicatorPoint>, ResampleError> {
    match target_minutes {
        0 => Err(ResampleError::InvalidTarget(0)),
        1 => Ok(points.to_vec()),
        _ => {
            let mut sorted = points.to_vec();
            sorted.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

            let buckets = sorted
                .chunks(target_minutes as usize)
                .enumerate()
                .map(|(ordinal, group)| {
                    // chunks() never yields an empty group
                    let first = &group[0];
                    let last = &group[group.len() - 1];
                    IndicatorPoint {
                        index: ordinal as i64,
                        timestamp: first.timestamp,
                        values: last.values.clone(),
                    }
                })
                .collect();
            Ok(buckets)
        }
    }
}

#[allow(clippy::cast_possible_wrap)]
fn aggregate_bars(ordinal: usize, group: &[Bar]) -> Bar {
    let first = &group[0];
    let last = &group[group.len() - 1];

    let high = group.iter().map(|b| b.high).fold(f64::MIN, f64::max);
    let low = group.iter().map(|b| b.low).fold(f64::MAX, f64::min);

    // Sum volume only when every source bar carries it; a single bar
    // without volume makes the bucket's volume meaningless.
    let volume = group
        .iter()
        .map(|b| b.volume)
        .try_fold(0.0, |acc, v| v.map(|v| acc + v));

    Bar {
        index: ordinal as i64,
        timestamp: first.timestamp,
        open: first.open,
        high,
        low,
        close: last.close,
        volume,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn minute_bars(count: usize) -> Vec<Bar> {
        (0..count)
            .map(|i| {
                let price = (i + 1) as f64;
                Bar {
                    index: i as i64,
                    timestamp: 1_700_000_000.0 + (i as f64) * 60.0,
                    open: price,
                    high: price,
                    low: price,
                    close: price,
                    volume: Some(price),
                }
            })
            .collect()
    }

    #[test]
    fn identity_at_target_one() {
        let bars = minute_bars(5);
        let out = resample_bars(&bars, 1).unwrap();
        assert_eq!(out, bars);
    }

    #[test]
    fn zero_target_is_rejected() {
        assert_eq!(
            resample_bars(&minute_bars(3), 0).unwrap_err(),
            ResampleError::InvalidTarget(0)
        );
        assert_eq!(
            resample_points(&[], 0).unwrap_err(),
            ResampleError::InvalidTarget(0)
        );
    }

    #[test]
    fn five_bars_collapse_into_one_bucket() {
        let out = resample_bars(&minute_bars(5), 5).unwrap();
        assert_eq!(out.len(), 1);
        let bucket = &out[0];
        assert_eq!(bucket.index, 0);
        assert_eq!(bucket.open, 1.0);
        assert_eq!(bucket.close, 5.0);
        assert_eq!(bucket.high, 5.0);
        assert_eq!(bucket.low, 1.0);
        assert_eq!(bucket.volume, Some(15.0));
        assert_eq!(bucket.timestamp, 1_700_000_000.0);
    }

    #[test_case(7, 5, 2 ; "trailing partial bucket is emitted")]
    #[test_case(10, 5, 2 ; "exact multiple")]
    #[test_case(4, 5, 1 ; "single short bucket")]
    fn bucket_counts(source: usize, target: u32, expected: usize) {
        let out = resample_bars(&minute_bars(source), target).unwrap();
        assert_eq!(out.len(), expected);
    }

    #[test]
    fn trailing_bucket_covers_the_remainder() {
        let out = resample_bars(&minute_bars(7), 5).unwrap();
        let tail = &out[1];
        assert_eq!(tail.index, 1);
        assert_eq!(tail.open, 6.0);
        assert_eq!(tail.close, 7.0);
        assert_eq!(tail.volume, Some(13.0));
    }

    #[test]
    fn unsorted_input_is_sorted_by_timestamp() {
        let mut bars = minute_bars(5);
        bars.reverse();
        let out = resample_bars(&bars, 5).unwrap();
        assert_eq!(out[0].open, 1.0);
        assert_eq!(out[0].close, 5.0);
    }

    #[test]
    fn volume_omitted_when_any_source_bar_lacks_it() {
        let mut bars = minute_bars(5);
        bars[2].volume = None;
        let out = resample_bars(&bars, 5).unwrap();
        assert_eq!(out[0].volume, None);
    }

    #[test]
    fn points_keep_first_timestamp_and_latest_values() {
        let points: Vec<IndicatorPoint> = (0..5)
            .map(|i| IndicatorPoint {
                index: i,
                timestamp: 1_700_000_000.0 + (i as f64) * 60.0,
                values: vec![i as f64, (i * 10) as f64],
            })
            .collect();

        let out = resample_points(&points, 5).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].index, 0);
        assert_eq!(out[0].timestamp, 1_700_000_000.0);
        assert_eq!(out[0].values, vec![4.0, 40.0]);
    }
}
