//! Six-PM reference axis
//!
//! Sleep usually spans midnight, so a naive hour-of-day chart axis breaks at
//! 00:00. This module maps every wall-clock time to "minutes since 18:00", a
//! continuous scale from 0 (6 PM) to 1439 (5:59 PM the next day), and anchors
//! it to a fixed reference instant so chart positions reduce to plain date
//! arithmetic.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Timelike, Utc};

use crate::error::EngineError;

/// Hour of day where the axis starts; also the boundary past which a wake-up
/// is attributed to the following calendar day.
pub const AXIS_ORIGIN_HOUR: u32 = 18;

/// Half-width of the consistency band around a mean bucketed offset.
pub const CONSISTENCY_BAND_MINUTES: f64 = 30.0;

/// Minutes elapsed since the most recent 18:00.
///
/// `offset_from_six_pm(18:00) == 0`, `offset_from_six_pm(17:59) == 1439`;
/// times earlier than 18:00 wrap past midnight onto the tail of the scale.
/// Seconds are truncated.
pub fn offset_from_six_pm(time: NaiveTime) -> i64 {
    let hour = i64::from(time.hour());
    let minute = i64::from(time.minute());
    let origin = i64::from(AXIS_ORIGIN_HOUR);

    if hour >= origin {
        (hour - origin) * 60 + minute
    } else {
        (24 - origin + hour) * 60 + minute
    }
}

/// Places a wall-clock time on the reference axis: 2000-01-01 18:00 UTC plus
/// the bucketed offset. Two instants on the axis compare the way their
/// positions on a bedtime/waketime chart should.
pub fn reference_instant(time: NaiveTime) -> Result<DateTime<Utc>, EngineError> {
    let origin = Utc
        .with_ymd_and_hms(2000, 1, 1, AXIS_ORIGIN_HOUR, 0, 0)
        .single()
        .ok_or_else(|| EngineError::DateArithmetic("invalid reference origin".into()))?;
    Ok(origin + Duration::minutes(offset_from_six_pm(time)))
}

/// A ±30-minute band around the mean of a set of bucketed offsets, in the
/// same offset-from-18:00 coordinate space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsistencyBand {
    /// Mean bucketed offset in minutes
    pub mean_offset_minutes: f64,
    pub lower_minutes: f64,
    pub upper_minutes: f64,
}

/// Computes the consistency band over the times in a visible window.
///
/// Returns `None` for an empty window; a band around nothing is not a band
/// at zero.
pub fn consistency_band(times: &[NaiveTime]) -> Option<ConsistencyBand> {
    if times.is_empty() {
        return None;
    }

    let total: i64 = times.iter().map(|t| offset_from_six_pm(*t)).sum();
    let mean = total as f64 / times.len() as f64;

    Some(ConsistencyBand {
        mean_offset_minutes: mean,
        lower_minutes: mean - CONSISTENCY_BAND_MINUTES,
        upper_minutes: mean + CONSISTENCY_BAND_MINUTES,
    })
}
