//! Day assignment, reconciliation, and gap filling
//!
//! Turns grouped stage segments and manual entries into exactly one
//! [`Session`] per calendar day over a closed date range. Sessions are keyed
//! by their wake-up date so a night spanning midnight is counted once. Days
//! with no data receive a placeholder session, and days where a manual entry
//! overlaps automatic data keep the automatic data only.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::grouper::group_into_sessions;
use crate::types::{ManualEntry, Session, StageSegment};

/// Placeholder window for empty days: previous-day 20:00 to same-day 08:00 local
const PLACEHOLDER_START_HOUR: u32 = 20;
const PLACEHOLDER_END_HOUR: u32 = 8;

/// Converts a storage instant to the local calendar day it falls on.
///
/// This is the only place the engine crosses from UTC instants to local
/// calendar days; all day keying goes through it (directly or via
/// [`sleep_day`]).
pub fn local_day(instant: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    instant.with_timezone(&offset).date_naive()
}

/// The calendar day a sleep event's wake-up instant is attributed to.
///
/// Morning and afternoon wake-ups map to their own local day; wake-ups at
/// 18:00 or later roll forward to the following day, matching the 6 PM
/// day boundary used across the engine. This keeps an evening nap and the
/// overnight sleep that follows it on the same calendar day, and counts a
/// midnight-spanning night exactly once.
pub fn sleep_day(
    wake_instant: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<NaiveDate, EngineError> {
    let day = local_day(wake_instant, offset);
    if wake_instant.with_timezone(&offset).time().hour() >= crate::bucket::AXIS_ORIGIN_HOUR {
        day.succ_opt()
            .ok_or_else(|| EngineError::DateArithmetic(format!("no day after {day}")))
    } else {
        Ok(day)
    }
}

/// Symmetric interval overlap test over half-open ranges.
///
/// True when either range's start falls strictly inside the other, or one
/// range fully contains the other. Ranges that merely touch at an endpoint
/// do not overlap.
pub fn ranges_overlap(
    start1: DateTime<Utc>,
    end1: DateTime<Utc>,
    start2: DateTime<Utc>,
    end2: DateTime<Utc>,
) -> bool {
    (start1 >= start2 && start1 < end2)
        || (start2 >= start1 && start2 < end1)
        || (start1 <= start2 && end1 >= end2)
        || (start2 <= start1 && end2 >= end1)
}

/// Builds one session per day over the closed range `[start_date, end_date]`,
/// newest first (the order the backward-scrolling timeline consumes).
///
/// Output length is always `end_date - start_date + 1`: days without data get
/// a placeholder session with empty segments and a default overnight window.
pub fn build_day_sessions(
    segments: &[StageSegment],
    manual_entries: &[ManualEntry],
    start_date: NaiveDate,
    end_date: NaiveDate,
    offset: FixedOffset,
) -> Result<Vec<Session>, EngineError> {
    if start_date > end_date {
        return Err(EngineError::InvalidRange(format!(
            "start date {start_date} is after end date {end_date}"
        )));
    }

    // Cluster segments into sessions, then key every session by the sleep
    // day of its last segment's end. Multiple sessions waking on the same
    // day (overnight sleep plus a tracked nap) merge into one segment list.
    let mut date_to_segments: HashMap<NaiveDate, Vec<StageSegment>> = HashMap::new();
    for group in group_into_sessions(segments) {
        let Some(last) = group.last() else { continue };
        let wake_date = sleep_day(last.end_time, offset)?;
        date_to_segments.entry(wake_date).or_default().extend(group);
    }

    // Manual entries keyed the same way; a later entry replaces an earlier
    // one for the same date.
    let mut date_to_manual: HashMap<NaiveDate, ManualEntry> = HashMap::new();
    for entry in manual_entries {
        let wake_date = sleep_day(entry.waketime, offset)?;
        date_to_manual.insert(wake_date, entry.clone());
    }

    let mut sessions = Vec::new();
    let mut current = end_date;

    loop {
        sessions.push(build_session_for_day(
            current,
            date_to_segments.remove(&current),
            date_to_manual.remove(&current),
            offset,
        )?);

        if current == start_date {
            break;
        }
        current = current
            .pred_opt()
            .ok_or_else(|| EngineError::DateArithmetic(format!("no day before {current}")))?;
    }

    Ok(sessions)
}

fn build_session_for_day(
    date: NaiveDate,
    segments: Option<Vec<StageSegment>>,
    manual: Option<ManualEntry>,
    offset: FixedOffset,
) -> Result<Session, EngineError> {
    match (segments, manual) {
        (Some(mut segments), manual) => {
            segments.sort_by_key(|s| s.start_time);
            // group_into_sessions never emits empty groups
            let auto_start = segments[0].start_time;
            let auto_end = segments[segments.len() - 1].end_time;

            let manual_entry = match manual {
                Some(entry) => {
                    if ranges_overlap(entry.bedtime, entry.waketime, auto_start, auto_end) {
                        // Both describe the same physical night; automatic
                        // tracking is authoritative.
                        warn!(
                            date = %date,
                            manual_bedtime = %entry.bedtime,
                            "manual entry overlaps automatic data, keeping automatic only"
                        );
                        None
                    } else {
                        debug!(date = %date, "combining automatic segments and manual entry");
                        Some(entry)
                    }
                }
                None => None,
            };

            Ok(Session {
                assigned_date: date,
                segments,
                session_start: auto_start,
                session_end: auto_end,
                manual_entry,
            })
        }
        (None, Some(entry)) => Ok(Session {
            assigned_date: date,
            segments: Vec::new(),
            session_start: entry.bedtime,
            session_end: entry.waketime,
            manual_entry: Some(entry),
        }),
        (None, None) => {
            let (start, end) = placeholder_window(date, offset)?;
            Ok(Session {
                assigned_date: date,
                segments: Vec::new(),
                session_start: start,
                session_end: end,
                manual_entry: None,
            })
        }
    }
}

/// Default overnight window for a day with no data, so consumers can render
/// a "no data" state without special-casing.
fn placeholder_window(
    date: NaiveDate,
    offset: FixedOffset,
) -> Result<(DateTime<Utc>, DateTime<Utc>), EngineError> {
    let previous = date
        .pred_opt()
        .ok_or_else(|| EngineError::DateArithmetic(format!("no day before {date}")))?;
    let start_local = previous.and_time(
        NaiveTime::from_hms_opt(PLACEHOLDER_START_HOUR, 0, 0)
            .ok_or_else(|| EngineError::DateArithmetic("invalid placeholder start".into()))?,
    );
    let end_local = date.and_time(
        NaiveTime::from_hms_opt(PLACEHOLDER_END_HOUR, 0, 0)
            .ok_or_else(|| EngineError::DateArithmetic("invalid placeholder end".into()))?,
    );

    let start = offset
        .from_local_datetime(&start_local)
        .single()
        .ok_or_else(|| EngineError::DateArithmetic(format!("ambiguous local time {start_local}")))?
        .with_timezone(&Utc);
    let end = offset
        .from_local_datetime(&end_local)
        .single()
        .ok_or_else(|| EngineError::DateArithmetic(format!("ambiguous local time {end_local}")))?
        .with_timezone(&Utc);

    Ok((start, end))
}
