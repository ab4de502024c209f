//! Timeline paging
//!
//! Owns the accumulated segment timeline for an infinite-scroll sleep view:
//! two date cursors bracket everything fetched so far, `load_earlier` and
//! `load_later` extend the window in whole-day steps, and every merge is
//! followed by a full session rebuild over the loaded range. Consumers get
//! read-only snapshots; the pager is the only writer.

use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::sessions::build_day_sessions;
use crate::store::SegmentStore;
use crate::types::{ManualEntry, Session, StageSegment, TimeRange};

/// Days fetched per paging step
pub const DEFAULT_BUFFER_DAYS: u64 = 7;

/// Result of one paging call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The window grew; carries the number of newly merged segments (which
    /// can be zero for a loaded-but-empty range).
    Loaded(usize),
    /// A load in the same direction was already in flight; this call was
    /// dropped, not queued. The caller re-requests on the next scroll event.
    Skipped,
    /// `load_later` had nothing to do: the window already reaches today.
    AtPresent,
}

/// Accumulated timeline state plus paging cursors.
///
/// All fetched segments and manual entries are retained and deduplicated;
/// the session list is always rebuilt from the full set, never patched.
#[derive(Debug, Clone)]
pub struct TimelinePager {
    offset: FixedOffset,
    /// Upper bound for `load_later`, captured at construction so paging is
    /// deterministic for the pager's lifetime
    today: NaiveDate,
    buffer_days: u64,
    loaded_start: Option<NaiveDate>,
    loaded_end: Option<NaiveDate>,
    segments: Vec<StageSegment>,
    manual_entries: Vec<ManualEntry>,
    sessions: Vec<Session>,
    loading_older: bool,
    loading_newer: bool,
}

/// Read-only view of the timeline after a rebuild.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineSnapshot {
    pub loaded_start: Option<NaiveDate>,
    pub loaded_end: Option<NaiveDate>,
    /// One session per loaded day, newest first
    pub sessions: Vec<Session>,
}

/// Serialized pager state. Sessions are derived data and are rebuilt on
/// restore rather than persisted.
#[derive(Debug, Serialize, Deserialize)]
struct TimelineState {
    offset_seconds: i32,
    today: NaiveDate,
    buffer_days: u64,
    loaded_start: Option<NaiveDate>,
    loaded_end: Option<NaiveDate>,
    segments: Vec<StageSegment>,
    manual_entries: Vec<ManualEntry>,
}

/// Holds a direction's in-flight flag for the duration of one load future.
///
/// The flag is cleared in `Drop`: on success, on fetch error, and when the
/// future is abandoned mid-fetch (the owning view torn down while awaiting
/// the store).
struct InFlightGuard<'a> {
    pager: &'a mut TimelinePager,
    newer: bool,
}

impl<'a> InFlightGuard<'a> {
    fn older(pager: &'a mut TimelinePager) -> Self {
        pager.loading_older = true;
        Self { pager, newer: false }
    }

    fn newer(pager: &'a mut TimelinePager) -> Self {
        pager.loading_newer = true;
        Self { pager, newer: true }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.newer {
            self.pager.loading_newer = false;
        } else {
            self.pager.loading_older = false;
        }
    }
}

impl TimelinePager {
    pub fn new(offset: FixedOffset, today: NaiveDate) -> Self {
        Self::with_buffer_days(offset, today, DEFAULT_BUFFER_DAYS)
    }

    pub fn with_buffer_days(offset: FixedOffset, today: NaiveDate, buffer_days: u64) -> Self {
        Self {
            offset,
            today,
            buffer_days: buffer_days.max(1),
            loaded_start: None,
            loaded_end: None,
            segments: Vec::new(),
            manual_entries: Vec::new(),
            sessions: Vec::new(),
            loading_older: false,
            loading_newer: false,
        }
    }

    /// One session per loaded day, newest first. Empty before the initial
    /// load.
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn loaded_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.loaded_start.zip(self.loaded_end)
    }

    pub fn snapshot(&self) -> TimelineSnapshot {
        TimelineSnapshot {
            loaded_start: self.loaded_start,
            loaded_end: self.loaded_end,
            sessions: self.sessions.clone(),
        }
    }

    /// Fetches the most recent buffer window ending today and builds the
    /// initial session list. Skipped when a window is already loaded.
    pub async fn load_initial(
        &mut self,
        store: &dyn SegmentStore,
    ) -> Result<LoadOutcome, EngineError> {
        if self.loaded_start.is_some() {
            return Ok(LoadOutcome::Skipped);
        }

        let start = self.days_back(self.today, self.buffer_days - 1)?;
        let outcome = self.merge_days(store, start, self.today).await?;
        info!(start = %start, end = %self.today, "initial timeline load");
        Ok(outcome)
    }

    /// Extends the window backward by one buffer step.
    ///
    /// At most one earlier-load is in flight at a time; an overlapping call
    /// is dropped. On fetch failure the timeline is left unmodified and the
    /// guard is cleared so the caller can retry.
    pub async fn load_earlier(
        &mut self,
        store: &dyn SegmentStore,
    ) -> Result<LoadOutcome, EngineError> {
        if self.loading_older {
            debug!("earlier-load already in flight, dropping request");
            return Ok(LoadOutcome::Skipped);
        }
        let Some(loaded_start) = self.loaded_start else {
            return self.load_initial(store).await;
        };

        let new_end = loaded_start
            .pred_opt()
            .ok_or_else(|| EngineError::DateArithmetic(format!("no day before {loaded_start}")))?;
        let new_start = self.days_back(loaded_start, self.buffer_days)?;

        let mut guard = InFlightGuard::older(self);
        guard.pager.merge_days(store, new_start, new_end).await
    }

    /// Extends the window forward by one buffer step, never past today.
    pub async fn load_later(
        &mut self,
        store: &dyn SegmentStore,
    ) -> Result<LoadOutcome, EngineError> {
        if self.loading_newer {
            debug!("later-load already in flight, dropping request");
            return Ok(LoadOutcome::Skipped);
        }
        let Some(loaded_end) = self.loaded_end else {
            return self.load_initial(store).await;
        };
        if loaded_end >= self.today {
            return Ok(LoadOutcome::AtPresent);
        }

        let new_start = loaded_end
            .succ_opt()
            .ok_or_else(|| EngineError::DateArithmetic(format!("no day after {loaded_end}")))?;
        let new_end = loaded_end
            .checked_add_days(Days::new(self.buffer_days))
            .ok_or_else(|| EngineError::DateArithmetic(format!("no day after {loaded_end}")))?
            .min(self.today);

        let mut guard = InFlightGuard::newer(self);
        guard.pager.merge_days(store, new_start, new_end).await
    }

    /// Serializes cursors and raw records; derived sessions are not included.
    pub fn to_json(&self) -> Result<String, EngineError> {
        let state = TimelineState {
            offset_seconds: self.offset.local_minus_utc(),
            today: self.today,
            buffer_days: self.buffer_days,
            loaded_start: self.loaded_start,
            loaded_end: self.loaded_end,
            segments: self.segments.clone(),
            manual_entries: self.manual_entries.clone(),
        };
        Ok(serde_json::to_string(&state)?)
    }

    /// Restores a pager from [`to_json`](Self::to_json) output and rebuilds
    /// the session list.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let state: TimelineState = serde_json::from_str(json)?;
        let offset = FixedOffset::east_opt(state.offset_seconds).ok_or_else(|| {
            EngineError::InvalidRange(format!("offset {} out of range", state.offset_seconds))
        })?;

        let mut pager = Self::with_buffer_days(offset, state.today, state.buffer_days);
        pager.loaded_start = state.loaded_start;
        pager.loaded_end = state.loaded_end;
        pager.segments = state.segments;
        pager.manual_entries = state.manual_entries;
        pager.rebuild_sessions()?;
        Ok(pager)
    }

    /// Fetches `[start_day, end_day]`, merges with dedup, widens the cursors,
    /// and rebuilds sessions. On fetch failure nothing is modified.
    async fn merge_days(
        &mut self,
        store: &dyn SegmentStore,
        start_day: NaiveDate,
        end_day: NaiveDate,
    ) -> Result<LoadOutcome, EngineError> {
        let range = self.day_span(start_day, end_day)?;
        let fetched_segments = store.fetch_stage_segments(range).await?;
        let fetched_manual = store.fetch_manual_entries(range).await?;

        let before = self.segments.len();
        self.segments.extend(fetched_segments);
        self.segments
            .sort_by_key(|s| (s.start_time, s.end_time, s.stage as u8));
        self.segments.dedup();
        let merged = self.segments.len() - before;

        for entry in fetched_manual {
            if self.manual_entries.iter().any(|e| e.event_id == entry.event_id) {
                continue;
            }
            self.manual_entries.push(entry);
        }
        self.manual_entries.sort_by_key(|e| e.waketime);

        self.loaded_start = Some(match self.loaded_start {
            Some(current) => current.min(start_day),
            None => start_day,
        });
        self.loaded_end = Some(match self.loaded_end {
            Some(current) => current.max(end_day),
            None => end_day,
        });
        self.rebuild_sessions()?;

        debug!(
            start = %start_day,
            end = %end_day,
            merged_segments = merged,
            total_segments = self.segments.len(),
            "merged paging window"
        );
        Ok(LoadOutcome::Loaded(merged))
    }

    fn rebuild_sessions(&mut self) -> Result<(), EngineError> {
        self.sessions = match self.loaded_range() {
            Some((start, end)) => build_day_sessions(
                &self.segments,
                &self.manual_entries,
                start,
                end,
                self.offset,
            )?,
            None => Vec::new(),
        };
        Ok(())
    }

    /// UTC fetch window covering the local days `[start_day, end_day]`.
    fn day_span(&self, start_day: NaiveDate, end_day: NaiveDate) -> Result<TimeRange, EngineError> {
        let after_end = end_day
            .succ_opt()
            .ok_or_else(|| EngineError::DateArithmetic(format!("no day after {end_day}")))?;
        Ok(TimeRange::new(
            self.local_midnight(start_day)?,
            self.local_midnight(after_end)?,
        ))
    }

    fn local_midnight(&self, day: NaiveDate) -> Result<DateTime<Utc>, EngineError> {
        let midnight = NaiveTime::from_hms_opt(0, 0, 0)
            .ok_or_else(|| EngineError::DateArithmetic("invalid midnight".into()))?;
        self.offset
            .from_local_datetime(&day.and_time(midnight))
            .single()
            .map(|local| local.with_timezone(&Utc))
            .ok_or_else(|| {
                warn!(day = %day, "could not resolve local midnight");
                EngineError::DateArithmetic(format!("ambiguous midnight on {day}"))
            })
    }

    fn days_back(&self, from: NaiveDate, days: u64) -> Result<NaiveDate, EngineError> {
        from.checked_sub_days(Days::new(days))
            .ok_or_else(|| EngineError::DateArithmetic(format!("no day {days} days before {from}")))
    }
}
