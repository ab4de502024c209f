//! Core types for the Nocturne engine
//!
//! This module defines the data structures that flow through the engine:
//! raw stage segments, manual entries, reconciled per-day sessions, and the
//! pre-aggregated period rows consumed by the rollup validator.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sleep stage classification for one contiguous interval.
///
/// `InBed` and `AsleepUnspecified` are coarse/legacy classifications that can
/// coexist with the finer-grained stages in the same night; the metrics
/// calculator excludes them to avoid double counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SleepStage {
    InBed,
    AsleepUnspecified,
    Awake,
    Rem,
    Core,
    Deep,
}

impl SleepStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SleepStage::InBed => "in_bed",
            SleepStage::AsleepUnspecified => "asleep_unspecified",
            SleepStage::Awake => "awake",
            SleepStage::Rem => "rem",
            SleepStage::Core => "core",
            SleepStage::Deep => "deep",
        }
    }
}

/// One contiguous interval of a single sleep stage.
///
/// Identity is the full `(stage, start_time, end_time)` tuple; the timeline
/// pager relies on this when deduplicating re-fetched ranges.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StageSegment {
    pub stage: SleepStage,
    /// Segment start (UTC); `end_time > start_time` always holds
    pub start_time: DateTime<Utc>,
    /// Segment end (UTC)
    pub end_time: DateTime<Utc>,
}

impl StageSegment {
    pub fn new(stage: SleepStage, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            stage,
            start_time,
            end_time,
        }
    }

    /// Segment duration in whole seconds
    pub fn duration_seconds(&self) -> i64 {
        (self.end_time - self.start_time).num_seconds()
    }
}

/// Origin of a manual sleep entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualSource {
    /// Entered directly by the user
    UserInput,
    /// Derived automatically when the user saved a related input
    AutoCalculated,
}

/// A user-declared sleep interval without stage breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualEntry {
    /// Stable identity of the entry event (dedup key for paging)
    pub event_id: Uuid,
    pub bedtime: DateTime<Utc>,
    pub waketime: DateTime<Utc>,
    /// Stored independently of `waketime - bedtime`; the two may diverge
    /// slightly due to rounding and both are retained for display.
    pub duration_seconds: i64,
    pub source: ManualSource,
}

impl ManualEntry {
    pub fn new(
        bedtime: DateTime<Utc>,
        waketime: DateTime<Utc>,
        duration_seconds: i64,
        source: ManualSource,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            bedtime,
            waketime,
            duration_seconds,
            source,
        }
    }
}

/// The reconciled sleep record attributed to one calendar day.
///
/// Sessions are always rebuilt from the full segment set for the loaded
/// range, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// The wake-up date this session is attributed to (local calendar day)
    pub assigned_date: NaiveDate,
    /// Automatic stage segments, time-ordered; empty for manual-only or
    /// placeholder sessions
    pub segments: Vec<StageSegment>,
    /// First segment start, manual bedtime, or placeholder window start
    pub session_start: DateTime<Utc>,
    /// Last segment end, manual waketime, or placeholder window end
    pub session_end: DateTime<Utc>,
    /// Present when a manual entry survives reconciliation for this date
    pub manual_entry: Option<ManualEntry>,
}

impl Session {
    /// True when the session is backed only by a manual entry
    pub fn is_manual(&self) -> bool {
        self.segments.is_empty() && self.manual_entry.is_some()
    }

    /// True when the session carries any data at all; a placeholder built for
    /// an empty day returns false
    pub fn has_data(&self) -> bool {
        !self.segments.is_empty() || self.manual_entry.is_some()
    }
}

/// Time-in-bed / time-asleep totals for a visible window.
///
/// Absence of data is represented by `Option::None` at the call sites, never
/// by a zeroed value: zero and "no data" are distinct states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub time_in_bed_seconds: i64,
    pub time_asleep_seconds: i64,
}

/// Per-stage duration totals for week/month bar rendering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDurations {
    pub deep_seconds: i64,
    pub core_seconds: i64,
    pub rem_seconds: i64,
    pub awake_seconds: i64,
}

impl StageDurations {
    pub fn total_seconds(&self) -> i64 {
        self.deep_seconds + self.core_seconds + self.rem_seconds + self.awake_seconds
    }
}

/// Metric identifier in the pre-aggregation cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SleepMetric {
    Bedtime,
    Waketime,
    TimeInBed,
    TimeAsleep,
}

impl SleepMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            SleepMetric::Bedtime => "bedtime",
            SleepMetric::Waketime => "waketime",
            SleepMetric::TimeInBed => "time_in_bed",
            SleepMetric::TimeAsleep => "time_asleep",
        }
    }
}

/// Aggregation period granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    Daily,
    Weekly,
    Monthly,
}

/// How the cache computed a period value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalculationType {
    Sum,
    Avg,
}

/// One row consumed from the pre-aggregation cache.
///
/// Duration metrics carry a numeric `value` (minutes); bedtime/waketime are
/// time-of-day quantities and carry a `value_time` wall-clock string
/// (`"HH:MM"` or `"HH:MM:SS"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPeriod {
    pub metric: SleepMetric,
    pub period_type: PeriodType,
    pub calculation: CalculationType,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub value: Option<f64>,
    pub value_time: Option<String>,
}

/// A validated weekly or monthly average emitted by the rollup validator.
///
/// Only the time-of-day component of the averages is meaningful; use
/// [`crate::bucket::reference_instant`] to place them on the canonical
/// plotting axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodAverage {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub avg_bedtime: NaiveTime,
    pub avg_waketime: NaiveTime,
}

/// Half-open fetch window `[start, end)` passed to the store collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}
