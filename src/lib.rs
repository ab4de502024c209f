//! Nocturne - Session segmentation and aggregation engine for sleep timelines
//!
//! Nocturne turns raw wearable sleep records into per-day sessions through a
//! deterministic pipeline: gap-threshold grouping → manual/automatic
//! reconciliation → day assignment and gap filling. Around the core sit a
//! paging timeline that accumulates fetches without duplicating data, a
//! strict validator for pre-aggregated weekly/monthly rows, and the six-PM
//! reference axis used to plot bedtimes across midnight.
//!
//! ## Modules
//!
//! - **Timeline**: Paged, deduplicated segment history with one session per day
//! - **Rollup**: Weekly/monthly bedtime/waketime averages from cached rows

pub mod bucket;
pub mod error;
pub mod grouper;
pub mod metrics;
pub mod rollup;
pub mod sessions;
pub mod store;
pub mod timeline;
pub mod types;

pub use error::EngineError;
pub use grouper::{group_into_sessions, SESSION_GAP_SECONDS};
pub use metrics::{session_summary, stage_durations, summary_metrics, window_summary};
pub use rollup::{load_period_averages, validate_period_averages};
pub use sessions::{build_day_sessions, sleep_day};
pub use store::{AggregateCache, SegmentStore};
pub use timeline::{LoadOutcome, TimelinePager, TimelineSnapshot};
pub use types::{
    ManualEntry, ManualSource, PeriodAverage, Session, SleepMetric, SleepStage, StageSegment,
    SummaryMetrics, TimeRange,
};

/// Engine version reported in diagnostics output
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for diagnostics output
pub const PRODUCER_NAME: &str = "nocturne";
