//! External data contracts
//!
//! The engine never talks to a database or network itself; it consumes two
//! abstract async collaborators. `SegmentStore` returns raw stage intervals
//! and manual declarations for a queried time range, and `AggregateCache`
//! returns pre-computed period rows. The engine only reads from both.

use async_trait::async_trait;

use crate::error::EngineError;
use crate::types::{
    AggregatedPeriod, CalculationType, ManualEntry, PeriodType, SleepMetric, StageSegment,
    TimeRange,
};

/// Source of raw sleep records for a time range.
#[async_trait]
pub trait SegmentStore: Send + Sync {
    /// Raw automatic stage intervals overlapping `range`.
    async fn fetch_stage_segments(
        &self,
        range: TimeRange,
    ) -> Result<Vec<StageSegment>, EngineError>;

    /// Manual sleep declarations overlapping `range`.
    async fn fetch_manual_entries(
        &self,
        range: TimeRange,
    ) -> Result<Vec<ManualEntry>, EngineError>;
}

/// Source of pre-computed period aggregates.
///
/// The engine never computes period-level statistics itself; it validates and
/// reshapes what this collaborator returns.
#[async_trait]
pub trait AggregateCache: Send + Sync {
    async fn fetch_aggregated_periods(
        &self,
        metrics: &[SleepMetric],
        period_type: PeriodType,
        calculation: CalculationType,
        range: TimeRange,
    ) -> Result<Vec<AggregatedPeriod>, EngineError>;
}
