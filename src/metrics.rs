//! Summary metrics
//!
//! Time-in-bed and time-asleep totals over an arbitrary visible window of
//! segments, plus the per-stage breakdown used by week/month bars. All
//! functions here are pure.

use crate::types::{ManualEntry, Session, SleepStage, StageDurations, StageSegment, SummaryMetrics};

/// Computes summary metrics for a set of visible segments.
///
/// Time in bed sums `Deep`, `Core`, `Rem`, and `Awake` segments; `InBed` and
/// `AsleepUnspecified` are excluded because they overlap the finer-grained
/// stages and would double-count. Time asleep is time in bed minus awake
/// time. An empty window returns `None` — no data is not a zero duration.
pub fn summary_metrics(segments: &[StageSegment]) -> Option<SummaryMetrics> {
    if segments.is_empty() {
        return None;
    }

    let time_in_bed: i64 = segments
        .iter()
        .filter(|s| counts_toward_time_in_bed(s.stage))
        .map(StageSegment::duration_seconds)
        .sum();

    let awake: i64 = segments
        .iter()
        .filter(|s| s.stage == SleepStage::Awake)
        .map(StageSegment::duration_seconds)
        .sum();

    Some(SummaryMetrics {
        time_in_bed_seconds: time_in_bed,
        time_asleep_seconds: time_in_bed - awake,
    })
}

/// Metrics for a manual entry: no stage breakdown exists, so time in bed and
/// time asleep both collapse to the stored duration.
pub fn manual_summary(entry: &ManualEntry) -> SummaryMetrics {
    SummaryMetrics {
        time_in_bed_seconds: entry.duration_seconds,
        time_asleep_seconds: entry.duration_seconds,
    }
}

/// Metrics for a raw records window: automatic segments when present, the
/// combined manual declarations otherwise, and `None` only when the window
/// holds neither. A manual-only window is data, not absence.
pub fn window_summary(
    segments: &[StageSegment],
    manual_entries: &[ManualEntry],
) -> Option<SummaryMetrics> {
    if let Some(summary) = summary_metrics(segments) {
        return Some(summary);
    }
    if manual_entries.is_empty() {
        return None;
    }
    let total: i64 = manual_entries.iter().map(|e| e.duration_seconds).sum();
    Some(SummaryMetrics {
        time_in_bed_seconds: total,
        time_asleep_seconds: total,
    })
}

/// Metrics for one session: automatic segments when present, the manual
/// entry otherwise, and `None` for a placeholder day.
pub fn session_summary(session: &Session) -> Option<SummaryMetrics> {
    if !session.segments.is_empty() {
        summary_metrics(&session.segments)
    } else {
        session.manual_entry.as_ref().map(manual_summary)
    }
}

/// Per-stage duration totals. `InBed` and `AsleepUnspecified` are ignored,
/// matching the summary-metric stage set.
pub fn stage_durations(segments: &[StageSegment]) -> StageDurations {
    let mut totals = StageDurations::default();
    for segment in segments {
        let duration = segment.duration_seconds();
        match segment.stage {
            SleepStage::Deep => totals.deep_seconds += duration,
            SleepStage::Core => totals.core_seconds += duration,
            SleepStage::Rem => totals.rem_seconds += duration,
            SleepStage::Awake => totals.awake_seconds += duration,
            SleepStage::InBed | SleepStage::AsleepUnspecified => {}
        }
    }
    totals
}

fn counts_toward_time_in_bed(stage: SleepStage) -> bool {
    matches!(
        stage,
        SleepStage::Deep | SleepStage::Core | SleepStage::Rem | SleepStage::Awake
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ManualSource;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, h, m, 0).unwrap()
    }

    fn seg(stage: SleepStage, start: DateTime<Utc>, end: DateTime<Utc>) -> StageSegment {
        StageSegment::new(stage, start, end)
    }

    fn full_night() -> Vec<StageSegment> {
        vec![
            seg(SleepStage::Deep, at(10, 23, 0), at(10, 23, 45)),
            seg(SleepStage::Rem, at(10, 23, 45), at(11, 0, 30)),
            seg(SleepStage::Awake, at(11, 0, 30), at(11, 0, 40)),
            seg(SleepStage::Core, at(11, 0, 40), at(11, 6, 0)),
        ]
    }

    #[test]
    fn test_full_night_metrics() {
        // 45 + 45 + 10 + 320 = 420 min in bed, 10 min awake, 410 min asleep
        let metrics = summary_metrics(&full_night()).unwrap();
        assert_eq!(metrics.time_in_bed_seconds, 420 * 60);
        assert_eq!(metrics.time_asleep_seconds, 410 * 60);
    }

    #[test]
    fn test_in_bed_and_unspecified_stages_excluded() {
        let mut segments = full_night();
        segments.push(seg(SleepStage::InBed, at(10, 22, 30), at(11, 6, 30)));
        segments.push(seg(SleepStage::AsleepUnspecified, at(10, 23, 0), at(11, 6, 0)));

        let metrics = summary_metrics(&segments).unwrap();
        assert_eq!(metrics.time_in_bed_seconds, 420 * 60);
        assert_eq!(metrics.time_asleep_seconds, 410 * 60);
    }

    #[test]
    fn test_empty_window_is_no_data() {
        assert_eq!(summary_metrics(&[]), None);
    }

    #[test]
    fn test_manual_entry_collapses_both_metrics() {
        let entry = ManualEntry::new(at(10, 22, 0), at(11, 6, 0), 28_500, ManualSource::UserInput);
        let metrics = manual_summary(&entry);
        assert_eq!(metrics.time_in_bed_seconds, 28_500);
        assert_eq!(metrics.time_asleep_seconds, 28_500);
    }

    #[test]
    fn test_manual_only_window_reports_durations() {
        let first = ManualEntry::new(at(10, 22, 0), at(11, 6, 0), 28_800, ManualSource::UserInput);
        let nap = ManualEntry::new(at(11, 14, 0), at(11, 15, 0), 3600, ManualSource::UserInput);

        let metrics = window_summary(&[], &[first, nap]).unwrap();
        assert_eq!(metrics.time_in_bed_seconds, 32_400);
        assert_eq!(metrics.time_asleep_seconds, 32_400);

        assert_eq!(window_summary(&[], &[]), None);
    }

    #[test]
    fn test_window_summary_prefers_segments() {
        let entry = ManualEntry::new(at(11, 14, 0), at(11, 15, 0), 3600, ManualSource::UserInput);
        let metrics = window_summary(&full_night(), &[entry]).unwrap();
        assert_eq!(metrics.time_in_bed_seconds, 420 * 60);
    }

    #[test]
    fn test_session_summary_prefers_segments() {
        let entry = ManualEntry::new(at(11, 14, 0), at(11, 15, 0), 3600, ManualSource::UserInput);
        let session = Session {
            assigned_date: NaiveDate::from_ymd_opt(2024, 3, 11).unwrap(),
            segments: full_night(),
            session_start: at(10, 23, 0),
            session_end: at(11, 6, 0),
            manual_entry: Some(entry.clone()),
        };
        assert_eq!(
            session_summary(&session).unwrap().time_in_bed_seconds,
            420 * 60
        );

        let manual_only = Session {
            segments: Vec::new(),
            manual_entry: Some(entry),
            ..session.clone()
        };
        assert_eq!(
            session_summary(&manual_only).unwrap().time_in_bed_seconds,
            3600
        );

        let placeholder = Session {
            segments: Vec::new(),
            manual_entry: None,
            ..session
        };
        assert_eq!(session_summary(&placeholder), None);
    }

    #[test]
    fn test_stage_durations_breakdown() {
        let totals = stage_durations(&full_night());
        assert_eq!(totals.deep_seconds, 45 * 60);
        assert_eq!(totals.rem_seconds, 45 * 60);
        assert_eq!(totals.awake_seconds, 10 * 60);
        assert_eq!(totals.core_seconds, 320 * 60);
        assert_eq!(totals.total_seconds(), 420 * 60);
    }
}
