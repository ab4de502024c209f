//! Session grouping
//!
//! Clusters time-sorted stage segments into sleep sessions: a silence longer
//! than the gap threshold between one segment's end and the next segment's
//! start closes the current session.

use crate::types::StageSegment;

/// Maximum silence between segments before a new session starts (2 hours).
/// The boundary is strict: a gap of exactly this many seconds does not split.
pub const SESSION_GAP_SECONDS: i64 = 7200;

/// Groups segments into sessions by the gap threshold.
///
/// Input order does not matter; segments are sorted by start time before
/// grouping. Each returned group is internally time-ordered. Empty input
/// yields no groups; synthesizing empty-day sessions is the caller's job.
pub fn group_into_sessions(segments: &[StageSegment]) -> Vec<Vec<StageSegment>> {
    if segments.is_empty() {
        return Vec::new();
    }

    let mut sorted: Vec<StageSegment> = segments.to_vec();
    sorted.sort_by_key(|s| s.start_time);

    let mut groups: Vec<Vec<StageSegment>> = Vec::new();
    let mut current: Vec<StageSegment> = vec![sorted[0].clone()];

    for segment in sorted.into_iter().skip(1) {
        // current is never empty here
        let previous_end = current[current.len() - 1].end_time;
        let gap = (segment.start_time - previous_end).num_seconds();

        if gap > SESSION_GAP_SECONDS {
            groups.push(std::mem::take(&mut current));
        }
        current.push(segment);
    }

    groups.push(current);
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SleepStage;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(day: u32, h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, h, m, s).unwrap()
    }

    fn seg(start: DateTime<Utc>, end: DateTime<Utc>) -> StageSegment {
        StageSegment::new(SleepStage::Core, start, end)
    }

    #[test]
    fn test_empty_input_yields_no_groups() {
        assert!(group_into_sessions(&[]).is_empty());
    }

    #[test]
    fn test_single_segment_is_its_own_session() {
        let groups = group_into_sessions(&[seg(at(10, 23, 0, 0), at(10, 23, 30, 0))]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 1);
    }

    #[test]
    fn test_exact_two_hour_gap_does_not_split() {
        // Second segment starts exactly 7200s after the first ends
        let groups = group_into_sessions(&[
            seg(at(10, 22, 0, 0), at(10, 23, 0, 0)),
            seg(at(11, 1, 0, 0), at(11, 2, 0, 0)),
        ]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
    }

    #[test]
    fn test_gap_one_second_over_threshold_splits() {
        let groups = group_into_sessions(&[
            seg(at(10, 22, 0, 0), at(10, 23, 0, 0)),
            seg(at(11, 1, 0, 1), at(11, 2, 0, 0)),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 1);
        assert_eq!(groups[1].len(), 1);
    }

    #[test]
    fn test_unsorted_input_is_sorted_before_grouping() {
        let groups = group_into_sessions(&[
            seg(at(11, 8, 0, 0), at(11, 9, 0, 0)),
            seg(at(10, 23, 0, 0), at(11, 0, 30, 0)),
            seg(at(11, 0, 30, 0), at(11, 6, 0, 0)),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[0][0].start_time, at(10, 23, 0, 0));
        assert_eq!(groups[1][0].start_time, at(11, 8, 0, 0));
    }

    #[test]
    fn test_overnight_and_nap_split_into_two_sessions() {
        let groups = group_into_sessions(&[
            seg(at(10, 23, 0, 0), at(11, 6, 30, 0)),
            seg(at(11, 14, 0, 0), at(11, 15, 0, 0)), // afternoon nap
        ]);
        assert_eq!(groups.len(), 2);
    }
}
