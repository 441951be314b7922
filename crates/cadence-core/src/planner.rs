//! Admission planner
//!
//! Decides at creation time whether a candidate campaign's planned window
//! overlaps any of the owner's existing windows, and proposes the earliest
//! conflict-free start when it does.

use cadence_storage::models::PolicyConfig;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use uuid::Uuid;

use crate::pacing;

/// Windows closer than this are considered overlapping
const CONFLICT_BUFFER_MINS: i64 = 60;

/// Extra gap added when proposing a replacement start
const SUGGESTION_GAP_MINS: i64 = 5;

/// Planned occupancy of an existing campaign
#[derive(Debug, Clone)]
pub struct CampaignWindow {
    pub id: Uuid,
    pub name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Admission decision for a candidate campaign
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Clear,
    Conflict {
        campaign_id: Uuid,
        campaign_name: String,
        suggested_start: DateTime<Utc>,
    },
}

/// Estimated `[start, end]` window of a campaign: the end is the last
/// planned send instant (the start itself for an empty campaign).
pub fn campaign_window(
    config: &PolicyConfig,
    start: DateTime<Utc>,
    count: usize,
    tz: Tz,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let planned = pacing::plan_schedule(config, start, count, tz);
    let end = planned.last().copied().unwrap_or(start);
    (start, end)
}

/// Check the candidate window against the owner's existing windows.
///
/// A conflict exists when `candidate.end > existing.start - BUFFER` and
/// `candidate.start < existing.end + BUFFER`. The first conflicting window
/// is reported together with a replacement start just past it.
pub fn check_conflicts(
    candidate: (DateTime<Utc>, DateTime<Utc>),
    existing: &[CampaignWindow],
) -> Admission {
    let (start, end) = candidate;
    let buffer = Duration::minutes(CONFLICT_BUFFER_MINS);

    for window in existing {
        if end > window.start - buffer && start < window.end + buffer {
            return Admission::Conflict {
                campaign_id: window.id,
                campaign_name: window.name.clone(),
                suggested_start: window.end + buffer + Duration::minutes(SUGGESTION_GAP_MINS),
            };
        }
    }

    Admission::Clear
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::UTC;

    fn at(h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, h, mi, 0).unwrap()
    }

    fn existing(start: DateTime<Utc>, end: DateTime<Utc>) -> CampaignWindow {
        CampaignWindow {
            id: Uuid::new_v4(),
            name: "morning batch".to_string(),
            start,
            end,
        }
    }

    #[test]
    fn overlap_reports_conflict_and_suggestion() {
        let windows = vec![existing(at(10, 0), at(11, 0))];
        // Candidate occupies 10:30-10:50.
        let admission = check_conflicts((at(10, 30), at(10, 50)), &windows);
        match admission {
            Admission::Conflict {
                campaign_name,
                suggested_start,
                ..
            } => {
                assert_eq!(campaign_name, "morning batch");
                // 11:00 + 60 min buffer + 5 min gap.
                assert_eq!(suggested_start, at(12, 5));
            }
            Admission::Clear => panic!("expected a conflict"),
        }
    }

    #[test]
    fn buffer_extends_the_window() {
        let windows = vec![existing(at(10, 0), at(11, 0))];
        // Ends 30 min before the existing start: still inside the buffer.
        let admission = check_conflicts((at(9, 0), at(9, 30)), &windows);
        assert!(matches!(admission, Admission::Conflict { .. }));
    }

    #[test]
    fn exact_buffer_boundary_is_clear() {
        let windows = vec![existing(at(10, 0), at(11, 0))];
        // Ends exactly at start - buffer: the comparison is strict.
        let admission = check_conflicts((at(8, 0), at(9, 0)), &windows);
        assert_eq!(admission, Admission::Clear);
    }

    #[test]
    fn disjoint_windows_are_clear() {
        let windows = vec![existing(at(10, 0), at(11, 0))];
        let admission = check_conflicts((at(13, 0), at(13, 20)), &windows);
        assert_eq!(admission, Admission::Clear);
    }

    #[test]
    fn window_of_empty_campaign_is_its_start() {
        let config = PolicyConfig::default();
        let start = at(10, 0);
        let (s, e) = campaign_window(&config, start, 0, UTC);
        assert_eq!(s, start);
        assert_eq!(e, start);
    }

    #[test]
    fn window_end_is_last_planned_instant() {
        let config = PolicyConfig {
            min_interval: 60,
            max_interval: 60,
            ..Default::default()
        };
        let start = at(10, 0);
        let (_, end) = campaign_window(&config, start, 21, UTC);
        assert_eq!(end, at(10, 20));
    }
}
