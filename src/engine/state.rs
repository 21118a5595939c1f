//! Per-user daily voting state.
//!
//! The state is never stored; it is derived from the shape of the stored
//! record each time an event arrives.

use crate::store::VoterRecord;
use chrono::NaiveDate;

/// Where a user stands in today's voting cycle.
///
/// The group-A carousel state is not represented here: it is entered
/// transiently from `NewDay` (the record is reset and the carousel is
/// presented in the same step).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoterState {
    /// No vote in progress for today; the next "vote" starts a cycle.
    NewDay,
    /// Group A chosen, group B still open. Preserved across days so a
    /// half-finished cycle can be resumed.
    AwaitingGroupB,
    /// Both groups chosen today; locked until tomorrow.
    CompletedToday,
}

impl VoterState {
    /// Derive the state from a stored record and the current civil date.
    pub fn derive(record: Option<&VoterRecord>, today: NaiveDate) -> Self {
        let Some(record) = record else {
            return VoterState::NewDay;
        };
        if record.last_completed == Some(today) {
            return VoterState::CompletedToday;
        }
        if record.group_a.is_some() && record.group_b.is_none() {
            return VoterState::AwaitingGroupB;
        }
        VoterState::NewDay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 7, d).unwrap()
    }

    fn record(a: Option<&str>, b: Option<&str>, completed: Option<u32>) -> VoterRecord {
        VoterRecord {
            group_a: a.map(str::to_string),
            group_b: b.map(str::to_string),
            last_completed: completed.map(day),
        }
    }

    #[test]
    fn test_no_record_is_new_day() {
        assert_eq!(VoterState::derive(None, day(15)), VoterState::NewDay);
    }

    #[test]
    fn test_empty_record_is_new_day() {
        let r = record(None, None, None);
        assert_eq!(VoterState::derive(Some(&r), day(15)), VoterState::NewDay);
    }

    #[test]
    fn test_completed_today() {
        let r = record(Some("1"), Some("4"), Some(15));
        assert_eq!(
            VoterState::derive(Some(&r), day(15)),
            VoterState::CompletedToday
        );
    }

    #[test]
    fn test_completed_yesterday_is_new_day() {
        let r = record(Some("1"), Some("4"), Some(14));
        assert_eq!(VoterState::derive(Some(&r), day(15)), VoterState::NewDay);
    }

    #[test]
    fn test_mid_cycle_awaits_group_b() {
        let r = record(Some("1"), None, None);
        assert_eq!(
            VoterState::derive(Some(&r), day(15)),
            VoterState::AwaitingGroupB
        );
    }

    #[test]
    fn test_mid_cycle_survives_day_change() {
        // A half-finished cycle from an earlier day resumes at group B.
        let r = record(Some("1"), None, Some(10));
        assert_eq!(
            VoterState::derive(Some(&r), day(15)),
            VoterState::AwaitingGroupB
        );
    }
}
