use chrono::NaiveDate;

use crate::model::*;

use super::EngineError;

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Structural and date-floor check for a requested timeslot. `legacy`
/// skips the date floor only; an inverted time range is always rejected.
pub fn validate_timeslot(slot: &Timeslot, today: NaiveDate, legacy: bool) -> Result<(), EngineError> {
    if slot.start > slot.end {
        return Err(EngineError::InvalidTimeRange {
            start: slot.start,
            end: slot.end,
        });
    }
    if !legacy && slot.date < today {
        return Err(EngineError::InvalidDate(slot.date));
    }
    Ok(())
}

/// Does `candidate` collide with an `existing` timeslot repeating by
/// `recurrence`?
///
/// Only the existing side's recurrence decides date compatibility, so the
/// relation is not symmetric once exactly one side recurs. A recurring
/// existing slot matches candidate dates before its own start as well.
pub fn overlaps(existing: &Timeslot, recurrence: Recurrence, candidate: &Timeslot) -> bool {
    if !recurrence.is_active() {
        if existing.date != candidate.date {
            return false;
        }
    } else if !recurrence.pattern().matches(existing.date, candidate.date) {
        return false;
    }
    existing.times_overlap(candidate)
}

/// [`overlaps`] with `existing` as the recurring side.
pub fn reservations_overlap(existing: &Reservation, candidate: &Reservation) -> bool {
    overlaps(existing.slot(), existing.recurrence(), candidate.slot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Duration, NaiveTime, Weekday};
    use ulid::Ulid;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn slot(date: NaiveDate, start: u32, end: u32) -> Timeslot {
        Timeslot::new(date, time(start, 0), time(end, 0))
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn reservation(date: NaiveDate, start: u32, end: u32, pattern: RecurrencePattern) -> Reservation {
        Reservation::hypothetical(Ulid::new(), slot(date, start, end), 1, Recurrence::from_pattern(pattern))
    }

    const NONE: Recurrence = Recurrence::NONE;

    // ── validate_timeslot ─────────────────────────────────

    #[test]
    fn start_after_end_is_invalid_time_range() {
        let t = today();
        let err = validate_timeslot(&Timeslot::new(t, time(12, 0), time(9, 0)), t, false).unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidTimeRange {
                start: time(12, 0),
                end: time(9, 0)
            }
        );
    }

    #[test]
    fn date_before_today_is_invalid_date() {
        let t = day(2030, 5, 10);
        let yesterday = day(2030, 5, 9);
        let err = validate_timeslot(&slot(yesterday, 9, 12), t, false).unwrap_err();
        assert_eq!(err, EngineError::InvalidDate(yesterday));
    }

    #[test]
    fn legacy_bypasses_date_floor_only() {
        let t = day(2030, 5, 10);
        assert!(validate_timeslot(&slot(day(2020, 1, 1), 9, 12), t, true).is_ok());
        assert!(validate_timeslot(&slot(day(2020, 1, 1), 12, 9), t, true).is_err());
    }

    #[test]
    fn today_and_equal_times_are_valid() {
        let t = day(2030, 5, 10);
        assert!(validate_timeslot(&slot(t, 9, 12), t, false).is_ok());
        assert!(validate_timeslot(&slot(t, 9, 9), t, false).is_ok());
    }

    // ── overlaps ──────────────────────────────────────────

    #[test]
    fn different_days_without_recurrence_never_overlap() {
        let d = day(2030, 1, 7);
        assert!(!overlaps(&slot(d, 9, 12), NONE, &slot(d + Duration::days(1), 9, 12)));
    }

    #[test]
    fn same_day_overlapping_times() {
        let d = day(2030, 1, 7);
        assert!(overlaps(&slot(d, 9, 12), NONE, &slot(d, 11, 13)));
        assert!(!overlaps(&slot(d, 9, 12), NONE, &slot(d, 7, 8)));
    }

    #[test]
    fn touching_boundaries_overlap() {
        let d = day(2030, 1, 7);
        assert!(overlaps(&slot(d, 9, 10), NONE, &slot(d, 10, 11)));
        assert!(overlaps(&slot(d, 10, 11), NONE, &slot(d, 9, 10)));
    }

    #[test]
    fn daily_recurrence_matches_next_day() {
        let x = day(2030, 1, 7);
        let daily = Recurrence::from_pattern(RecurrencePattern::Daily);
        assert!(overlaps(&slot(x, 9, 12), daily, &slot(x + Duration::days(1), 10, 11)));
        assert!(!overlaps(&slot(x, 9, 12), daily, &slot(x + Duration::days(1), 13, 16)));
    }

    #[test]
    fn daily_recurrence_also_matches_earlier_dates() {
        let x = day(2030, 1, 8);
        let daily = Recurrence::from_pattern(RecurrencePattern::Daily);
        assert!(overlaps(&slot(x, 11, 12), daily, &slot(x - Duration::days(1), 11, 12)));
    }

    #[test]
    fn weekly_requires_same_weekday() {
        let monday = day(2030, 1, 7);
        assert_eq!(monday.weekday(), Weekday::Mon);
        let weekly = Recurrence::from_pattern(RecurrencePattern::Weekly);
        assert!(overlaps(&slot(monday, 9, 10), weekly, &slot(monday + Duration::weeks(2), 9, 10)));
        assert!(!overlaps(&slot(monday, 9, 10), weekly, &slot(monday + Duration::days(1), 9, 10)));
    }

    #[test]
    fn weekly_same_weekday_but_disjoint_times() {
        let monday = day(2030, 1, 7);
        let weekly = Recurrence::from_pattern(RecurrencePattern::Weekly);
        assert!(!overlaps(&slot(monday, 9, 12), weekly, &slot(monday + Duration::weeks(1), 13, 16)));
    }

    #[test]
    fn biweekly_checks_week_parity() {
        // Tuesday in ISO week 2 of 2030.
        let tuesday = day(2030, 1, 8);
        let biweekly = Recurrence::from_pattern(RecurrencePattern::Biweekly);
        let existing = slot(tuesday, 11, 12);
        assert!(!overlaps(&existing, biweekly, &slot(tuesday + Duration::weeks(1), 11, 12)));
        assert!(overlaps(&existing, biweekly, &slot(tuesday + Duration::weeks(2), 11, 12)));
        assert!(!overlaps(&existing, biweekly, &slot(tuesday + Duration::weeks(2) + Duration::days(1), 11, 12)));
    }

    #[test]
    fn monthly_requires_same_day_of_month() {
        let fifteenth = day(2030, 3, 15);
        let monthly = Recurrence::from_pattern(RecurrencePattern::Monthly);
        assert!(!overlaps(&slot(fifteenth, 0, 23), monthly, &slot(day(2030, 3, 20), 0, 23)));
        assert!(!overlaps(&slot(fifteenth, 0, 23), monthly, &slot(day(2030, 4, 20), 9, 10)));
        assert!(overlaps(&slot(fifteenth, 9, 10), monthly, &slot(day(2030, 6, 15), 9, 10)));
    }

    #[test]
    fn non_recurring_overlap_is_symmetric() {
        let d = day(2030, 1, 7);
        let pairs = [
            (slot(d, 9, 12), slot(d, 11, 13)),
            (slot(d, 9, 10), slot(d, 10, 11)),
            (slot(d, 9, 10), slot(d, 11, 12)),
            (slot(d, 9, 10), slot(d + Duration::days(1), 9, 10)),
        ];
        for (a, b) in pairs {
            assert_eq!(overlaps(&a, NONE, &b), overlaps(&b, NONE, &a));
        }
    }

    #[test]
    fn overlap_is_asymmetric_when_one_side_recurs() {
        // A weekly series on Tuesday collides with a one-off a week later,
        // but the one-off checked as the existing side ignores the series.
        let tuesday = day(2030, 1, 8);
        let weekly = reservation(tuesday, 9, 10, RecurrencePattern::Weekly);
        let once = reservation(tuesday + Duration::weeks(1), 9, 10, RecurrencePattern::None);
        assert!(reservations_overlap(&weekly, &once));
        assert!(!reservations_overlap(&once, &weekly));
    }
}
