use chrono::{Duration, TimeZone, Utc};

use podcast_billing::domain::period::{
    can_request_refund, days_remaining, days_until_refund_expires, period_end, PlanInterval,
};

fn at(y: i32, m: u32, d: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 10, 30, 0).unwrap()
}

#[test]
fn monthly_period_is_one_calendar_month() {
    assert_eq!(period_end(PlanInterval::Month, at(2026, 3, 10)), at(2026, 4, 10));
}

#[test]
fn monthly_period_clamps_day_of_month() {
    // Jan 31 + 1 month is the last day of February, not an invalid date
    assert_eq!(period_end(PlanInterval::Month, at(2026, 1, 31)), at(2026, 2, 28));
    assert_eq!(period_end(PlanInterval::Month, at(2024, 1, 31)), at(2024, 2, 29));
}

#[test]
fn yearly_period_is_one_calendar_year() {
    assert_eq!(period_end(PlanInterval::Year, at(2026, 5, 1)), at(2027, 5, 1));
    // leap day clamps too
    assert_eq!(period_end(PlanInterval::Year, at(2024, 2, 29)), at(2025, 2, 28));
}

#[test]
fn lifetime_period_never_expires_in_practice() {
    assert_eq!(period_end(PlanInterval::Lifetime, at(2026, 1, 1)), at(2126, 1, 1));
}

#[test]
fn period_end_is_always_after_start() {
    for interval in [PlanInterval::Month, PlanInterval::Year, PlanInterval::Lifetime] {
        let start = at(2026, 8, 7);
        assert!(period_end(interval, start) > start);
    }
}

#[test]
fn days_remaining_rounds_up_and_clamps_at_zero() {
    let end = at(2026, 6, 10);
    // 36 hours left counts as 2 days
    assert_eq!(days_remaining(end, end - Duration::hours(36)), 2);
    assert_eq!(days_remaining(end, end - Duration::hours(24)), 1);
    assert_eq!(days_remaining(end, end - Duration::minutes(1)), 1);
    assert_eq!(days_remaining(end, end), 0);
    assert_eq!(days_remaining(end, end + Duration::days(3)), 0);
}

#[test]
fn refund_window_edges() {
    let paid_at = at(2026, 7, 1);
    let window = 7;

    assert!(can_request_refund(paid_at, paid_at + Duration::days(window - 1), window, false));
    assert!(can_request_refund(paid_at, paid_at + Duration::days(window), window, false));
    assert!(!can_request_refund(paid_at, paid_at + Duration::days(window + 1), window, false));
}

#[test]
fn processed_refund_blocks_a_second_one() {
    let paid_at = at(2026, 7, 1);
    assert!(!can_request_refund(paid_at, paid_at + Duration::days(1), 7, true));
}

#[test]
fn refund_expiry_countdown_clamps_at_zero() {
    let paid_at = at(2026, 7, 1);
    assert_eq!(days_until_refund_expires(paid_at, paid_at, 7), 7);
    assert_eq!(
        days_until_refund_expires(paid_at, paid_at + Duration::days(2) + Duration::hours(12), 7),
        5
    );
    assert_eq!(days_until_refund_expires(paid_at, paid_at + Duration::days(30), 7), 0);
}
