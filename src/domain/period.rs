// src/domain/period.rs
//
// Billing period arithmetic. Everything here is derived from the plan
// interval and the stored timestamps; nothing is persisted.

use chrono::{DateTime, Duration, Months, Utc};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanInterval {
    Month,
    Year,
    Lifetime,
}

impl PlanInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanInterval::Month => "month",
            PlanInterval::Year => "year",
            PlanInterval::Lifetime => "lifetime",
        }
    }
}

impl FromStr for PlanInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "month" => Ok(PlanInterval::Month),
            "year" => Ok(PlanInterval::Year),
            "lifetime" => Ok(PlanInterval::Lifetime),
            other => Err(format!("unknown plan interval '{other}'")),
        }
    }
}

impl fmt::Display for PlanInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// End of the period starting at `start`. Calendar months clamp the
/// day-of-month (Jan 31 + 1 month lands on the last day of February).
/// Lifetime plans get a +100 year sentinel.
pub fn period_end(interval: PlanInterval, start: DateTime<Utc>) -> DateTime<Utc> {
    let months = match interval {
        PlanInterval::Month => 1,
        PlanInterval::Year => 12,
        PlanInterval::Lifetime => 1200,
    };
    start
        .checked_add_months(Months::new(months))
        // out of chrono's range only for absurd input clocks
        .unwrap_or(start + Duration::days(30 * months as i64))
}

/// Whole days left in the period, rounded up, never negative.
pub fn days_remaining(period_end: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let secs = (period_end - now).num_seconds();
    if secs <= 0 {
        0
    } else {
        (secs + 86_399) / 86_400
    }
}

/// A refund may be requested while the payment is at most
/// `window_days` old and no refund has already been processed for it.
pub fn can_request_refund(
    paid_at: DateTime<Utc>,
    now: DateTime<Utc>,
    window_days: i64,
    already_refunded: bool,
) -> bool {
    !already_refunded && now - paid_at <= Duration::days(window_days)
}

/// Days left to request a refund, clamped at zero for display.
pub fn days_until_refund_expires(
    paid_at: DateTime<Utc>,
    now: DateTime<Utc>,
    window_days: i64,
) -> i64 {
    let elapsed = (now - paid_at).num_days();
    (window_days - elapsed).max(0)
}
