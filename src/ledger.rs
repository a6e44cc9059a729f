// src/ledger.rs
//
// Applies a state-machine transition to a subscription row, including
// the period recomputation the transition asks for. Callers own the
// surrounding transaction and must have locked the row.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgConnection;

use crate::db;
use crate::domain::period::period_end;
use crate::domain::state::{PeriodChange, Transition};
use crate::error::ApiError;
use crate::models::Subscription;

pub async fn apply_transition(
    conn: &mut PgConnection,
    sub: &mut Subscription,
    t: Transition,
    now: DateTime<Utc>,
) -> Result<(), ApiError> {
    match t.period {
        PeriodChange::Keep => {}
        PeriodChange::RestartFromNow => {
            let plan = db::get_plan(&mut *conn, sub.plan_id)
                .await?
                .ok_or(ApiError::NotFound("pricing plan"))?;
            let interval = plan.interval().map_err(ApiError::CorruptRecord)?;
            sub.amount_minor = plan.price_minor;
            sub.current_period_start = now;
            sub.current_period_end = period_end(interval, now);
        }
        PeriodChange::RestartFromBoundary { plan_id } => {
            let plan = db::get_plan(&mut *conn, plan_id)
                .await?
                .ok_or(ApiError::NotFound("pricing plan"))?;
            let interval = plan.interval().map_err(ApiError::CorruptRecord)?;
            let boundary = sub.current_period_end;
            sub.plan_id = plan.id;
            sub.amount_minor = plan.price_minor;
            sub.currency = plan.currency.clone();
            sub.current_period_start = boundary;
            sub.current_period_end = period_end(interval, boundary);
        }
        PeriodChange::ExtendDays(days) => {
            sub.current_period_end = sub.current_period_end + Duration::days(days);
        }
    }

    sub.set_state(t.next, now);
    db::save_subscription(conn, sub).await?;
    Ok(())
}
