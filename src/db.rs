// src/db.rs
//
// Query layer. Runtime queries + explicit row mapping so the build does
// not need a live database. Mutations that must be serialized per-row go
// through the `lock_*` functions (SELECT ... FOR UPDATE) inside a
// transaction owned by the caller.

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnection, PgExecutor, PgPool, PgRow};
use sqlx::Row;

use crate::models::{MerchOrder, Payment, PricingPlan, RefundRequest, Subscription};

fn map_plan(r: &PgRow) -> PricingPlan {
    PricingPlan {
        id: r.get("id"),
        name: r.get("name"),
        price_minor: r.get("price_minor"),
        currency: r.get("currency"),
        interval: r.get("interval"),
        allow_downloads: r.get("allow_downloads"),
        allow_offline: r.get("allow_offline"),
        is_active: r.get("is_active"),
        created_at: r.get("created_at"),
    }
}

fn map_subscription(r: &PgRow) -> Subscription {
    Subscription {
        id: r.get("id"),
        user_id: r.get("user_id"),
        plan_id: r.get("plan_id"),
        status: r.get("status"),
        amount_minor: r.get("amount_minor"),
        currency: r.get("currency"),
        current_period_start: r.get("current_period_start"),
        current_period_end: r.get("current_period_end"),
        cancel_at_period_end: r.get("cancel_at_period_end"),
        pending_plan_id: r.get("pending_plan_id"),
        provider_subscription_id: r.get("provider_subscription_id"),
        cancelled_at: r.get("cancelled_at"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

fn map_payment(r: &PgRow) -> Payment {
    Payment {
        id: r.get("id"),
        user_id: r.get("user_id"),
        subscription_id: r.get("subscription_id"),
        plan_id: r.get("plan_id"),
        podcast_id: r.get("podcast_id"),
        merch_order_id: r.get("merch_order_id"),
        kind: r.get("kind"),
        amount_minor: r.get("amount_minor"),
        currency: r.get("currency"),
        status: r.get("status"),
        provider: r.get("provider"),
        provider_order_id: r.get("provider_order_id"),
        provider_payment_id: r.get("provider_payment_id"),
        paid_at: r.get("paid_at"),
        created_at: r.get("created_at"),
    }
}

fn map_refund(r: &PgRow) -> RefundRequest {
    RefundRequest {
        id: r.get("id"),
        user_id: r.get("user_id"),
        subscription_id: r.get("subscription_id"),
        payment_id: r.get("payment_id"),
        amount_minor: r.get("amount_minor"),
        currency: r.get("currency"),
        reason: r.get("reason"),
        status: r.get("status"),
        admin_notes: r.get("admin_notes"),
        provider_refund_id: r.get("provider_refund_id"),
        created_at: r.get("created_at"),
        processed_at: r.get("processed_at"),
    }
}

const PLAN_COLS: &str = "id, name, price_minor, currency, interval, allow_downloads, \
                         allow_offline, is_active, created_at";
const SUB_COLS: &str = "id, user_id, plan_id, status, amount_minor, currency, \
                        current_period_start, current_period_end, cancel_at_period_end, \
                        pending_plan_id, provider_subscription_id, cancelled_at, \
                        created_at, updated_at";
const PAYMENT_COLS: &str = "id, user_id, subscription_id, plan_id, podcast_id, merch_order_id, \
                            kind, amount_minor, currency, status, provider, provider_order_id, \
                            provider_payment_id, paid_at, created_at";
const REFUND_COLS: &str = "id, user_id, subscription_id, payment_id, amount_minor, currency, \
                           reason, status, admin_notes, provider_refund_id, created_at, \
                           processed_at";

// ---------------------------------------------------------------- plans

pub async fn list_active_plans(pool: &PgPool) -> Result<Vec<PricingPlan>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {PLAN_COLS} FROM pricing_plans WHERE is_active = true ORDER BY price_minor ASC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(map_plan).collect())
}

pub async fn get_plan<'e, E>(ex: E, id: i32) -> Result<Option<PricingPlan>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(&format!("SELECT {PLAN_COLS} FROM pricing_plans WHERE id = $1"))
        .bind(id)
        .fetch_optional(ex)
        .await?;
    Ok(row.as_ref().map(map_plan))
}

pub async fn get_active_plan<'e, E>(ex: E, id: i32) -> Result<Option<PricingPlan>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(&format!(
        "SELECT {PLAN_COLS} FROM pricing_plans WHERE id = $1 AND is_active = true"
    ))
    .bind(id)
    .fetch_optional(ex)
    .await?;
    Ok(row.as_ref().map(map_plan))
}

// -------------------------------------------------------- subscriptions

/// The user's current subscription: the live row if one exists,
/// otherwise the most recent historical one.
pub async fn current_subscription<'e, E>(
    ex: E,
    user_id: i32,
) -> Result<Option<Subscription>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(&format!(
        "SELECT {SUB_COLS} FROM subscriptions
         WHERE user_id = $1
         ORDER BY (status IN ('active', 'pending_downgrade', 'paused')) DESC, created_at DESC
         LIMIT 1"
    ))
    .bind(user_id)
    .fetch_optional(ex)
    .await?;
    Ok(row.as_ref().map(map_subscription))
}

pub async fn lock_subscription(
    conn: &mut PgConnection,
    id: i32,
) -> Result<Option<Subscription>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {SUB_COLS} FROM subscriptions WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(row.as_ref().map(map_subscription))
}

/// Lock the user's live subscription row, if any.
pub async fn lock_live_subscription(
    conn: &mut PgConnection,
    user_id: i32,
) -> Result<Option<Subscription>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {SUB_COLS} FROM subscriptions
         WHERE user_id = $1 AND status IN ('active', 'pending_downgrade', 'paused')
         FOR UPDATE"
    ))
    .bind(user_id)
    .fetch_optional(conn)
    .await?;
    Ok(row.as_ref().map(map_subscription))
}

/// Lock the row the user would act on: the live one, or the most recent
/// historical one (reactivation starts from a cancelled row).
pub async fn lock_current_subscription(
    conn: &mut PgConnection,
    user_id: i32,
) -> Result<Option<Subscription>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {SUB_COLS} FROM subscriptions
         WHERE user_id = $1
         ORDER BY (status IN ('active', 'pending_downgrade', 'paused')) DESC, created_at DESC
         LIMIT 1
         FOR UPDATE"
    ))
    .bind(user_id)
    .fetch_optional(conn)
    .await?;
    Ok(row.as_ref().map(map_subscription))
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_subscription(
    conn: &mut PgConnection,
    user_id: i32,
    plan_id: i32,
    amount_minor: i64,
    currency: &str,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    provider_subscription_id: Option<&str>,
) -> Result<Subscription, sqlx::Error> {
    let row = sqlx::query(&format!(
        "INSERT INTO subscriptions
             (user_id, plan_id, status, amount_minor, currency,
              current_period_start, current_period_end, provider_subscription_id)
         VALUES ($1, $2, 'active', $3, $4, $5, $6, $7)
         RETURNING {SUB_COLS}"
    ))
    .bind(user_id)
    .bind(plan_id)
    .bind(amount_minor)
    .bind(currency)
    .bind(period_start)
    .bind(period_end)
    .bind(provider_subscription_id)
    .fetch_one(conn)
    .await?;
    Ok(map_subscription(&row))
}

/// Persist the mutable fields of a subscription row.
pub async fn save_subscription(
    conn: &mut PgConnection,
    sub: &Subscription,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE subscriptions
         SET plan_id = $1, status = $2, amount_minor = $3,
             current_period_start = $4, current_period_end = $5,
             cancel_at_period_end = $6, pending_plan_id = $7,
             cancelled_at = $8, updated_at = NOW()
         WHERE id = $9",
    )
    .bind(sub.plan_id)
    .bind(&sub.status)
    .bind(sub.amount_minor)
    .bind(sub.current_period_start)
    .bind(sub.current_period_end)
    .bind(sub.cancel_at_period_end)
    .bind(sub.pending_plan_id)
    .bind(sub.cancelled_at)
    .bind(sub.id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn list_subscriptions(pool: &PgPool) -> Result<Vec<Subscription>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {SUB_COLS} FROM subscriptions ORDER BY created_at DESC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(map_subscription).collect())
}

/// Ids of live subscriptions whose period has ended; the sweep applies
/// the boundary transition to each.
pub async fn due_subscription_ids(
    pool: &PgPool,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<i32>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT id FROM subscriptions
         WHERE status IN ('active', 'pending_downgrade', 'paused')
           AND current_period_end <= $1
         ORDER BY current_period_end ASC
         LIMIT $2",
    )
    .bind(now)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(|r| r.get("id")).collect())
}

/// Re-check and claim a due row inside the sweep transaction. SKIP LOCKED
/// keeps concurrent sweeps (or an admin action) from piling up on it.
pub async fn lock_due_subscription(
    conn: &mut PgConnection,
    id: i32,
    now: DateTime<Utc>,
) -> Result<Option<Subscription>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {SUB_COLS} FROM subscriptions
         WHERE id = $1
           AND status IN ('active', 'pending_downgrade', 'paused')
           AND current_period_end <= $2
         FOR UPDATE SKIP LOCKED"
    ))
    .bind(id)
    .bind(now)
    .fetch_optional(conn)
    .await?;
    Ok(row.as_ref().map(map_subscription))
}

// -------------------------------------------------------------- payments

#[allow(clippy::too_many_arguments)]
pub async fn insert_pending_payment<'e, E>(
    ex: E,
    user_id: i32,
    subscription_id: Option<i32>,
    plan_id: Option<i32>,
    podcast_id: Option<i32>,
    merch_order_id: Option<i32>,
    kind: &str,
    amount_minor: i64,
    currency: &str,
    provider_order_id: &str,
) -> Result<Payment, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(&format!(
        "INSERT INTO payments
             (user_id, subscription_id, plan_id, podcast_id, merch_order_id,
              kind, amount_minor, currency, status, provider_order_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending', $9)
         RETURNING {PAYMENT_COLS}"
    ))
    .bind(user_id)
    .bind(subscription_id)
    .bind(plan_id)
    .bind(podcast_id)
    .bind(merch_order_id)
    .bind(kind)
    .bind(amount_minor)
    .bind(currency)
    .bind(provider_order_id)
    .fetch_one(ex)
    .await?;
    Ok(map_payment(&row))
}

pub async fn lock_payment_by_order(
    conn: &mut PgConnection,
    provider_order_id: &str,
) -> Result<Option<Payment>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {PAYMENT_COLS} FROM payments WHERE provider_order_id = $1 FOR UPDATE"
    ))
    .bind(provider_order_id)
    .fetch_optional(conn)
    .await?;
    Ok(row.as_ref().map(map_payment))
}

pub async fn lock_payment(
    conn: &mut PgConnection,
    id: i32,
) -> Result<Option<Payment>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {PAYMENT_COLS} FROM payments WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(row.as_ref().map(map_payment))
}

pub async fn mark_payment_completed(
    conn: &mut PgConnection,
    id: i32,
    provider_payment_id: &str,
    paid_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE payments
         SET status = 'completed', provider_payment_id = $1, paid_at = $2
         WHERE id = $3",
    )
    .bind(provider_payment_id)
    .bind(paid_at)
    .bind(id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn mark_payment_refunded(conn: &mut PgConnection, id: i32) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE payments SET status = 'refunded' WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn link_payment_to_subscription(
    conn: &mut PgConnection,
    payment_id: i32,
    subscription_id: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE payments SET subscription_id = $1 WHERE id = $2")
        .bind(subscription_id)
        .bind(payment_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Most recent completed charge for a subscription; the refund window is
/// measured from it.
pub async fn latest_completed_subscription_payment<'e, E>(
    ex: E,
    subscription_id: i32,
) -> Result<Option<Payment>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(&format!(
        "SELECT {PAYMENT_COLS} FROM payments
         WHERE subscription_id = $1 AND status = 'completed'
         ORDER BY paid_at DESC NULLS LAST
         LIMIT 1"
    ))
    .bind(subscription_id)
    .fetch_optional(ex)
    .await?;
    Ok(row.as_ref().map(map_payment))
}

pub async fn list_user_payments(
    pool: &PgPool,
    user_id: i32,
) -> Result<Vec<Payment>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {PAYMENT_COLS} FROM payments WHERE user_id = $1 ORDER BY created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(map_payment).collect())
}

// --------------------------------------------------------------- refunds

pub async fn has_open_refund_for_subscription<'e, E>(
    ex: E,
    subscription_id: i32,
) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(
        "SELECT COUNT(*) AS n FROM refund_requests
         WHERE subscription_id = $1 AND status IN ('pending', 'approved')",
    )
    .bind(subscription_id)
    .fetch_one(ex)
    .await?;
    Ok(row.get::<i64, _>("n") > 0)
}

pub async fn has_open_refund_for_payment<'e, E>(
    ex: E,
    payment_id: i32,
) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(
        "SELECT COUNT(*) AS n FROM refund_requests
         WHERE payment_id = $1 AND status IN ('pending', 'approved')",
    )
    .bind(payment_id)
    .fetch_one(ex)
    .await?;
    Ok(row.get::<i64, _>("n") > 0)
}

pub async fn has_processed_refund_for_payment<'e, E>(
    ex: E,
    payment_id: i32,
) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(
        "SELECT COUNT(*) AS n FROM refund_requests
         WHERE payment_id = $1 AND status = 'processed'",
    )
    .bind(payment_id)
    .fetch_one(ex)
    .await?;
    Ok(row.get::<i64, _>("n") > 0)
}

pub async fn insert_refund_request(
    conn: &mut PgConnection,
    user_id: i32,
    subscription_id: Option<i32>,
    payment_id: Option<i32>,
    amount_minor: i64,
    currency: &str,
    reason: Option<&str>,
) -> Result<RefundRequest, sqlx::Error> {
    let row = sqlx::query(&format!(
        "INSERT INTO refund_requests
             (user_id, subscription_id, payment_id, amount_minor, currency, reason, status)
         VALUES ($1, $2, $3, $4, $5, $6, 'pending')
         RETURNING {REFUND_COLS}"
    ))
    .bind(user_id)
    .bind(subscription_id)
    .bind(payment_id)
    .bind(amount_minor)
    .bind(currency)
    .bind(reason)
    .fetch_one(conn)
    .await?;
    Ok(map_refund(&row))
}

pub async fn lock_refund(
    conn: &mut PgConnection,
    id: i32,
) -> Result<Option<RefundRequest>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {REFUND_COLS} FROM refund_requests WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(row.as_ref().map(map_refund))
}

pub async fn save_refund(
    conn: &mut PgConnection,
    refund: &RefundRequest,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE refund_requests
         SET status = $1, admin_notes = $2, provider_refund_id = $3, processed_at = $4
         WHERE id = $5",
    )
    .bind(&refund.status)
    .bind(&refund.admin_notes)
    .bind(&refund.provider_refund_id)
    .bind(refund.processed_at)
    .bind(refund.id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn list_refunds(pool: &PgPool) -> Result<Vec<RefundRequest>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {REFUND_COLS} FROM refund_requests ORDER BY created_at DESC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(map_refund).collect())
}

pub async fn list_user_refunds(
    pool: &PgPool,
    user_id: i32,
) -> Result<Vec<RefundRequest>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {REFUND_COLS} FROM refund_requests WHERE user_id = $1 ORDER BY created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(map_refund).collect())
}

// ------------------------------------------------- purchases / merch

pub async fn insert_purchase(
    conn: &mut PgConnection,
    user_id: i32,
    podcast_id: i32,
    payment_id: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO purchases (user_id, podcast_id, payment_id)
         VALUES ($1, $2, $3)
         ON CONFLICT (user_id, podcast_id) DO NOTHING",
    )
    .bind(user_id)
    .bind(podcast_id)
    .bind(payment_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn get_merch_order<'e, E>(
    ex: E,
    id: i32,
    user_id: i32,
) -> Result<Option<MerchOrder>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(
        "SELECT id, user_id, status, total_minor, currency, created_at
         FROM merch_orders
         WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(ex)
    .await?;
    Ok(row.map(|r| MerchOrder {
        id: r.get("id"),
        user_id: r.get("user_id"),
        status: r.get("status"),
        total_minor: r.get("total_minor"),
        currency: r.get("currency"),
        created_at: r.get("created_at"),
    }))
}

pub async fn mark_merch_order_paid(
    conn: &mut PgConnection,
    merch_order_id: i32,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE merch_orders SET status = 'paid' WHERE id = $1 AND status = 'created'",
    )
    .bind(merch_order_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
