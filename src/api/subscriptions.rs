// src/api/subscriptions.rs
//
// User-facing subscription surface: current state with derived billing
// fields, cancel/reactivate/change-plan, refund requests, and the
// payment history for the billing page.

use actix_web::{get, post, web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::auth::AuthUser;
use crate::db;
use crate::domain::period;
use crate::domain::state::{transition, SubscriptionEvent};
use crate::error::ApiError;
use crate::ledger;
use crate::models::PricingPlan;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanView {
    id: i32,
    name: String,
    price_minor: i64,
    currency: String,
    interval: String,
    allow_downloads: bool,
    allow_offline: bool,
}

impl From<PricingPlan> for PlanView {
    fn from(p: PricingPlan) -> Self {
        PlanView {
            id: p.id,
            name: p.name,
            price_minor: p.price_minor,
            currency: p.currency,
            interval: p.interval,
            allow_downloads: p.allow_downloads,
            allow_offline: p.allow_offline,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionView {
    id: i32,
    status: String,
    plan: PlanView,
    current_period_start: chrono::DateTime<Utc>,
    current_period_end: chrono::DateTime<Utc>,
    cancel_at_period_end: bool,
    has_access: bool,
    days_remaining: i64,
    can_request_refund: bool,
    days_until_refund_expires: i64,
    has_pending_refund: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pending_plan: Option<PlanView>,
}

/// Current subscription plus everything the account page derives from
/// it. All derived fields are recomputed here, never read from storage.
#[get("/users/subscription")]
pub async fn get_subscription(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let Some(sub) = db::current_subscription(&state.pool, user.id).await? else {
        return Ok(HttpResponse::Ok().json(serde_json::Value::Null));
    };

    let sub_state = sub.state()?;
    let now = Utc::now();

    let plan = db::get_plan(&state.pool, sub.plan_id)
        .await?
        .ok_or(ApiError::NotFound("pricing plan"))?;
    let pending_plan = match sub.pending_plan_id {
        Some(id) => db::get_plan(&state.pool, id).await?.map(PlanView::from),
        None => None,
    };

    let has_pending_refund = db::has_open_refund_for_subscription(&state.pool, sub.id).await?;

    let (can_request_refund, days_until_refund_expires) =
        match db::latest_completed_subscription_payment(&state.pool, sub.id).await? {
            Some(payment) => {
                let paid_at = payment.paid_at.unwrap_or(payment.created_at);
                let already_refunded =
                    db::has_processed_refund_for_payment(&state.pool, payment.id).await?;
                (
                    !has_pending_refund
                        && period::can_request_refund(
                            paid_at,
                            now,
                            state.refund_window_days,
                            already_refunded,
                        ),
                    period::days_until_refund_expires(paid_at, now, state.refund_window_days),
                )
            }
            None => (false, 0),
        };

    Ok(HttpResponse::Ok().json(SubscriptionView {
        id: sub.id,
        status: sub.status.clone(),
        plan: plan.into(),
        current_period_start: sub.current_period_start,
        current_period_end: sub.current_period_end,
        cancel_at_period_end: sub.cancel_at_period_end,
        has_access: sub_state.has_access(),
        days_remaining: period::days_remaining(sub.current_period_end, now),
        can_request_refund,
        days_until_refund_expires,
        has_pending_refund,
        pending_plan,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub immediate: bool,
    pub reason: Option<String>,
}

#[post("/users/subscription/cancel")]
pub async fn cancel_subscription(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<CancelRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let now = Utc::now();

    let mut tx = state.pool.begin().await?;
    let mut sub = db::lock_live_subscription(&mut *tx, user.id)
        .await?
        .ok_or(ApiError::NotFound("subscription"))?;

    let event = if payload.immediate {
        SubscriptionEvent::CancelImmediate
    } else {
        SubscriptionEvent::CancelAtPeriodEnd
    };
    let t = transition(sub.state()?, event)?;
    ledger::apply_transition(&mut *tx, &mut sub, t, now).await?;
    tx.commit().await?;

    log::info!(
        "subscription cancelled user_id={} subscription_id={} immediate={} reason={:?}",
        user.id,
        sub.id,
        payload.immediate,
        payload.reason
    );

    let message = if payload.immediate {
        "Your subscription has been cancelled and access revoked."
    } else {
        "Your subscription will be cancelled at the end of the current billing period."
    };
    Ok(HttpResponse::Ok().json(json!({ "message": message, "subscription": sub })))
}

#[post("/users/subscription/reactivate")]
pub async fn reactivate_subscription(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let now = Utc::now();

    let mut tx = state.pool.begin().await?;
    let mut sub = db::lock_current_subscription(&mut *tx, user.id)
        .await?
        .ok_or(ApiError::NotFound("subscription"))?;

    let t = transition(sub.state()?, SubscriptionEvent::Reactivate)?;
    ledger::apply_transition(&mut *tx, &mut sub, t, now).await?;
    tx.commit().await?;

    log::info!("subscription reactivated user_id={} subscription_id={}", user.id, sub.id);

    Ok(HttpResponse::Ok().json(json!({
        "message": "Your subscription is active again.",
        "subscription": sub,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePlanRequest {
    pub plan_id: i32,
}

/// Plan changes never move money mid-period: the swap is scheduled for
/// the period boundary. Paid upgrades go through the payment flow
/// instead.
#[post("/users/subscription/change-plan")]
pub async fn change_plan(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<ChangePlanRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let now = Utc::now();

    let plan = db::get_active_plan(&state.pool, payload.plan_id)
        .await?
        .ok_or(ApiError::NotFound("pricing plan"))?;

    let mut tx = state.pool.begin().await?;
    let mut sub = db::lock_live_subscription(&mut *tx, user.id)
        .await?
        .ok_or(ApiError::NotFound("subscription"))?;

    if plan.id == sub.plan_id {
        return Err(ApiError::Validation("already subscribed to this plan".into()));
    }

    let t = transition(
        sub.state()?,
        SubscriptionEvent::SchedulePlanChange { plan_id: plan.id },
    )?;
    ledger::apply_transition(&mut *tx, &mut sub, t, now).await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": format!(
            "Your plan will change to '{}' at the end of the current billing period.",
            plan.name
        ),
        "subscription": sub,
    })))
}

#[derive(Debug, Deserialize)]
pub struct RequestRefundBody {
    pub reason: Option<String>,
}

#[post("/users/subscription/request-refund")]
pub async fn request_refund(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<RequestRefundBody>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let now = Utc::now();

    let mut tx = state.pool.begin().await?;
    let sub = db::lock_current_subscription(&mut *tx, user.id)
        .await?
        .ok_or(ApiError::NotFound("subscription"))?;

    if db::has_open_refund_for_subscription(&mut *tx, sub.id).await? {
        return Err(ApiError::DuplicateRefundRequest);
    }

    let payment = db::latest_completed_subscription_payment(&mut *tx, sub.id)
        .await?
        .ok_or(ApiError::NotFound("completed payment"))?;
    let paid_at = payment.paid_at.unwrap_or(payment.created_at);
    let already_refunded = db::has_processed_refund_for_payment(&mut *tx, payment.id).await?;

    if !period::can_request_refund(paid_at, now, state.refund_window_days, already_refunded) {
        return Err(ApiError::RefundWindowExpired);
    }

    let refund = db::insert_refund_request(
        &mut *tx,
        user.id,
        Some(sub.id),
        Some(payment.id),
        payment.amount_minor,
        &payment.currency,
        payload.reason.as_deref(),
    )
    .await?;
    tx.commit().await?;

    log::info!(
        "refund requested user_id={} subscription_id={} refund_id={}",
        user.id,
        sub.id,
        refund.id
    );

    Ok(HttpResponse::Ok().json(json!({
        "message": "Your refund request has been submitted for review.",
        "refund": refund,
    })))
}

/// Payment and refund history for the account/billing page.
#[get("/users/payments")]
pub async fn list_payments(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let payments = db::list_user_payments(&state.pool, user.id).await?;
    let refunds = db::list_user_refunds(&state.pool, user.id).await?;
    Ok(HttpResponse::Ok().json(json!({ "payments": payments, "refunds": refunds })))
}
