// src/api/admin.rs
//
// Privileged actions against the subscription and refund ledgers. One
// entry point per ledger; the action is a closed enum, so the compiler
// keeps dispatch exhaustive. Illegal transitions fail loudly, never as
// a silent no-op.

use actix_web::{get, post, web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::api::auth::AuthUser;
use crate::db;
use crate::domain::refund::{apply_action, RefundAction, RefundStatus};
use crate::domain::state::{transition, SubscriptionEvent, SubscriptionState};
use crate::error::ApiError;
use crate::ledger;
use crate::AppState;

fn require_admin(user: &AuthUser) -> Result<(), ApiError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("admin role required".into()))
    }
}

// -------------------------------------------------------- subscriptions

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminSubscriptionAction {
    Pause,
    Cancel,
    Reactivate,
    Extend,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActionData {
    #[serde(default)]
    pub immediate: bool,
    pub days: Option<i64>,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionActionRequest {
    pub subscription_id: i32,
    pub action: AdminSubscriptionAction,
    #[serde(default)]
    pub data: Option<ActionData>,
}

#[get("/admin/subscriptions")]
pub async fn list_subscriptions(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&user)?;
    let subs = db::list_subscriptions(&state.pool).await?;
    Ok(HttpResponse::Ok().json(subs))
}

#[post("/admin/subscriptions")]
pub async fn subscription_action(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<SubscriptionActionRequest>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&user)?;
    let payload = payload.into_inner();
    let data = payload.data.unwrap_or_default();
    let now = Utc::now();

    let event = match payload.action {
        AdminSubscriptionAction::Pause => SubscriptionEvent::Pause,
        AdminSubscriptionAction::Cancel => {
            if data.immediate {
                SubscriptionEvent::CancelImmediate
            } else {
                SubscriptionEvent::CancelAtPeriodEnd
            }
        }
        AdminSubscriptionAction::Reactivate => SubscriptionEvent::Reactivate,
        AdminSubscriptionAction::Extend => {
            let days = data
                .days
                .filter(|d| *d > 0)
                .ok_or_else(|| ApiError::Validation("extend requires a positive day count".into()))?;
            SubscriptionEvent::Extend { days }
        }
    };

    let mut tx = state.pool.begin().await?;
    let mut sub = db::lock_subscription(&mut *tx, payload.subscription_id)
        .await?
        .ok_or(ApiError::NotFound("subscription"))?;

    let t = transition(sub.state()?, event)?;
    ledger::apply_transition(&mut *tx, &mut sub, t, now).await?;
    tx.commit().await?;

    log::info!(
        "admin action admin_id={} subscription_id={} event={} reason={:?} -> {}",
        user.id,
        sub.id,
        event.name(),
        data.reason,
        sub.status
    );

    let message = match payload.action {
        AdminSubscriptionAction::Pause => "Subscription paused; access is revoked until resumed.".to_string(),
        AdminSubscriptionAction::Cancel if data.immediate => {
            "Subscription cancelled immediately.".to_string()
        }
        AdminSubscriptionAction::Cancel => {
            "Subscription will cancel at the end of the current period.".to_string()
        }
        AdminSubscriptionAction::Reactivate => "Subscription reactivated.".to_string(),
        AdminSubscriptionAction::Extend => {
            format!("Subscription extended until {}.", sub.current_period_end.format("%Y-%m-%d"))
        }
    };

    Ok(HttpResponse::Ok().json(json!({ "message": message, "subscription": sub })))
}

// --------------------------------------------------------------- refunds

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundActionRequest {
    pub refund_id: i32,
    pub action: RefundAction,
    pub admin_notes: Option<String>,
    /// Gateway refund id when the refund was performed out-of-band.
    pub razorpay_refund_id: Option<String>,
}

#[get("/admin/refunds")]
pub async fn list_refunds(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&user)?;
    let refunds = db::list_refunds(&state.pool).await?;
    Ok(HttpResponse::Ok().json(refunds))
}

#[post("/admin/refunds")]
pub async fn refund_action(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<RefundActionRequest>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&user)?;
    let payload = payload.into_inner();
    let now = Utc::now();

    let mut tx = state.pool.begin().await?;
    let mut refund = db::lock_refund(&mut *tx, payload.refund_id)
        .await?
        .ok_or(ApiError::NotFound("refund request"))?;

    let current = refund.status().map_err(ApiError::CorruptRecord)?;
    let next = apply_action(current, payload.action)?;

    if let Some(notes) = payload.admin_notes {
        refund.admin_notes = Some(notes);
    }

    match payload.action {
        RefundAction::Approve | RefundAction::Reject => {
            refund.status = next.as_str().to_string();
            db::save_refund(&mut *tx, &refund).await?;
            tx.commit().await?;

            let message = if next == RefundStatus::Approved {
                "Refund approved. Process it to return the money."
            } else {
                "Refund request rejected."
            };
            return Ok(HttpResponse::Ok().json(json!({ "message": message, "refund": refund })));
        }
        RefundAction::Process | RefundAction::MarkProcessed => {}
    }

    // Processing moves money. The gateway payment id comes from the
    // completed payment the request points at.
    let payment_id = refund
        .payment_id
        .ok_or_else(|| ApiError::CorruptRecord("refund request without a payment".into()))?;
    let payment = db::lock_payment(&mut *tx, payment_id)
        .await?
        .ok_or(ApiError::NotFound("payment"))?;

    if payload.action == RefundAction::Process {
        let provider_payment_id = payment.provider_payment_id.as_deref().ok_or_else(|| {
            ApiError::CorruptRecord("completed payment without a gateway payment id".into())
        })?;

        match state
            .razorpay
            .create_refund(provider_payment_id, refund.amount_minor)
            .await
        {
            Ok(resp) => refund.provider_refund_id = Some(resp.id),
            Err(e) => {
                // The request stays approved; the operator finishes the
                // refund out-of-band and records it with mark_processed.
                log::error!(
                    "gateway refund failed refund_id={} payment_id={}: {e}",
                    refund.id,
                    payment.id
                );
                return Ok(HttpResponse::Ok().json(json!({
                    "manualRefundRequired": true,
                    "message": "The gateway refund failed; complete it manually and record it with mark_processed.",
                    "gatewayError": e.to_string(),
                })));
            }
        }
    } else if let Some(refund_id) = payload.razorpay_refund_id {
        refund.provider_refund_id = Some(refund_id);
    }

    refund.status = next.as_str().to_string();
    refund.processed_at = Some(now);
    db::save_refund(&mut *tx, &refund).await?;
    db::mark_payment_refunded(&mut *tx, payment.id).await?;

    // A processed refund revokes access immediately.
    if let Some(sub_id) = refund.subscription_id {
        if let Some(mut sub) = db::lock_subscription(&mut *tx, sub_id).await? {
            sub.set_state(SubscriptionState::Cancelled, now);
            db::save_subscription(&mut *tx, &sub).await?;
        }
    }

    tx.commit().await?;

    log::info!(
        "refund processed admin_id={} refund_id={} payment_id={} manual={}",
        user.id,
        refund.id,
        payment.id,
        payload.action == RefundAction::MarkProcessed
    );

    Ok(HttpResponse::Ok().json(json!({
        "message": "Refund processed; the subscription is cancelled and the payment marked refunded.",
        "refund": refund,
    })))
}
