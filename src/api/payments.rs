// src/api/payments.rs
//
// Order creation and payment confirmation. The confirmation path is
// shared with the gateway webhook: both commit through
// `apply_verified_payment`, which is idempotent by gateway order id and
// applies the payment flip and the entitlement effect in one
// transaction.

use actix_web::{post, web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::auth::AuthUser;
use crate::db;
use crate::domain::period::period_end;
use crate::domain::state::{transition, SubscriptionEvent, SubscriptionState};
use crate::domain::verify::{decide, SignatureCheck, VerifyDecision};
use crate::error::ApiError;
use crate::models::{PaymentKind, PricingPlan, Subscription};
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(rename = "type")]
    pub kind: PaymentKind,

    /// Required for subscription / renewal / upgrade / downgrade.
    pub plan_id: Option<i32>,

    /// Required for one-off podcast purchases.
    pub podcast_id: Option<i32>,

    /// Required for merch checkouts.
    pub merch_order_id: Option<i32>,

    /// Client-quoted amount for purchase orders; plan and merch amounts
    /// are always taken from our own records.
    pub amount: Option<i64>,
    pub currency: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub order_id: String,
    pub amount: i64,
    pub currency: String,
    /// Public key id for the checkout widget.
    pub key: String,
}

#[utoipa::path(
    post,
    path = "/api/payments/create-order",
    tag = "payments",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Order created", body = CreateOrderResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Plan or order not found")
    )
)]
#[post("/payments/create-order")]
pub async fn create_order(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let user_id = user.id;

    // Resolve what is being charged; amounts for plans and merch come
    // from our rows, never from the client.
    let (amount_minor, currency, plan_id, podcast_id, merch_order_id) = match payload.kind {
        PaymentKind::Subscription
        | PaymentKind::SubscriptionRenewal
        | PaymentKind::Upgrade
        | PaymentKind::Downgrade => {
            let plan_id = payload
                .plan_id
                .ok_or_else(|| ApiError::Validation("planId is required".into()))?;
            let plan = db::get_active_plan(&state.pool, plan_id)
                .await?
                .ok_or(ApiError::NotFound("pricing plan"))?;
            if payload.kind != PaymentKind::Subscription
                && db::current_subscription(&state.pool, user_id)
                    .await?
                    .filter(|s| s.state().map(|st| st.has_access()).unwrap_or(false))
                    .is_none()
            {
                return Err(ApiError::Validation(
                    "no active subscription to renew or change".into(),
                ));
            }
            (plan.price_minor, plan.currency.clone(), Some(plan_id), None, None)
        }
        PaymentKind::Purchase => {
            let podcast_id = payload
                .podcast_id
                .ok_or_else(|| ApiError::Validation("podcastId is required".into()))?;
            let amount = payload
                .amount
                .filter(|a| *a > 0)
                .ok_or_else(|| ApiError::Validation("a positive amount is required".into()))?;
            let currency = payload.currency.unwrap_or_else(|| "INR".to_string());
            (amount, currency, None, Some(podcast_id), None)
        }
        PaymentKind::Merch => {
            let merch_order_id = payload
                .merch_order_id
                .ok_or_else(|| ApiError::Validation("merchOrderId is required".into()))?;
            let order = db::get_merch_order(&state.pool, merch_order_id, user_id)
                .await?
                .ok_or(ApiError::NotFound("merch order"))?;
            (order.total_minor, order.currency, None, None, Some(merch_order_id))
        }
    };

    let receipt = Uuid::new_v4().to_string();
    let order = state
        .razorpay
        .create_order(amount_minor, &currency, &receipt)
        .await
        .map_err(|e| {
            log::error!("razorpay create_order error user_id={user_id}: {e}");
            ApiError::Gateway(e)
        })?;

    // сохраняем pending payment (amount/currency берём из наших таблиц)
    let payment = db::insert_pending_payment(
        &state.pool,
        user_id,
        None,
        plan_id,
        podcast_id,
        merch_order_id,
        payload.kind.as_str(),
        amount_minor,
        &currency,
        &order.id,
    )
    .await?;

    log::info!(
        "order created user_id={user_id} kind={} payment_id={} provider_order_id={}",
        payload.kind.as_str(),
        payment.id,
        order.id
    );

    Ok(HttpResponse::Ok().json(CreateOrderResponse {
        order_id: order.id,
        amount: amount_minor,
        currency,
        key: state.razorpay.key_id().to_string(),
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyPaymentRequest {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

/// Where a confirmation arrived from; decides how it is authenticated.
pub enum ConfirmationSource<'a> {
    /// Client-relayed checkout result, authenticated by the checkout
    /// signature over `order_id|payment_id`.
    ClientCheckout { signature: &'a str },
    /// Server-to-server webhook whose body HMAC was already verified.
    GatewayWebhook,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Applied,
    /// Duplicate delivery of an already-confirmed payment.
    AlreadyApplied,
}

#[utoipa::path(
    post,
    path = "/api/payments/verify",
    tag = "payments",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Payment verified and applied"),
        (status = 400, description = "Signature verification failed"),
        (status = 404, description = "No payment record for this order")
    )
)]
#[post("/payments/verify")]
pub async fn verify_payment(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<VerifyPaymentRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();

    let outcome = apply_verified_payment(
        &state,
        &payload.razorpay_order_id,
        &payload.razorpay_payment_id,
        ConfirmationSource::ClientCheckout {
            signature: &payload.razorpay_signature,
        },
    )
    .await?;

    log::info!(
        "payment verified user_id={} provider_order_id={} outcome={outcome:?}",
        user.id,
        payload.razorpay_order_id
    );

    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true })))
}

/// Look up the pending payment, authenticate the confirmation, and
/// commit the payment flip plus the entitlement effect atomically.
/// Safe to call any number of times per gateway payment id.
pub async fn apply_verified_payment(
    state: &AppState,
    provider_order_id: &str,
    provider_payment_id: &str,
    source: ConfirmationSource<'_>,
) -> Result<VerifyOutcome, ApiError> {
    let mut tx = state.pool.begin().await?;

    let payment = db::lock_payment_by_order(&mut *tx, provider_order_id)
        .await?
        .ok_or_else(|| {
            log::warn!("confirmation for unknown order provider_order_id={provider_order_id}");
            ApiError::PaymentRecordNotFound
        })?;

    let check = match source {
        ConfirmationSource::ClientCheckout { signature } => {
            if state.razorpay.verify_checkout_signature(
                provider_order_id,
                provider_payment_id,
                signature,
            ) {
                SignatureCheck::Valid
            } else {
                SignatureCheck::Invalid
            }
        }
        ConfirmationSource::GatewayWebhook => SignatureCheck::SkippedVerifiedUpstream,
    };

    match decide(&payment.status, check) {
        VerifyDecision::RejectSignature => {
            log::warn!(
                "signature mismatch provider_order_id={provider_order_id} payment_id={}",
                payment.id
            );
            return Err(ApiError::InvalidSignature);
        }
        VerifyDecision::AlreadyCompleted => return Ok(VerifyOutcome::AlreadyApplied),
        VerifyDecision::RejectState => {
            return Err(ApiError::InvalidStateTransition {
                from: if payment.status == "refunded" { "refunded" } else { "failed" },
                action: "verify",
            });
        }
        VerifyDecision::Apply => {}
    }

    let now = Utc::now();
    db::mark_payment_completed(&mut *tx, payment.id, provider_payment_id, now).await?;

    let kind = payment.kind().map_err(ApiError::CorruptRecord)?;
    match kind {
        PaymentKind::Subscription => {
            let plan = payment_plan(&mut *tx, payment.plan_id).await?;
            let sub = activate_subscription(&mut *tx, payment.user_id, &plan, now).await?;
            db::link_payment_to_subscription(&mut *tx, payment.id, sub.id).await?;
        }
        PaymentKind::SubscriptionRenewal => {
            let sub = renew_subscription(&mut *tx, payment.user_id, now).await?;
            db::link_payment_to_subscription(&mut *tx, payment.id, sub.id).await?;
        }
        PaymentKind::Upgrade => {
            let plan = payment_plan(&mut *tx, payment.plan_id).await?;
            let sub = upgrade_subscription(&mut *tx, payment.user_id, &plan, now).await?;
            db::link_payment_to_subscription(&mut *tx, payment.id, sub.id).await?;
        }
        PaymentKind::Downgrade => {
            let plan = payment_plan(&mut *tx, payment.plan_id).await?;
            let sub = schedule_plan_change(&mut *tx, payment.user_id, plan.id, now).await?;
            db::link_payment_to_subscription(&mut *tx, payment.id, sub.id).await?;
        }
        PaymentKind::Purchase => {
            let podcast_id = payment
                .podcast_id
                .ok_or_else(|| ApiError::CorruptRecord("purchase payment without podcast".into()))?;
            db::insert_purchase(&mut *tx, payment.user_id, podcast_id, payment.id).await?;
        }
        PaymentKind::Merch => {
            let merch_order_id = payment.merch_order_id.ok_or_else(|| {
                ApiError::CorruptRecord("merch payment without merch order".into())
            })?;
            db::mark_merch_order_paid(&mut *tx, merch_order_id).await?;
        }
    }

    tx.commit().await?;
    Ok(VerifyOutcome::Applied)
}

async fn payment_plan(
    conn: &mut PgConnection,
    plan_id: Option<i32>,
) -> Result<PricingPlan, ApiError> {
    let plan_id =
        plan_id.ok_or_else(|| ApiError::CorruptRecord("plan payment without plan".into()))?;
    db::get_plan(&mut *conn, plan_id)
        .await?
        .ok_or(ApiError::NotFound("pricing plan"))
}

fn plan_period(
    plan: &PricingPlan,
    start: chrono::DateTime<Utc>,
) -> Result<(chrono::DateTime<Utc>, chrono::DateTime<Utc>), ApiError> {
    let interval = plan.interval().map_err(ApiError::CorruptRecord)?;
    Ok((start, period_end(interval, start)))
}

/// First successful payment for a plan: fresh period from now. If a live
/// row already exists (renewal reconciled as a new subscription payment),
/// it is rolled onto the new plan instead of inserting a duplicate.
async fn activate_subscription(
    conn: &mut PgConnection,
    user_id: i32,
    plan: &PricingPlan,
    now: DateTime<Utc>,
) -> Result<Subscription, ApiError> {
    let (start, end) = plan_period(plan, now)?;

    match db::lock_live_subscription(&mut *conn, user_id).await? {
        Some(mut sub) => {
            sub.plan_id = plan.id;
            sub.amount_minor = plan.price_minor;
            sub.currency = plan.currency.clone();
            sub.current_period_start = start;
            sub.current_period_end = end;
            sub.set_state(SubscriptionState::Active { cancel_at_period_end: false }, now);
            db::save_subscription(&mut *conn, &sub).await?;
            Ok(sub)
        }
        None => Ok(db::insert_subscription(
            &mut *conn,
            user_id,
            plan.id,
            plan.price_minor,
            &plan.currency,
            start,
            end,
            None,
        )
        .await?),
    }
}

/// Renewal rolls the period forward from its current end (or from now if
/// the subscription already lapsed). A scheduled downgrade survives the
/// renewal; a scheduled cancellation does not — paying again is the
/// renewal signal.
async fn renew_subscription(
    conn: &mut PgConnection,
    user_id: i32,
    now: DateTime<Utc>,
) -> Result<Subscription, ApiError> {
    let mut sub = db::lock_current_subscription(&mut *conn, user_id)
        .await?
        .ok_or(ApiError::NotFound("subscription"))?;
    let plan = db::get_plan(&mut *conn, sub.plan_id)
        .await?
        .ok_or(ApiError::NotFound("pricing plan"))?;

    let state = sub.state()?;
    let start = if sub.current_period_end > now && state.has_access() {
        sub.current_period_end
    } else {
        now
    };
    let (start, end) = plan_period(&plan, start)?;
    sub.current_period_start = start;
    sub.current_period_end = end;
    sub.amount_minor = plan.price_minor;

    let next = match state {
        SubscriptionState::PendingDowngrade { pending_plan_id } => {
            SubscriptionState::PendingDowngrade { pending_plan_id }
        }
        _ => SubscriptionState::Active { cancel_at_period_end: false },
    };
    sub.set_state(next, now);
    db::save_subscription(&mut *conn, &sub).await?;
    Ok(sub)
}

/// Paid upgrades switch plans immediately with a fresh paid period.
async fn upgrade_subscription(
    conn: &mut PgConnection,
    user_id: i32,
    plan: &PricingPlan,
    now: DateTime<Utc>,
) -> Result<Subscription, ApiError> {
    let mut sub = db::lock_current_subscription(&mut *conn, user_id)
        .await?
        .ok_or(ApiError::NotFound("subscription"))?;

    let (start, end) = plan_period(plan, now)?;
    sub.plan_id = plan.id;
    sub.amount_minor = plan.price_minor;
    sub.currency = plan.currency.clone();
    sub.current_period_start = start;
    sub.current_period_end = end;
    sub.set_state(SubscriptionState::Active { cancel_at_period_end: false }, now);
    db::save_subscription(&mut *conn, &sub).await?;
    Ok(sub)
}

/// Downgrades never move money mid-period: the plan swap is scheduled
/// for the boundary.
async fn schedule_plan_change(
    conn: &mut PgConnection,
    user_id: i32,
    plan_id: i32,
    now: DateTime<Utc>,
) -> Result<Subscription, ApiError> {
    let mut sub = db::lock_live_subscription(&mut *conn, user_id)
        .await?
        .ok_or(ApiError::NotFound("subscription"))?;

    let t = transition(sub.state()?, SubscriptionEvent::SchedulePlanChange { plan_id })?;
    sub.set_state(t.next, now);
    db::save_subscription(&mut *conn, &sub).await?;
    Ok(sub)
}
