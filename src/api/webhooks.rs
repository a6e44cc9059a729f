// src/api/webhooks.rs
//
// Server-to-server confirmations from Razorpay. The client-relayed
// checkout result alone is not trustworthy (an abandoned checkout can
// still be captured by the gateway later), so captures arriving here
// are reconciled through the same idempotent path as /payments/verify.

use actix_web::{post, web, HttpRequest, HttpResponse};
use serde_json::{json, Value};

use crate::api::payments::{apply_verified_payment, ConfirmationSource};
use crate::error::ApiError;
use crate::AppState;

const SIGNATURE_HEADER: &str = "X-Razorpay-Signature";

/// Events that confirm money actually moved.
pub fn is_capture_event(event: &str) -> bool {
    matches!(event, "payment.captured" | "order.paid")
}

/// Pull the payment entity out of the webhook envelope:
/// `{ "event": ..., "payload": { "payment": { "entity": { "id", "order_id", ... } } } }`.
pub fn extract_payment_entity(body: &Value) -> Option<(String, String)> {
    let entity = body.get("payload")?.get("payment")?.get("entity")?;
    let payment_id = entity.get("id")?.as_str()?.to_string();
    let order_id = entity.get("order_id")?.as_str()?.to_string();
    Some((payment_id, order_id))
}

#[utoipa::path(
    post,
    path = "/webhooks/razorpay",
    tag = "webhooks",
    responses(
        (status = 200, description = "Webhook processed or ignored"),
        (status = 400, description = "Bad signature or malformed payload")
    )
)]
#[post("/webhooks/razorpay")]
pub async fn razorpay_webhook(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> HttpResponse {
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    if !state.razorpay.verify_webhook_signature(&body, signature) {
        log::warn!("webhook signature mismatch");
        return HttpResponse::BadRequest().json(json!({ "error": "invalid_signature" }));
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("webhook payload parse error: {e}");
            return HttpResponse::BadRequest().json(json!({ "error": "validation" }));
        }
    };

    let event = payload.get("event").and_then(|v| v.as_str()).unwrap_or("");
    if !is_capture_event(event) {
        return HttpResponse::Ok().json(json!({ "ok": true, "ignored": true }));
    }

    let Some((payment_id, order_id)) = extract_payment_entity(&payload) else {
        log::warn!("webhook without payment entity event={event}");
        return HttpResponse::BadRequest().json(json!({ "error": "validation" }));
    };

    match apply_verified_payment(&state, &order_id, &payment_id, ConfirmationSource::GatewayWebhook)
        .await
    {
        Ok(outcome) => {
            log::info!("webhook applied event={event} order_id={order_id} outcome={outcome:?}");
            HttpResponse::Ok().json(json!({ "ok": true }))
        }
        // неизвестный orderId — отвечаем 200, чтобы шлюз не ретраил
        // бесконечно; след оставляем в логе
        Err(ApiError::PaymentRecordNotFound) => {
            log::warn!("webhook for unknown order order_id={order_id}");
            HttpResponse::Ok().json(json!({ "ok": true, "ignored": true }))
        }
        Err(e) => {
            log::error!("webhook apply error order_id={order_id}: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}
