use serde_json::json;

use podcast_billing::api::admin::{AdminSubscriptionAction, SubscriptionActionRequest};
use podcast_billing::api::webhooks::{extract_payment_entity, is_capture_event};

#[test]
fn extract_payment_entity_from_capture_payload() {
    let raw = json!({
        "entity": "event",
        "event": "payment.captured",
        "payload": {
            "payment": {
                "entity": {
                    "id": "pay_29QQoUBi66xm2f",
                    "order_id": "order_9A33XWu170gUtm",
                    "amount": 29900,
                    "currency": "INR",
                    "status": "captured"
                }
            }
        },
        "created_at": 1567674606
    });

    let (payment_id, order_id) = extract_payment_entity(&raw).expect("entity present");
    assert_eq!(payment_id, "pay_29QQoUBi66xm2f");
    assert_eq!(order_id, "order_9A33XWu170gUtm");
}

#[test]
fn payload_without_payment_entity_is_rejected() {
    let raw = json!({
        "event": "payment.captured",
        "payload": { "order": { "entity": { "id": "order_9A33XWu170gUtm" } } }
    });
    assert!(extract_payment_entity(&raw).is_none());

    // order_id missing on the entity
    let raw = json!({
        "event": "payment.captured",
        "payload": { "payment": { "entity": { "id": "pay_29QQoUBi66xm2f" } } }
    });
    assert!(extract_payment_entity(&raw).is_none());
}

#[test]
fn only_capture_events_are_reconciled() {
    assert!(is_capture_event("payment.captured"));
    assert!(is_capture_event("order.paid"));
    assert!(!is_capture_event("payment.authorized"));
    assert!(!is_capture_event("refund.created"));
    assert!(!is_capture_event(""));
}

#[test]
fn admin_subscription_actions_parse_from_camel_case_requests() {
    let req: SubscriptionActionRequest = serde_json::from_value(json!({
        "subscriptionId": 42,
        "action": "extend",
        "data": { "days": 30 }
    }))
    .expect("parse");

    assert_eq!(req.subscription_id, 42);
    assert!(matches!(req.action, AdminSubscriptionAction::Extend));
    assert_eq!(req.data.expect("data").days, Some(30));

    serde_json::from_value::<SubscriptionActionRequest>(json!({
        "subscriptionId": 42,
        "action": "terminate"
    }))
    .expect_err("unknown action must not parse");
}
