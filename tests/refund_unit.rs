use podcast_billing::domain::refund::{apply_action, RefundAction, RefundStatus};

#[test]
fn approval_then_processing_is_the_happy_path() {
    let approved = apply_action(RefundStatus::Pending, RefundAction::Approve).expect("legal");
    assert_eq!(approved, RefundStatus::Approved);

    let processed = apply_action(approved, RefundAction::Process).expect("legal");
    assert_eq!(processed, RefundStatus::Processed);
}

#[test]
fn rejection_is_terminal() {
    let rejected = apply_action(RefundStatus::Pending, RefundAction::Reject).expect("legal");
    assert_eq!(rejected, RefundStatus::Rejected);

    apply_action(rejected, RefundAction::Approve).expect_err("rejected is terminal");
    apply_action(rejected, RefundAction::Process).expect_err("rejected is terminal");
}

#[test]
fn processing_requires_prior_approval() {
    let err = apply_action(RefundStatus::Pending, RefundAction::Process)
        .expect_err("pending cannot be processed");
    assert_eq!(err.from, "pending");
    assert_eq!(err.action, "process");

    apply_action(RefundStatus::Pending, RefundAction::MarkProcessed)
        .expect_err("pending cannot be marked processed");
}

#[test]
fn manual_confirmation_also_lands_on_processed() {
    let processed =
        apply_action(RefundStatus::Approved, RefundAction::MarkProcessed).expect("legal");
    assert_eq!(processed, RefundStatus::Processed);
}

#[test]
fn processed_is_terminal() {
    for action in [
        RefundAction::Approve,
        RefundAction::Reject,
        RefundAction::Process,
        RefundAction::MarkProcessed,
    ] {
        apply_action(RefundStatus::Processed, action).expect_err("processed is terminal");
    }
}

#[test]
fn open_statuses_block_duplicate_requests() {
    assert!(RefundStatus::Pending.is_open());
    assert!(RefundStatus::Approved.is_open());
    assert!(!RefundStatus::Rejected.is_open());
    assert!(!RefundStatus::Processed.is_open());
}

#[test]
fn admin_actions_parse_from_their_wire_names() {
    let action: RefundAction = serde_json::from_str("\"mark_processed\"").expect("parse");
    assert_eq!(action, RefundAction::MarkProcessed);
    let action: RefundAction = serde_json::from_str("\"approve\"").expect("parse");
    assert_eq!(action, RefundAction::Approve);
    serde_json::from_str::<RefundAction>("\"escalate\"").expect_err("unknown action");
}
