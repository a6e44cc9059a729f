use podcast_billing::domain::state::{
    transition, PeriodChange, SubscriptionEvent, SubscriptionState,
};

#[test]
fn cancel_at_period_end_keeps_access_until_boundary() {
    let active = SubscriptionState::Active { cancel_at_period_end: false };

    let t = transition(active, SubscriptionEvent::CancelAtPeriodEnd).expect("legal");
    assert_eq!(t.next, SubscriptionState::Active { cancel_at_period_end: true });
    assert_eq!(t.period, PeriodChange::Keep);
    assert!(t.next.has_access());

    let t = transition(t.next, SubscriptionEvent::PeriodBoundary).expect("legal");
    assert_eq!(t.next, SubscriptionState::Cancelled);
    assert!(!t.next.has_access());
}

#[test]
fn immediate_cancel_revokes_access_now() {
    let active = SubscriptionState::Active { cancel_at_period_end: false };
    let t = transition(active, SubscriptionEvent::CancelImmediate).expect("legal");
    assert_eq!(t.next, SubscriptionState::Cancelled);
    assert!(!t.next.has_access());
}

#[test]
fn pause_revokes_access_until_reactivated() {
    let active = SubscriptionState::Active { cancel_at_period_end: false };
    let t = transition(active, SubscriptionEvent::Pause).expect("legal");
    assert_eq!(t.next, SubscriptionState::Paused);
    assert!(!t.next.has_access());

    let t = transition(t.next, SubscriptionEvent::Reactivate).expect("legal");
    assert_eq!(t.next, SubscriptionState::Active { cancel_at_period_end: false });
    assert_eq!(t.period, PeriodChange::RestartFromNow);
}

#[test]
fn reactivating_cancelled_subscription_restarts_period_from_now() {
    let t = transition(SubscriptionState::Cancelled, SubscriptionEvent::Reactivate)
        .expect("legal");
    assert_eq!(t.next, SubscriptionState::Active { cancel_at_period_end: false });
    assert_eq!(t.period, PeriodChange::RestartFromNow);
}

#[test]
fn reactivate_clears_scheduled_cancellation_without_touching_period() {
    let scheduled = SubscriptionState::Active { cancel_at_period_end: true };
    let t = transition(scheduled, SubscriptionEvent::Reactivate).expect("legal");
    assert_eq!(t.next, SubscriptionState::Active { cancel_at_period_end: false });
    assert_eq!(t.period, PeriodChange::Keep);
}

#[test]
fn expired_subscription_cannot_be_reactivated() {
    let err = transition(SubscriptionState::Expired, SubscriptionEvent::Reactivate)
        .expect_err("expired is terminal");
    assert_eq!(err.from, "expired");
    assert_eq!(err.event, "reactivate");
}

#[test]
fn plan_change_is_scheduled_not_applied() {
    let active = SubscriptionState::Active { cancel_at_period_end: false };
    let t = transition(active, SubscriptionEvent::SchedulePlanChange { plan_id: 7 })
        .expect("legal");
    assert_eq!(t.next, SubscriptionState::PendingDowngrade { pending_plan_id: 7 });
    assert_eq!(t.period, PeriodChange::Keep);
    // access is unchanged until the boundary
    assert!(t.next.has_access());
}

#[test]
fn pending_downgrade_applies_at_boundary_on_the_new_plan() {
    let pending = SubscriptionState::PendingDowngrade { pending_plan_id: 7 };
    let t = transition(pending, SubscriptionEvent::PeriodBoundary).expect("legal");
    assert_eq!(t.next, SubscriptionState::Active { cancel_at_period_end: false });
    assert_eq!(t.period, PeriodChange::RestartFromBoundary { plan_id: 7 });
}

#[test]
fn scheduled_downgrade_can_be_replaced() {
    let pending = SubscriptionState::PendingDowngrade { pending_plan_id: 7 };
    let t = transition(pending, SubscriptionEvent::SchedulePlanChange { plan_id: 9 })
        .expect("legal");
    assert_eq!(t.next, SubscriptionState::PendingDowngrade { pending_plan_id: 9 });
}

#[test]
fn plan_change_conflicts_with_scheduled_cancellation() {
    let scheduled = SubscriptionState::Active { cancel_at_period_end: true };
    transition(scheduled, SubscriptionEvent::SchedulePlanChange { plan_id: 7 })
        .expect_err("cancel and downgrade cannot both be scheduled");
}

#[test]
fn boundary_without_renewal_expires_the_subscription() {
    let active = SubscriptionState::Active { cancel_at_period_end: false };
    let t = transition(active, SubscriptionEvent::PeriodBoundary).expect("legal");
    assert_eq!(t.next, SubscriptionState::Expired);

    let t = transition(SubscriptionState::Paused, SubscriptionEvent::PeriodBoundary)
        .expect("legal");
    assert_eq!(t.next, SubscriptionState::Expired);
}

#[test]
fn extend_is_legal_from_live_states_only() {
    for state in [
        SubscriptionState::Active { cancel_at_period_end: false },
        SubscriptionState::PendingDowngrade { pending_plan_id: 3 },
        SubscriptionState::Paused,
    ] {
        let t = transition(state, SubscriptionEvent::Extend { days: 14 }).expect("legal");
        assert_eq!(t.next, state);
        assert_eq!(t.period, PeriodChange::ExtendDays(14));
    }

    transition(SubscriptionState::Cancelled, SubscriptionEvent::Extend { days: 14 })
        .expect_err("cancelled cannot be extended");
}

#[test]
fn illegal_transitions_are_rejected_with_source_state() {
    let cases = [
        (SubscriptionState::Paused, SubscriptionEvent::Pause),
        (SubscriptionState::Cancelled, SubscriptionEvent::CancelImmediate),
        (SubscriptionState::Expired, SubscriptionEvent::PeriodBoundary),
        (SubscriptionState::Paused, SubscriptionEvent::SchedulePlanChange { plan_id: 1 }),
        (
            SubscriptionState::Active { cancel_at_period_end: false },
            SubscriptionEvent::Reactivate,
        ),
    ];
    for (state, event) in cases {
        let err = transition(state, event).expect_err("must be rejected");
        assert_eq!(err.from, state.status_str());
    }
}

#[test]
fn decode_accepts_what_the_machine_produces() {
    let states = [
        SubscriptionState::Active { cancel_at_period_end: false },
        SubscriptionState::Active { cancel_at_period_end: true },
        SubscriptionState::PendingDowngrade { pending_plan_id: 4 },
        SubscriptionState::Paused,
        SubscriptionState::Cancelled,
        SubscriptionState::Expired,
    ];
    for state in states {
        let decoded = SubscriptionState::decode(
            state.status_str(),
            state.cancel_at_period_end(),
            state.pending_plan_id(),
        )
        .expect("roundtrip");
        assert_eq!(decoded, state);
    }
}

#[test]
fn decode_rejects_contradictory_rows() {
    // cancel flag outside active
    SubscriptionState::decode("paused", true, None).expect_err("flag on paused");
    // pending plan outside pending_downgrade
    SubscriptionState::decode("active", false, Some(2)).expect_err("plan on active");
    // pending_downgrade without a plan
    SubscriptionState::decode("pending_downgrade", false, None).expect_err("no plan");
    SubscriptionState::decode("bogus", false, None).expect_err("unknown status");
}
