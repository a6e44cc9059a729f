// src/domain/state.rs
//
// Subscription lifecycle as one tagged enum. The relational row stores
// status + cancel_at_period_end + pending_plan_id separately; decoding
// rejects combinations the state machine cannot produce instead of
// repairing them.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Active { cancel_at_period_end: bool },
    PendingDowngrade { pending_plan_id: i32 },
    Paused,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateDecodeError {
    pub status: String,
    pub detail: &'static str,
}

impl fmt::Display for StateDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscription status '{}': {}", self.status, self.detail)
    }
}

impl SubscriptionState {
    pub fn decode(
        status: &str,
        cancel_at_period_end: bool,
        pending_plan_id: Option<i32>,
    ) -> Result<Self, StateDecodeError> {
        let fail = |detail| {
            Err(StateDecodeError {
                status: status.to_string(),
                detail,
            })
        };
        match status {
            "active" => {
                if pending_plan_id.is_some() {
                    return fail("pending plan set outside pending_downgrade");
                }
                Ok(SubscriptionState::Active { cancel_at_period_end })
            }
            "pending_downgrade" => {
                if cancel_at_period_end {
                    return fail("cancel flag set while a downgrade is scheduled");
                }
                match pending_plan_id {
                    Some(plan) => Ok(SubscriptionState::PendingDowngrade { pending_plan_id: plan }),
                    None => fail("pending_downgrade without a pending plan"),
                }
            }
            "paused" | "cancelled" | "expired" => {
                if cancel_at_period_end {
                    return fail("cancel flag is only valid while active");
                }
                if pending_plan_id.is_some() {
                    return fail("pending plan set outside pending_downgrade");
                }
                Ok(match status {
                    "paused" => SubscriptionState::Paused,
                    "cancelled" => SubscriptionState::Cancelled,
                    _ => SubscriptionState::Expired,
                })
            }
            _ => fail("unknown status"),
        }
    }

    pub fn status_str(&self) -> &'static str {
        match self {
            SubscriptionState::Active { .. } => "active",
            SubscriptionState::PendingDowngrade { .. } => "pending_downgrade",
            SubscriptionState::Paused => "paused",
            SubscriptionState::Cancelled => "cancelled",
            SubscriptionState::Expired => "expired",
        }
    }

    pub fn cancel_at_period_end(&self) -> bool {
        matches!(self, SubscriptionState::Active { cancel_at_period_end: true })
    }

    pub fn pending_plan_id(&self) -> Option<i32> {
        match self {
            SubscriptionState::PendingDowngrade { pending_plan_id } => Some(*pending_plan_id),
            _ => None,
        }
    }

    /// Access is a pure function of the state, no history scan.
    pub fn has_access(&self) -> bool {
        matches!(
            self,
            SubscriptionState::Active { .. } | SubscriptionState::PendingDowngrade { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionEvent {
    CancelAtPeriodEnd,
    CancelImmediate,
    Pause,
    Reactivate,
    SchedulePlanChange { plan_id: i32 },
    Extend { days: i64 },
    PeriodBoundary,
}

impl SubscriptionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SubscriptionEvent::CancelAtPeriodEnd => "cancel_at_period_end",
            SubscriptionEvent::CancelImmediate => "cancel_immediate",
            SubscriptionEvent::Pause => "pause",
            SubscriptionEvent::Reactivate => "reactivate",
            SubscriptionEvent::SchedulePlanChange { .. } => "change_plan",
            SubscriptionEvent::Extend { .. } => "extend",
            SubscriptionEvent::PeriodBoundary => "period_boundary",
        }
    }
}

/// How the billing period moves alongside a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodChange {
    Keep,
    /// New period computed from "now" (reactivation).
    RestartFromNow,
    /// New period computed from the old period end on the given plan
    /// (downgrade applied at the boundary).
    RestartFromBoundary { plan_id: i32 },
    ExtendDays(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: SubscriptionState,
    pub period: PeriodChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: &'static str,
    pub event: &'static str,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event '{}' is illegal from state '{}'", self.event, self.from)
    }
}

/// The transition table. Anything not listed is rejected and the record
/// stays untouched.
pub fn transition(
    state: SubscriptionState,
    event: SubscriptionEvent,
) -> Result<Transition, InvalidTransition> {
    use PeriodChange::*;
    use SubscriptionEvent as E;
    use SubscriptionState as S;

    let keep = |next| Ok(Transition { next, period: Keep });

    match (state, event) {
        (S::Active { .. }, E::CancelAtPeriodEnd) => {
            keep(S::Active { cancel_at_period_end: true })
        }
        (S::Active { .. }, E::CancelImmediate) => keep(S::Cancelled),
        (S::Active { .. }, E::Pause) => keep(S::Paused),

        // Un-cancel a scheduled cancellation; the period is untouched.
        (S::Active { cancel_at_period_end: true }, E::Reactivate) => {
            keep(S::Active { cancel_at_period_end: false })
        }
        (S::Paused | S::Cancelled, E::Reactivate) => Ok(Transition {
            next: S::Active { cancel_at_period_end: false },
            period: RestartFromNow,
        }),

        (S::Active { cancel_at_period_end: false }, E::SchedulePlanChange { plan_id })
        | (S::PendingDowngrade { .. }, E::SchedulePlanChange { plan_id }) => {
            keep(S::PendingDowngrade { pending_plan_id: plan_id })
        }

        (S::Active { .. } | S::PendingDowngrade { .. } | S::Paused, E::Extend { days }) => {
            Ok(Transition {
                next: state,
                period: ExtendDays(days),
            })
        }

        (S::Active { cancel_at_period_end: true }, E::PeriodBoundary) => keep(S::Cancelled),
        (S::Active { cancel_at_period_end: false }, E::PeriodBoundary) => keep(S::Expired),
        (S::PendingDowngrade { pending_plan_id }, E::PeriodBoundary) => Ok(Transition {
            next: S::Active { cancel_at_period_end: false },
            period: RestartFromBoundary { plan_id: pending_plan_id },
        }),
        (S::Paused, E::PeriodBoundary) => keep(S::Expired),

        _ => Err(InvalidTransition {
            from: state.status_str(),
            event: event.name(),
        }),
    }
}
