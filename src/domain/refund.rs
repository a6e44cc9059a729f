// src/domain/refund.rs
//
// Refund request workflow: pending -> approved -> processed, or
// pending -> rejected. Approving moves no money; processing does.

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundStatus {
    Pending,
    Approved,
    Rejected,
    Processed,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Pending => "pending",
            RefundStatus::Approved => "approved",
            RefundStatus::Rejected => "rejected",
            RefundStatus::Processed => "processed",
        }
    }

    /// Open requests block creation of another one for the same target.
    pub fn is_open(&self) -> bool {
        matches!(self, RefundStatus::Pending | RefundStatus::Approved)
    }
}

impl FromStr for RefundStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RefundStatus::Pending),
            "approved" => Ok(RefundStatus::Approved),
            "rejected" => Ok(RefundStatus::Rejected),
            "processed" => Ok(RefundStatus::Processed),
            other => Err(format!("unknown refund status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundAction {
    Approve,
    Reject,
    /// Refund through the gateway, then mark processed.
    Process,
    /// Record an out-of-band refund as processed (gateway refund was
    /// done manually or is unavailable).
    MarkProcessed,
}

impl RefundAction {
    pub fn name(&self) -> &'static str {
        match self {
            RefundAction::Approve => "approve",
            RefundAction::Reject => "reject",
            RefundAction::Process => "process",
            RefundAction::MarkProcessed => "mark_processed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidRefundTransition {
    pub from: &'static str,
    pub action: &'static str,
}

impl fmt::Display for InvalidRefundTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "refund action '{}' is illegal from '{}'", self.action, self.from)
    }
}

pub fn apply_action(
    status: RefundStatus,
    action: RefundAction,
) -> Result<RefundStatus, InvalidRefundTransition> {
    match (status, action) {
        (RefundStatus::Pending, RefundAction::Approve) => Ok(RefundStatus::Approved),
        (RefundStatus::Pending, RefundAction::Reject) => Ok(RefundStatus::Rejected),
        (RefundStatus::Approved, RefundAction::Process)
        | (RefundStatus::Approved, RefundAction::MarkProcessed) => Ok(RefundStatus::Processed),
        _ => Err(InvalidRefundTransition {
            from: status.as_str(),
            action: action.name(),
        }),
    }
}
