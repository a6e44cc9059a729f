// src/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::period::PlanInterval;
use crate::domain::refund::RefundStatus;
use crate::domain::state::{StateDecodeError, SubscriptionState};

#[derive(Debug, Clone, Serialize)]
pub struct PricingPlan {
    pub id: i32,
    pub name: String,
    pub price_minor: i64,
    pub currency: String,
    pub interval: String, // month | year | lifetime
    pub allow_downloads: bool,
    pub allow_offline: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl PricingPlan {
    pub fn interval(&self) -> Result<PlanInterval, String> {
        PlanInterval::from_str(&self.interval)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub id: i32,
    pub user_id: i32,
    pub plan_id: i32,
    pub status: String,
    pub amount_minor: i64,
    pub currency: String,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub cancel_at_period_end: bool,
    pub pending_plan_id: Option<i32>,
    pub provider_subscription_id: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn state(&self) -> Result<SubscriptionState, StateDecodeError> {
        SubscriptionState::decode(&self.status, self.cancel_at_period_end, self.pending_plan_id)
    }

    /// Write a state back into the row's relational fields.
    pub fn set_state(&mut self, state: SubscriptionState, now: DateTime<Utc>) {
        self.status = state.status_str().to_string();
        self.cancel_at_period_end = state.cancel_at_period_end();
        self.pending_plan_id = state.pending_plan_id();
        if matches!(state, SubscriptionState::Cancelled) && self.cancelled_at.is_none() {
            self.cancelled_at = Some(now);
        }
    }
}

/// What a charge was for. Dispatch on this is exhaustive, so adding a
/// kind forces every match site to be updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    Purchase,
    Subscription,
    SubscriptionRenewal,
    Merch,
    Upgrade,
    Downgrade,
}

impl PaymentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentKind::Purchase => "purchase",
            PaymentKind::Subscription => "subscription",
            PaymentKind::SubscriptionRenewal => "subscription_renewal",
            PaymentKind::Merch => "merch",
            PaymentKind::Upgrade => "upgrade",
            PaymentKind::Downgrade => "downgrade",
        }
    }
}

impl FromStr for PaymentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase" => Ok(PaymentKind::Purchase),
            "subscription" => Ok(PaymentKind::Subscription),
            "subscription_renewal" => Ok(PaymentKind::SubscriptionRenewal),
            "merch" => Ok(PaymentKind::Merch),
            "upgrade" => Ok(PaymentKind::Upgrade),
            "downgrade" => Ok(PaymentKind::Downgrade),
            other => Err(format!("unknown payment kind '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: i32,
    pub user_id: i32,
    pub subscription_id: Option<i32>,
    pub plan_id: Option<i32>,
    pub podcast_id: Option<i32>,
    pub merch_order_id: Option<i32>,
    pub kind: String,
    pub amount_minor: i64,
    pub currency: String,
    pub status: String, // pending | completed | failed | refunded | authorized
    pub provider: String,
    pub provider_order_id: String,
    pub provider_payment_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn kind(&self) -> Result<PaymentKind, String> {
        PaymentKind::from_str(&self.kind)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RefundRequest {
    pub id: i32,
    pub user_id: i32,
    pub subscription_id: Option<i32>,
    pub payment_id: Option<i32>,
    pub amount_minor: i64,
    pub currency: String,
    pub reason: Option<String>,
    pub status: String,
    pub admin_notes: Option<String>,
    pub provider_refund_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl RefundRequest {
    pub fn status(&self) -> Result<RefundStatus, String> {
        RefundStatus::from_str(&self.status)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MerchOrder {
    pub id: i32,
    pub user_id: i32,
    pub status: String, // created | paid | shipped
    pub total_minor: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}
