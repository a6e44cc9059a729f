pub mod api;
pub mod db;
pub mod docs;
pub mod domain;
pub mod error;
pub mod ledger;
pub mod models;
pub mod razorpay;
pub mod sweep;

use sqlx::PgPool;

use crate::razorpay::RazorpayClient;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub razorpay: RazorpayClient,
    /// Days after a completed payment during which a refund may be
    /// requested.
    pub refund_window_days: i64,
}
