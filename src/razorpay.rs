// src/razorpay.rs
//
// Minimal client for the Razorpay REST API (https://api.razorpay.com).
// Auth: basic auth with key id / key secret. All calls carry a bounded
// timeout; a timeout surfaces as a retryable gateway error.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://api.razorpay.com";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug)]
pub enum RazorpayError {
    Http(reqwest::Error),
    Api { status: u16, body: String },
    InvalidResponse(String),
}

impl RazorpayError {
    /// Timeouts and connection drops may be retried; API rejections may not.
    pub fn is_retryable(&self) -> bool {
        match self {
            RazorpayError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

impl fmt::Display for RazorpayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RazorpayError::Http(e) if e.is_timeout() => write!(f, "gateway timeout: {e}"),
            RazorpayError::Http(e) => write!(f, "http error: {e}"),
            RazorpayError::Api { status, body } => {
                write!(f, "razorpay api error status={status} body={body}")
            }
            RazorpayError::InvalidResponse(e) => write!(f, "invalid response: {e}"),
        }
    }
}

impl From<reqwest::Error> for RazorpayError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

#[derive(Clone)]
pub struct RazorpayClient {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
    webhook_secret: String,
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct OrderResponse {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
struct CreateRefundRequest {
    amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct RefundResponse {
    pub id: String,
    pub status: String,
}

impl RazorpayClient {
    pub fn new(key_id: String, key_secret: String, webhook_secret: String) -> Self {
        let timeout = std::env::var("RAZORPAY_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let base_url = std::env::var("RAZORPAY_API_BASE")
            .unwrap_or_else(|_| DEFAULT_API_BASE.to_string());

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .expect("reqwest client");

        Self {
            http,
            base_url,
            key_id,
            key_secret,
            webhook_secret,
        }
    }

    /// Public key id, handed to the client for the checkout widget.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<OrderResponse, RazorpayError> {
        let resp = self
            .http
            .post(format!("{}/v1/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&CreateOrderRequest {
                amount: amount_minor,
                currency,
                receipt,
            })
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(RazorpayError::Api {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str::<OrderResponse>(&body)
            .map_err(|e| RazorpayError::InvalidResponse(format!("{e}; body={body}")))
    }

    pub async fn create_refund(
        &self,
        payment_id: &str,
        amount_minor: i64,
    ) -> Result<RefundResponse, RazorpayError> {
        let resp = self
            .http
            .post(format!("{}/v1/payments/{payment_id}/refund", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&CreateRefundRequest { amount: amount_minor })
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(RazorpayError::Api {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str::<RefundResponse>(&body)
            .map_err(|e| RazorpayError::InvalidResponse(format!("{e}; body={body}")))
    }

    /// Checkout confirmations are signed over `order_id|payment_id` with
    /// the key secret. This is the sole source of trust that the charge
    /// actually succeeded.
    pub fn verify_checkout_signature(
        &self,
        order_id: &str,
        payment_id: &str,
        signature_hex: &str,
    ) -> bool {
        verify_hmac_sha256_hex(
            &self.key_secret,
            format!("{order_id}|{payment_id}").as_bytes(),
            signature_hex,
        )
    }

    /// Server-to-server webhooks are signed over the raw body with the
    /// webhook secret (X-Razorpay-Signature header).
    pub fn verify_webhook_signature(&self, body: &[u8], signature_hex: &str) -> bool {
        verify_hmac_sha256_hex(&self.webhook_secret, body, signature_hex)
    }
}

pub fn sign_hmac_sha256_hex(secret: &str, data: &[u8]) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time comparison via `Mac::verify_slice`. A signature that is
/// not valid hex can never match.
pub fn verify_hmac_sha256_hex(secret: &str, data: &[u8], signature_hex: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex) else {
        return false;
    };
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(data);
    mac.verify_slice(&expected).is_ok()
}
