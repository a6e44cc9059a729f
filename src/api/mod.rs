pub mod admin;
pub mod auth;
pub mod payments;
pub mod plans;
pub mod subscriptions;
pub mod webhooks;
