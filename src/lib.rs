//! Fairway billing - membership subscriptions for the Fairway golf app.
//!
//! Starts hosted checkouts, mirrors provider subscriptions into the record
//! store from signed webhooks, and answers tier-gated entitlement checks.

pub mod adapters;
pub mod application;
pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod ports;
