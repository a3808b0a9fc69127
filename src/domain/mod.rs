//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors)
//! - `billing` - Subscription mirror, tier derivation and entitlements

pub mod billing;
pub mod foundation;
