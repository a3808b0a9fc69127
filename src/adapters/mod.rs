//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `stripe` - billing provider over the Stripe REST API
//! - `postgrest` - record store over a hosted PostgREST endpoint
//! - `postgres` - record store over a direct PostgreSQL connection
//! - `memory` - in-process provider and store for tests and development
//! - `http` - axum routes, handlers and middleware

pub mod http;
pub mod memory;
pub mod postgres;
pub mod postgrest;
pub mod stripe;

mod rows;
