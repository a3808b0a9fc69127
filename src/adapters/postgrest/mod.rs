//! Hosted record store over PostgREST.
//!
//! Used when `store.url` is an `http(s)://` endpoint. Requests authenticate
//! with the service-role key, which bypasses row-level security.

mod client;
mod query;
mod record_store;
#[cfg(test)]
mod test_gateway;

pub use client::PostgrestClient;
pub use query::Query;
pub use record_store::PostgrestRecordStore;
