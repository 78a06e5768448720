//! Satisfactory game server access.
//!
//! This module contains:
//! - FRM payload types and the summaries built from them
//! - The FRM HTTP client implementing the bridge's `GameFeed` and `ServerQueries`
//! - The dedicated server API client behind the admin commands (`ServerAdmin`)

pub mod client;
pub mod server_api;
pub mod types;

// Re-export commonly used types
pub use client::FrmClient;
pub use server_api::ServerApiClient;
