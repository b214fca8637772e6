//! GitHub REST API access.
//!
//! This module provides the HTTP transport seam, the retrying client with
//! shared rate-limit handling, and the payload types the pipeline reads.

pub mod client;
pub mod pagination;
pub mod rate_limit;
pub mod transport;
pub mod types;

pub use client::{ApiClient, ClientOptions};
pub use transport::ReqwestTransport;
