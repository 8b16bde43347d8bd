//! Subtitle Server API Client
//!
//! This module provides a client for the subtitle server's REST API.

mod backend;
mod client;
mod types;

pub use backend::{AlignmentSource, ProgressBackend};
pub use client::{ApiClient, ApiError, DEFAULT_RECENT_LIMIT, MAX_RECENT_LIMIT};
pub use types::*;
