//! Local State Storage
//!
//! Typed key-value storage for session state and preferences.

mod kv;
mod session;

pub use kv::{FileStore, KeyValueStore, MemoryStore};
pub use session::*;
