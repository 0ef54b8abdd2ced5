//! Utility functions and helpers.

pub mod hash;
pub mod http;

pub use hash::hash_file;
pub use http::{HttpTransport, create_async_client};
