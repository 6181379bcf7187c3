//! Client module
//!
//! This module provides client functionality to interact with the mock SMS server,
//! either over HTTP or directly against a message store.

mod core;
mod http;
mod trait_def;

// Re-export the trait and types
pub use core::CoreClient;
pub use http::{ClientConfig, ClientError, HttpClientImpl, ResponseBody, DEFAULT_TIMEOUT};
pub use trait_def::Client;
