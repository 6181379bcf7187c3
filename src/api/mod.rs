//! API module
//!
//! This module provides the API functionality for the sms-mock tool:
//! the mock server and the clients that talk to it.

pub mod client;
pub mod server;

// Re-export commonly used types
pub use client::{Client, ClientConfig, ClientError, CoreClient, HttpClientImpl, ResponseBody};
pub use server::{serve, MockServer, ServerConfig, ServerError, DEFAULT_PORT};
