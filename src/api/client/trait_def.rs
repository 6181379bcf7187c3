//! Client trait definition
//!
//! This module defines the `Client` trait that abstracts over different client implementations.

use super::ClientError;
use crate::models::{CreateMessageRequest, Message};

/// Trait defining the messages API of the mock SMS service
#[async_trait::async_trait]
pub trait Client {
    /// Send a message; resolves to the created message
    async fn create(&self, params: CreateMessageRequest) -> Result<Message, ClientError>;

    /// All stored messages, most recent first
    async fn list(&self) -> Result<Vec<Message>, ClientError>;

    /// Remove every stored message
    async fn clear(&self) -> Result<(), ClientError>;
}
