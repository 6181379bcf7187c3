//! Core client implementation
//!
//! This module provides a client implementation that works on a `MessageStore`
//! directly, providing the same interface as HttpClientImpl but without HTTP overhead.

use super::{Client, ClientError};
use crate::models::{
    default_account_sid, random_sid_generator, CreateMessageRequest, Message, MessageStore,
    SidGenerator,
};

/// A client implementation that wraps a message store directly
#[derive(Clone)]
pub struct CoreClient {
    store: MessageStore,
    account_sid: String,
    sid_generator: SidGenerator,
}

impl CoreClient {
    /// Create a new CoreClient over the given store
    pub fn new(store: MessageStore) -> Self {
        Self {
            store,
            account_sid: default_account_sid(),
            sid_generator: random_sid_generator(),
        }
    }

    pub fn with_account_sid(mut self, account_sid: impl Into<String>) -> Self {
        self.account_sid = account_sid.into();
        self
    }

    pub fn with_sid_generator(mut self, sid_generator: SidGenerator) -> Self {
        self.sid_generator = sid_generator;
        self
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }
}

#[async_trait::async_trait]
impl Client for CoreClient {
    async fn create(&self, params: CreateMessageRequest) -> Result<Message, ClientError> {
        let fields = params.validate()?;
        let message = Message::new(
            (self.sid_generator)(),
            self.account_sid.clone(),
            fields,
            chrono::Utc::now(),
        );
        self.store.push(message.clone());
        tracing::info!("{}", message.summary());
        Ok(message)
    }

    async fn list(&self) -> Result<Vec<Message>, ClientError> {
        Ok(self.store.snapshot())
    }

    async fn clear(&self) -> Result<(), ClientError> {
        self.store.clear();
        Ok(())
    }
}
