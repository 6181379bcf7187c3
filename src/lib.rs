//! sms-mock library crate
//!
//! A local stand-in for an SMS provider's REST API. The [`MockServer`] accepts
//! message-send requests on the provider's message path, keeps them in memory
//! and exposes `/api/messages` so tests can assert on what was "sent". The
//! [`HttpClientImpl`] speaks the same API from the other side.
//!
//! ```rust,no_run
//! use sms_mock::{Client, ClientConfig, CreateMessageRequest, HttpClientImpl, MockServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = MockServer::new(ServerConfig::default().with_port(0));
//!     let address = server.start().await?;
//!
//!     let client = HttpClientImpl::new(ClientConfig::new(format!("http://{}", address)))?;
//!     let message = client
//!         .create(CreateMessageRequest::new("+15550001111", "+15550002222", "hello"))
//!         .await?;
//!     assert_eq!(server.messages()[0].sid, message.sid);
//!
//!     server.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cli;
pub mod models;

pub use api::{
    Client, ClientConfig, ClientError, CoreClient, HttpClientImpl, MockServer, ServerConfig,
    ServerError,
};
pub use models::{CreateMessageRequest, Message, MessageStore, SidGenerator};
