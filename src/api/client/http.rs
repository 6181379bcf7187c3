//! HTTP client implementation
//!
//! Sends requests to a running mock server over HTTP(S) using reqwest.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;

use super::Client;
use crate::models::{
    default_account_sid, messages_path, CreateMessageRequest, Message, ValidationError,
    MESSAGES_API_PATH,
};

/// Request timeout used when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// API client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the mock server, e.g. `http://localhost:3030`
    pub base_url: String,
    /// Account the messages are sent from
    pub account_sid: String,
    pub timeout: Duration,
    /// Log every request and failure
    pub debug: bool,
}

impl ClientConfig {
    /// Configuration with default account, timeout and logging
    ///
    /// The account SID comes from `TWILIO_ACCOUNT_SID` when it is set.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            account_sid: default_account_sid(),
            timeout: DEFAULT_TIMEOUT,
            debug: false,
        }
    }

    pub fn with_account_sid(mut self, account_sid: impl Into<String>) -> Self {
        self.account_sid = account_sid.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// Client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("baseUrl is required")]
    MissingBaseUrl,

    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Request timeout: mock server did not respond within {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Connection failed: {0}")]
    Connection(#[source] reqwest::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Mock server returned error: {status} - {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected non-JSON response: {0}")]
    UnexpectedBody(String),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// A buffered response body: JSON when it parses, raw text otherwise
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(serde_json::Value),
    Text(String),
}

impl ResponseBody {
    pub fn parse(raw: String) -> Self {
        match serde_json::from_str(&raw) {
            Ok(value) => ResponseBody::Json(value),
            Err(_) => ResponseBody::Text(raw),
        }
    }

    /// Decodes a JSON body into `T`; a text body is an error
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T, ClientError> {
        match self {
            ResponseBody::Json(value) => Ok(serde_json::from_value(value)?),
            ResponseBody::Text(text) => Err(ClientError::UnexpectedBody(text)),
        }
    }
}

/// HTTP client for the mock SMS server
#[derive(Debug, Clone)]
pub struct HttpClientImpl {
    http_client: reqwest::Client,
    config: ClientConfig,
    // scheme://host:port with the port always spelled out
    origin: String,
}

impl HttpClientImpl {
    /// Create a client; fails when the base URL is missing or unusable
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let raw = config.base_url.trim();
        if raw.is_empty() {
            return Err(ClientError::MissingBaseUrl);
        }
        let url = Url::parse(raw).map_err(|e| ClientError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
        let origin = origin_of(&url)?;

        let mut builder = reqwest::Client::builder().timeout(config.timeout);
        if let Some(addr) = ipv4_loopback(&url) {
            // Skip the dual-stack lookup so connections never stall on ::1
            builder = builder.resolve("localhost", addr);
        }
        let http_client = builder.build()?;

        Ok(Self {
            http_client,
            config,
            origin,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Absolute URL for a server path
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.origin, path)
    }

    /// Performs one round trip and buffers the body
    ///
    /// Responses outside 2xx become [`ClientError::Status`] carrying the raw body.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        form: Option<&CreateMessageRequest>,
    ) -> Result<ResponseBody, ClientError> {
        let url = self.url(path);
        if self.config.debug {
            tracing::info!("[sms-mock] {} {}", method, url);
        }

        let result = self
            .execute(method, &url, form)
            .await
            .map_err(|err| self.classify(err))
            .and_then(|(status, text)| {
                if status.is_success() {
                    Ok(ResponseBody::parse(text))
                } else {
                    Err(ClientError::Status {
                        status: status.as_u16(),
                        body: text,
                    })
                }
            });

        if let Err(err) = &result {
            if self.config.debug {
                tracing::error!("[sms-mock] Request error: {}", err);
            }
        }
        result
    }

    async fn execute(
        &self,
        method: Method,
        url: &str,
        form: Option<&CreateMessageRequest>,
    ) -> Result<(StatusCode, String), reqwest::Error> {
        let mut request = self.http_client.request(method, url);
        if let Some(form) = form {
            request = request.form(form);
        }
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        Ok((status, text))
    }

    fn classify(&self, err: reqwest::Error) -> ClientError {
        if err.is_timeout() {
            ClientError::Timeout(self.config.timeout)
        } else if err.is_connect() {
            ClientError::Connection(err)
        } else {
            ClientError::Http(err)
        }
    }
}

#[async_trait::async_trait]
impl Client for HttpClientImpl {
    async fn create(&self, params: CreateMessageRequest) -> Result<Message, ClientError> {
        let path = messages_path(&self.config.account_sid);
        self.request(Method::POST, &path, Some(&params))
            .await?
            .into_typed()
    }

    async fn list(&self) -> Result<Vec<Message>, ClientError> {
        self.request(Method::GET, MESSAGES_API_PATH, None)
            .await?
            .into_typed()
    }

    async fn clear(&self) -> Result<(), ClientError> {
        self.request(Method::DELETE, MESSAGES_API_PATH, None)
            .await?;
        Ok(())
    }
}

fn origin_of(url: &Url) -> Result<String, ClientError> {
    let invalid = |reason: &str| ClientError::InvalidBaseUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    };

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| invalid("missing port"))?;
    Ok(format!("{}://{}:{}", url.scheme(), host, port))
}

fn ipv4_loopback(url: &Url) -> Option<SocketAddr> {
    match (url.host_str(), url.port_or_known_default()) {
        (Some("localhost"), Some(port)) => Some(SocketAddr::from((Ipv4Addr::LOCALHOST, port))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn client(base_url: &str) -> HttpClientImpl {
        HttpClientImpl::new(ClientConfig::new(base_url)).unwrap()
    }

    #[test]
    fn test_missing_base_url_fails_construction() {
        for base_url in ["", "   "] {
            let err = HttpClientImpl::new(ClientConfig::new(base_url)).unwrap_err();
            assert!(matches!(err, ClientError::MissingBaseUrl), "{:?}", err);
        }
    }

    #[test]
    fn test_invalid_base_url_fails_construction() {
        for base_url in ["not a url", "ftp://example.com", "localhost:3030"] {
            let err = HttpClientImpl::new(ClientConfig::new(base_url)).unwrap_err();
            assert!(
                matches!(err, ClientError::InvalidBaseUrl { .. }),
                "{}: {:?}",
                base_url,
                err
            );
        }
    }

    #[test]
    fn test_url_spells_out_port() {
        assert_eq!(
            client("http://localhost:3030").url("/api/messages"),
            "http://localhost:3030/api/messages"
        );
        assert_eq!(
            client("http://127.0.0.1").url("/health"),
            "http://127.0.0.1:80/health"
        );
        assert_eq!(
            client("https://sms.example.com/").url("/api/messages"),
            "https://sms.example.com:443/api/messages"
        );
        assert_eq!(
            client("http://[::1]:8080").url("/api/messages"),
            "http://[::1]:8080/api/messages"
        );
    }

    #[test]
    fn test_only_localhost_is_pinned_to_ipv4() {
        let url = Url::parse("http://localhost:4000").unwrap();
        assert_eq!(
            ipv4_loopback(&url),
            Some(SocketAddr::from(([127, 0, 0, 1], 4000)))
        );
        let url = Url::parse("http://example.com:4000").unwrap();
        assert_eq!(ipv4_loopback(&url), None);
    }

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::new("http://localhost:3030");
        assert_eq!(config.timeout, Duration::from_millis(10_000));
        assert!(!config.debug);
        assert!(!config.account_sid.is_empty());

        let config = config
            .with_account_sid("AC1234567890")
            .with_timeout(Duration::from_millis(500))
            .with_debug(true);
        assert_eq!(config.account_sid, "AC1234567890");
        assert_eq!(config.timeout, Duration::from_millis(500));
        assert!(config.debug);
    }

    #[test]
    fn test_response_body_falls_back_to_text() {
        assert_eq!(
            ResponseBody::parse(r#"{"success":true}"#.to_string()),
            ResponseBody::Json(serde_json::json!({"success": true}))
        );
        assert_eq!(
            ResponseBody::parse("OK".to_string()),
            ResponseBody::Text("OK".to_string())
        );

        let err = ResponseBody::Text("OK".to_string())
            .into_typed::<Vec<Message>>()
            .unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedBody(ref text) if text == "OK"));

        let err = ResponseBody::Json(serde_json::json!({"not": "a list"}))
            .into_typed::<Vec<Message>>()
            .unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ClientError::Timeout(Duration::from_millis(250)).to_string(),
            "Request timeout: mock server did not respond within 250ms"
        );
        assert_eq!(
            ClientError::Status {
                status: 400,
                body: "{}".to_string()
            }
            .to_string(),
            "Mock server returned error: 400 - {}"
        );
        assert_eq!(ClientError::MissingBaseUrl.to_string(), "baseUrl is required");
    }
}
