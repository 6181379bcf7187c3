//! Core models for the sms-mock library
//!
//! This module contains the message record, request/response shapes and the
//! in-memory message store shared by the server and the in-process client.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// API version segment used in every provider path
pub const API_VERSION: &str = "2010-04-01";

/// Account SID used when none is configured
pub const DEFAULT_ACCOUNT_SID: &str = "AC00000000000000000000000000000000";

/// Environment variable consulted for the default account SID
pub const ACCOUNT_SID_ENV: &str = "TWILIO_ACCOUNT_SID";

/// Error code returned when `To`, `From` or `Body` is missing
pub const MISSING_FIELDS_CODE: u32 = 21211;

/// Error code returned for unexpected handler failures
pub const INTERNAL_ERROR_CODE: u32 = 20001;

/// Path of the introspection endpoints (list and clear)
pub const MESSAGES_API_PATH: &str = "/api/messages";

const SID_PREFIX: &str = "SM";
const SID_LENGTH: usize = 32;
const SID_ALPHABET: &[u8] = b"abcdef0123456789";
const BODY_PREVIEW_CHARS: usize = 50;

/// Produces message SIDs; swap it out to get deterministic identifiers in tests.
pub type SidGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Generate a random lowercase hex string of the given length
pub fn generate_random_string(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| SID_ALPHABET[rng.gen_range(0..SID_ALPHABET.len())] as char)
        .collect()
}

/// Generate a message SID: `SM` followed by 32 hex characters
pub fn generate_message_sid() -> String {
    format!("{}{}", SID_PREFIX, generate_random_string(SID_LENGTH))
}

/// The default, random SID generator
pub fn random_sid_generator() -> SidGenerator {
    Arc::new(generate_message_sid)
}

/// Whether a string has the shape of a message SID
pub fn is_message_sid(value: &str) -> bool {
    match value.strip_prefix(SID_PREFIX) {
        Some(rest) => rest.len() == SID_LENGTH && rest.bytes().all(|b| SID_ALPHABET.contains(&b)),
        None => false,
    }
}

/// Account SID from the environment, or the placeholder default
pub fn default_account_sid() -> String {
    std::env::var(ACCOUNT_SID_ENV)
        .ok()
        .filter(|sid| !sid.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ACCOUNT_SID.to_string())
}

/// Path of the message-creation endpoint for an account
pub fn messages_path(account_sid: &str) -> String {
    format!("/{}/Accounts/{}/Messages.json", API_VERSION, account_sid)
}

/// Body preview used in log lines: first 50 characters, `...` when cut
pub fn preview_body(body: &str) -> String {
    let mut chars = body.chars();
    let preview: String = chars.by_ref().take(BODY_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", preview)
    } else {
        preview
    }
}

/// Links to sub-resources of a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubresourceUris {
    pub media: String,
}

/// A simulated outbound SMS, shaped like the provider's message resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub sid: String,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
    pub date_sent: DateTime<Utc>,
    pub account_sid: String,
    pub to: String,
    pub from: String,
    pub body: String,
    pub status: String,
    pub num_segments: String,
    pub num_media: String,
    pub direction: String,
    pub api_version: String,
    pub price: Option<String>,
    pub price_unit: String,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub uri: String,
    pub subresource_uris: SubresourceUris,
}

impl Message {
    /// Builds a "sent" message from validated fields
    pub fn new(
        sid: String,
        account_sid: impl Into<String>,
        fields: NewMessage,
        now: DateTime<Utc>,
    ) -> Self {
        let account_sid = account_sid.into();
        let base = format!("/{}/Accounts/{}/Messages/{}", API_VERSION, account_sid, sid);
        Self {
            uri: format!("{}.json", base),
            subresource_uris: SubresourceUris {
                media: format!("{}/Media.json", base),
            },
            sid,
            date_created: now,
            date_updated: now,
            date_sent: now,
            account_sid,
            to: fields.to,
            from: fields.from,
            body: fields.body,
            status: "sent".to_string(),
            num_segments: "1".to_string(),
            num_media: "0".to_string(),
            direction: "outbound-api".to_string(),
            api_version: API_VERSION.to_string(),
            price: None,
            price_unit: "USD".to_string(),
            error_code: None,
            error_message: None,
        }
    }

    /// Human readable log line for a sent message
    pub fn summary(&self) -> String {
        format!(
            "[SMS SENT] To: {}, From: {}, Body: {}",
            self.to,
            self.from,
            preview_body(&self.body)
        )
    }
}

/// Request body for creating a message
///
/// Every field is optional on the wire so that a request with missing fields
/// can be answered with the provider's validation error instead of a decode
/// failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateMessageRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Accepted for compatibility; not stored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messaging_service_sid: Option<String>,
}

impl CreateMessageRequest {
    pub fn new(to: impl Into<String>, from: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: Some(to.into()),
            from: Some(from.into()),
            body: Some(body.into()),
            messaging_service_sid: None,
        }
    }

    pub fn with_messaging_service_sid(mut self, sid: impl Into<String>) -> Self {
        self.messaging_service_sid = Some(sid.into());
        self
    }

    /// Checks that `To`, `From` and `Body` are all present and non-empty
    pub fn validate(self) -> Result<NewMessage, ValidationError> {
        fn required(field: Option<String>) -> Option<String> {
            field.filter(|value| !value.is_empty())
        }

        match (required(self.to), required(self.from), required(self.body)) {
            (Some(to), Some(from), Some(body)) => Ok(NewMessage { to, from, body }),
            _ => Err(ValidationError::MissingRequiredFields),
        }
    }
}

/// The validated fields of a message about to be created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub to: String,
    pub from: String,
    pub body: String,
}

/// Validation failures for message creation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("To, From, and Body are required fields")]
    MissingRequiredFields,
}

impl ValidationError {
    /// Provider error code for this failure
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::MissingRequiredFields => MISSING_FIELDS_CODE,
        }
    }
}

/// Error payload returned by the create endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u32,
    pub message: String,
}

impl ErrorResponse {
    pub fn missing_fields(err: &ValidationError) -> Self {
        Self {
            error: "Missing required fields".to_string(),
            code: err.code(),
            message: err.to_string(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            error: "Internal server error".to_string(),
            code: INTERNAL_ERROR_CODE,
            message: message.into(),
        }
    }
}

/// Response of `DELETE /api/messages`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearMessagesResponse {
    pub success: bool,
    pub message: String,
}

impl ClearMessagesResponse {
    pub fn cleared() -> Self {
        Self {
            success: true,
            message: "All messages cleared".to_string(),
        }
    }
}

/// Response of `GET /health`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub messages: usize,
    /// Seconds since the server was started
    pub uptime: f64,
}

/// Ordered in-memory message list, most recent first
///
/// Clones share the same underlying list.
#[derive(Clone, Default)]
pub struct MessageStore {
    inner: Arc<Mutex<VecDeque<Message>>>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    // The list stays consistent even if a holder panicked, so poisoning is ignored
    fn lock(&self) -> MutexGuard<'_, VecDeque<Message>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Inserts a message at the front
    pub fn push(&self, message: Message) {
        self.lock().push_front(message);
    }

    /// Copy of all messages, most recent first
    pub fn snapshot(&self) -> Vec<Message> {
        self.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl std::fmt::Debug for MessageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageStore")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn fields(to: &str, from: &str, body: &str) -> NewMessage {
        CreateMessageRequest::new(to, from, body).validate().unwrap()
    }

    #[test]
    fn test_generated_sid_shape() {
        for _ in 0..100 {
            let sid = generate_message_sid();
            assert_eq!(sid.len(), 34);
            assert!(sid.starts_with("SM"));
            assert!(is_message_sid(&sid), "bad sid: {}", sid);
        }
    }

    #[test]
    fn test_generated_sids_are_distinct() {
        let sids: HashSet<String> = (0..1000).map(|_| generate_message_sid()).collect();
        assert_eq!(sids.len(), 1000);
    }

    #[test]
    fn test_is_message_sid_rejects_malformed() {
        assert!(!is_message_sid("SM123"));
        assert!(!is_message_sid("MM0123456789abcdef0123456789abcdef"));
        assert!(!is_message_sid("SM0123456789ABCDEF0123456789abcdef"));
        assert!(is_message_sid("SM0123456789abcdef0123456789abcdef"));
    }

    #[test]
    fn test_message_new_sets_fixed_fields() {
        let now = Utc::now();
        let sid = "SM0123456789abcdef0123456789abcdef".to_string();
        let message = Message::new(sid.clone(), "AC123", fields("+1111", "+2222", "hi"), now);

        assert_eq!(message.sid, sid);
        assert_eq!(message.account_sid, "AC123");
        assert_eq!(message.status, "sent");
        assert_eq!(message.num_segments, "1");
        assert_eq!(message.num_media, "0");
        assert_eq!(message.direction, "outbound-api");
        assert_eq!(message.api_version, "2010-04-01");
        assert_eq!(message.price, None);
        assert_eq!(message.price_unit, "USD");
        assert_eq!(message.error_code, None);
        assert_eq!(message.date_created, now);
        assert_eq!(message.date_updated, now);
        assert_eq!(message.date_sent, now);
        assert_eq!(
            message.uri,
            format!("/2010-04-01/Accounts/AC123/Messages/{}.json", sid)
        );
        assert_eq!(
            message.subresource_uris.media,
            format!("/2010-04-01/Accounts/AC123/Messages/{}/Media.json", sid)
        );
    }

    #[test]
    fn test_message_json_shape() {
        let message = Message::new(
            "SM0123456789abcdef0123456789abcdef".to_string(),
            "AC123",
            fields("+1111", "+2222", "hi"),
            Utc::now(),
        );
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["to"], "+1111");
        assert_eq!(json["from"], "+2222");
        assert_eq!(json["body"], "hi");
        assert!(json["price"].is_null());
        assert!(json["error_message"].is_null());
        assert!(json["date_created"].is_string());
        assert!(json["subresource_uris"]["media"].is_string());
    }

    #[test]
    fn test_validate_rejects_missing_or_empty_fields() {
        let cases = [
            CreateMessageRequest::default(),
            CreateMessageRequest::new("", "+2222", "hi"),
            CreateMessageRequest::new("+1111", "", "hi"),
            CreateMessageRequest::new("+1111", "+2222", ""),
            CreateMessageRequest {
                to: Some("+1111".to_string()),
                from: Some("+2222".to_string()),
                body: None,
                messaging_service_sid: Some("MG1".to_string()),
            },
        ];
        for case in cases {
            assert_eq!(
                case.clone().validate(),
                Err(ValidationError::MissingRequiredFields),
                "{:?}",
                case
            );
        }
    }

    #[test]
    fn test_request_uses_provider_field_names() {
        let request: CreateMessageRequest = serde_json::from_str(
            r#"{"To":"+1111","From":"+2222","Body":"hi","MessagingServiceSid":"MG1"}"#,
        )
        .unwrap();
        assert_eq!(request.to.as_deref(), Some("+1111"));
        assert_eq!(request.messaging_service_sid.as_deref(), Some("MG1"));

        let json = serde_json::to_value(CreateMessageRequest::new("a", "b", "c")).unwrap();
        assert_eq!(json, serde_json::json!({"To": "a", "From": "b", "Body": "c"}));
    }

    #[test]
    fn test_preview_body_truncates_long_bodies() {
        assert_eq!(preview_body("short"), "short");
        let exact = "x".repeat(50);
        assert_eq!(preview_body(&exact), exact);
        let long = "y".repeat(51);
        assert_eq!(preview_body(&long), format!("{}...", "y".repeat(50)));
        // Counts characters, not bytes
        let wide = "é".repeat(60);
        assert_eq!(preview_body(&wide), format!("{}...", "é".repeat(50)));
    }

    #[test]
    fn test_summary_names_recipient_sender_and_preview() {
        let sid = "SM0123456789abcdef0123456789abcdef".to_string();

        let short = Message::new(sid.clone(), "AC1", fields("+1111", "+2222", "hi"), Utc::now());
        assert_eq!(short.summary(), "[SMS SENT] To: +1111, From: +2222, Body: hi");

        let long_body = format!("{}tail", "a".repeat(50));
        let long = Message::new(sid, "AC1", fields("+1111", "ACME", &long_body), Utc::now());
        assert_eq!(
            long.summary(),
            format!("[SMS SENT] To: +1111, From: ACME, Body: {}...", "a".repeat(50))
        );
    }

    #[test]
    fn test_store_keeps_most_recent_first() {
        let store = MessageStore::new();
        for i in 0..3 {
            let sid = format!("SM{:032x}", i);
            store.push(Message::new(
                sid,
                "AC1",
                fields("+1", "+2", &format!("body {}", i)),
                Utc::now(),
            ));
        }
        let bodies: Vec<String> = store.snapshot().into_iter().map(|m| m.body).collect();
        assert_eq!(bodies, vec!["body 2", "body 1", "body 0"]);
        assert_eq!(store.len(), 3);

        let shared = store.clone();
        shared.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let store = MessageStore::new();
        store.push(Message::new(
            generate_message_sid(),
            "AC1",
            fields("+1", "+2", "hi"),
            Utc::now(),
        ));
        let mut copy = store.snapshot();
        copy.clear();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_messages_path() {
        assert_eq!(
            messages_path("AC42"),
            "/2010-04-01/Accounts/AC42/Messages.json"
        );
    }
}
