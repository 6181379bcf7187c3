//! API Server module
//!
//! This module provides the HTTP mock server: the provider-compatible message
//! creation endpoint plus list/clear/health endpoints for test assertions.

use std::any::Any;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Path, Request, State},
    http::{header, HeaderMap, HeaderName, Method, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::models::{
    random_sid_generator, ClearMessagesResponse, CreateMessageRequest, ErrorResponse,
    HealthResponse, Message, MessageStore, SidGenerator, ValidationError, MESSAGES_API_PATH,
};

/// Port used when none is configured
pub const DEFAULT_PORT: u16 = 3030;

const CREATE_MESSAGE_ROUTE: &str = "/2010-04-01/Accounts/:account_sid/Messages.json";

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: IpAddr,
    /// Port to listen on; `0` picks an ephemeral port
    pub port: u16,
    /// Attach permissive CORS headers and answer every `OPTIONS` request
    pub enable_cors: bool,
    /// Directory served for `/` and any unmatched path; the built-in page is used when unset
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            enable_cors: true,
            static_dir: None,
        }
    }
}

impl ServerConfig {
    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_cors(mut self, enable_cors: bool) -> Self {
        self.enable_cors = enable_cors;
        self
    }

    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    pub fn address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Server lifecycle errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Errors a handler turns into a provider-style JSON error
#[derive(Debug)]
enum ApiError {
    Validation(ValidationError),
    Internal(String),
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(err) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::missing_fields(&err)),
            )
                .into_response(),
            ApiError::Internal(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::internal(details)),
            )
                .into_response(),
        }
    }
}

#[derive(Clone)]
struct AppState {
    store: MessageStore,
    started_at: Arc<RwLock<Instant>>,
    sid_generator: SidGenerator,
}

impl AppState {
    fn uptime(&self) -> Duration {
        match self.started_at.read() {
            Ok(started_at) => started_at.elapsed(),
            Err(poisoned) => poisoned.into_inner().elapsed(),
        }
    }

    fn reset_uptime(&self) {
        let mut started_at = match self.started_at.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *started_at = Instant::now();
    }
}

struct RunningServer {
    address: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

/// A mock SMS provider owning its own message store
///
/// The server is stopped when created; `start` binds the listener and serves
/// in a background task until `stop` is called or the server is dropped.
pub struct MockServer {
    config: ServerConfig,
    state: AppState,
    running: Mutex<Option<RunningServer>>,
}

impl MockServer {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_sid_generator(config, random_sid_generator())
    }

    /// Create a server that takes message SIDs from `sid_generator`
    pub fn with_sid_generator(config: ServerConfig, sid_generator: SidGenerator) -> Self {
        Self {
            config,
            state: AppState {
                store: MessageStore::new(),
                started_at: Arc::new(RwLock::new(Instant::now())),
                sid_generator,
            },
            running: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The request router, sharing this server's store
    ///
    /// Useful for composing into a larger application or for driving requests
    /// in-process without binding a socket.
    pub fn router(&self) -> Router {
        build_router(self.state.clone(), &self.config)
    }

    /// Starts listening and returns the bound address
    ///
    /// Starting a running server only logs a warning and returns the current address.
    pub async fn start(&self) -> Result<SocketAddr, ServerError> {
        let mut running = self.running.lock().await;
        if let Some(server) = running.as_ref() {
            tracing::warn!("Server is already running on {}", server.address);
            return Ok(server.address);
        }

        let requested = self.config.address();
        let listener = TcpListener::bind(requested)
            .await
            .map_err(|source| ServerError::Bind {
                address: requested,
                source,
            })?;
        let address = listener.local_addr()?;
        self.state.reset_uptime();

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let app = self.router();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    // Also fires when the sender is dropped with the server
                    let _ = shutdown_rx.await;
                })
                .await
        });

        tracing::info!("Mock SMS server running on http://{}", address);
        tracing::info!(
            "API endpoint: http://{}/2010-04-01/Accounts/{{AccountSid}}/Messages.json",
            address
        );
        tracing::info!("Messages: http://{}{}", address, MESSAGES_API_PATH);

        *running = Some(RunningServer {
            address,
            shutdown,
            task,
        });
        Ok(address)
    }

    /// Stops the server and releases the listener; a no-op when stopped
    pub async fn stop(&self) -> Result<(), ServerError> {
        let Some(server) = self.running.lock().await.take() else {
            return Ok(());
        };
        let _ = server.shutdown.send(());
        server.task.await??;
        tracing::info!("Server stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// The bound address while running
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|server| server.address)
    }

    /// Copy of the stored messages, most recent first
    pub fn messages(&self) -> Vec<Message> {
        self.state.store.snapshot()
    }

    pub fn clear_messages(&self) {
        self.state.store.clear();
    }

    /// Handle to the shared message store
    pub fn store(&self) -> MessageStore {
        self.state.store.clone()
    }

    /// Time since the last successful `start`, or since construction before that
    pub fn uptime(&self) -> Duration {
        self.state.uptime()
    }
}

/// Runs a mock server until Ctrl-C
pub async fn serve(config: ServerConfig) -> Result<(), ServerError> {
    let server = MockServer::new(config);
    server.start().await?;
    tokio::signal::ctrl_c().await?;
    server.stop().await
}

fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let router = Router::new()
        .route(CREATE_MESSAGE_ROUTE, post(create_message))
        .route(MESSAGES_API_PATH, get(list_messages).delete(clear_messages))
        .route("/health", get(health));

    let router = match &config.static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router.route("/", get(ui_handler)),
    };

    let router = router
        .with_state(state)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http());

    if config.enable_cors {
        router.layer(cors_layer())
    } else {
        router
    }
}

// Any OPTIONS request is answered by the layer itself before routing
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            HeaderName::from_static("x-requested-with"),
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ])
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(message) = err.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = err.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "Unknown error".to_string()
    };
    tracing::error!("Failed to handle request: {}", details);
    ApiError::Internal(details).into_response()
}

/// Message creation payload, accepted as JSON or as a urlencoded form
struct MessageForm(CreateMessageRequest);

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim_start().starts_with("application/json"))
        .unwrap_or(false)
}

#[async_trait::async_trait]
impl<S> FromRequest<S> for MessageForm
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_json(req.headers()) {
            return match Json::<CreateMessageRequest>::from_request(req, state).await {
                Ok(Json(payload)) => Ok(Self(payload)),
                // Well-formed JSON whose fields are not strings has no usable fields
                Err(JsonRejection::JsonDataError(err)) => {
                    tracing::warn!("Rejecting message with invalid fields: {}", err.body_text());
                    Err(ApiError::from(ValidationError::MissingRequiredFields).into_response())
                }
                Err(rejection) => Err(rejection.into_response()),
            };
        }

        // Anything that is not a readable form carries no fields, which
        // validation then reports as missing
        match Form::<CreateMessageRequest>::from_request(req, state).await {
            Ok(Form(payload)) => Ok(Self(payload)),
            Err(rejection) => {
                tracing::warn!(
                    "Treating unreadable message body as empty: {}",
                    rejection.body_text()
                );
                Ok(Self(CreateMessageRequest::default()))
            }
        }
    }
}

async fn create_message(
    State(state): State<AppState>,
    Path(account_sid): Path<String>,
    MessageForm(payload): MessageForm,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let fields = payload.validate()?;
    let sid = (state.sid_generator)();
    let message = Message::new(sid, account_sid, fields, chrono::Utc::now());

    state.store.push(message.clone());
    tracing::info!("{}", message.summary());

    Ok((StatusCode::CREATED, Json(message)))
}

async fn list_messages(State(state): State<AppState>) -> Json<Vec<Message>> {
    Json(state.store.snapshot())
}

async fn clear_messages(State(state): State<AppState>) -> Json<ClearMessagesResponse> {
    state.store.clear();
    Json(ClearMessagesResponse::cleared())
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        messages: state.store.len(),
        uptime: state.uptime().as_secs_f64(),
    })
}

async fn ui_handler(State(state): State<AppState>) -> Html<String> {
    Html(render_messages_page(&state.store.snapshot()))
}

fn render_messages_page(messages: &[Message]) -> String {
    let mut html = String::from(HTML_HEADER);
    html.push_str(&format!("<h1>Sent messages ({})</h1>", messages.len()));

    if messages.is_empty() {
        html.push_str("<p class='empty'>No messages yet. POST to <code>/2010-04-01/Accounts/{AccountSid}/Messages.json</code> to send one.</p>");
    } else {
        html.push_str("<table><thead><tr><th>Sent</th><th>To</th><th>From</th><th>Body</th><th>SID</th></tr></thead><tbody>");
        for message in messages {
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td class='body'>{}</td><td><code>{}</code></td></tr>",
                message.date_sent.format("%Y-%m-%d %H:%M:%S"),
                html_escape::encode_text(&message.to),
                html_escape::encode_text(&message.from),
                html_escape::encode_text(&message.body),
                html_escape::encode_text(&message.sid),
            ));
        }
        html.push_str("</tbody></table>");
    }

    html.push_str("</body></html>");
    html
}

const HTML_HEADER: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta http-equiv="refresh" content="5">
    <title>SMS Mock</title>
    <style>
        body { font-family: sans-serif; margin: 2em; color: #222; }
        table { border-collapse: collapse; width: 100%; }
        th, td { text-align: left; padding: 0.4em 0.8em; border-bottom: 1px solid #ddd; vertical-align: top; }
        td.body { white-space: pre-wrap; }
        .empty { color: #777; }
    </style>
</head>
<body>
"#;
