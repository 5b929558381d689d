//! HTTP and WebSocket API for the panel

mod auth;
pub mod health;
pub mod plugins;
pub mod websocket;

pub use auth::{LoginRequest, LoginResponse, UserResponse};
pub use plugins::{ActionRequest, MainResponse, PluginInfo, RenderRequest};

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::config::{DEFAULT_BADGE_COLOR, DEFAULT_HOST, DEFAULT_PORT};
use crate::plugins::PluginRuntime;
use crate::security::Authenticator;
use crate::session::SessionManager;

/// Header carrying the session token on REST calls
pub const TOKEN_HEADER: &str = "x-access-token";

/// Shared state for API handlers
pub struct ApiState {
    pub sessions: Arc<SessionManager>,
    pub runtime: Arc<PluginRuntime>,
    pub authenticator: Arc<dyn Authenticator>,
    pub host_name: String,
    pub host_badge_color: String,
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    sessions: Arc<SessionManager>,
    runtime: Arc<PluginRuntime>,
    authenticator: Arc<dyn Authenticator>,
    host: String,
    port: u16,
    host_name: Option<String>,
    host_badge_color: String,
    static_dir: Option<PathBuf>,
    shutdown: CancellationToken,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(
        sessions: Arc<SessionManager>,
        runtime: Arc<PluginRuntime>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            sessions,
            runtime,
            authenticator,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            host_name: None,
            host_badge_color: DEFAULT_BADGE_COLOR.to_string(),
            static_dir: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Set the bind address
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the listen port
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the host name shown on the main page
    #[must_use]
    pub fn host_name(mut self, name: impl Into<String>) -> Self {
        self.host_name = Some(name.into());
        self
    }

    /// Set the badge color shown next to the host name
    #[must_use]
    pub fn host_badge_color(mut self, color: impl Into<String>) -> Self {
        self.host_badge_color = color.into();
        self
    }

    /// Set the static files directory for serving the web UI
    #[must_use]
    pub fn static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    /// Stop serving when `token` is cancelled
    #[must_use]
    pub fn shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        let host_name = self.host_name.unwrap_or_else(|| {
            hostname::get().map_or_else(
                |_| "unknown".to_string(),
                |name| name.to_string_lossy().into_owned(),
            )
        });

        let state = Arc::new(ApiState {
            sessions: self.sessions,
            runtime: self.runtime,
            authenticator: self.authenticator,
            host_name,
            host_badge_color: self.host_badge_color,
        });

        ApiServer {
            state,
            host: self.host,
            port: self.port,
            static_dir: self.static_dir,
            shutdown: self.shutdown,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    host: String,
    port: u16,
    static_dir: Option<PathBuf>,
    shutdown: CancellationToken,
}

impl ApiServer {
    /// Build the router with all routes
    #[must_use]
    pub fn router(&self) -> Router {
        let protected = Router::new()
            .route("/api/user", get(auth::current_user).delete(auth::logout))
            .route("/api/main", get(plugins::main_page))
            .route("/api/plugins/{id}", post(plugins::render))
            .route("/api/plugins/{id}/action", post(plugins::action))
            .route_layer(from_fn_with_state(self.state.clone(), auth::require_session));

        let mut router = Router::new()
            .route("/api/login", post(auth::login))
            .merge(protected)
            .with_state(self.state.clone())
            .merge(websocket::router(self.state.clone()))
            .merge(health::router());

        // Serve static files if configured
        if let Some(static_dir) = &self.static_dir {
            let index_file = static_dir.join("index.html");
            let serve_dir = ServeDir::new(static_dir).not_found_service(ServeFile::new(&index_file));

            router = router.fallback_service(serve_dir);
            tracing::info!(path = %static_dir.display(), "serving static files");
        }

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server until the shutdown token is cancelled
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server on {addr}: {e}")))?;

        tracing::info!(%addr, "API server listening");

        let router = self.router();
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(self.shutdown.cancelled_owned())
        .await
        .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        tracing::info!("API server stopped");
        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
