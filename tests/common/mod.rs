//! Shared test utilities

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use hostpanel::api::{ApiServerBuilder, TOKEN_HEADER};
use hostpanel::config::UserConfig;
use hostpanel::events::Dispatcher;
use hostpanel::plugins::{
    ActionMap, ActionResult, BuildInfo, HostControl, Page, Plugin, PluginApi, PluginCatalog,
    PluginRuntime, Services, action, ui,
};
use hostpanel::security::{PasswordAuthenticator, hash_password};
use hostpanel::{SessionManager, SettingsStore};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower::ServiceExt;

pub const USER: &str = "admin";
pub const PASSWORD: &str = "secret";

/// Host controller that never touches the machine
#[derive(Debug, Default)]
pub struct NoopHost;

impl HostControl for NoopHost {
    fn power_off(&self) -> std::io::Result<()> {
        Ok(())
    }

    fn reboot(&self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Plugin echoing its args and request body
pub struct EchoPlugin;

#[async_trait]
impl Plugin for EchoPlugin {
    fn id(&self) -> &str {
        "echo"
    }

    fn title(&self) -> &str {
        "Echo"
    }

    fn icon(&self) -> &str {
        "repeat"
    }

    async fn run(&self, cancel: CancellationToken, _api: Arc<dyn PluginApi>) -> anyhow::Result<()> {
        cancel.cancelled().await;
        Ok(())
    }

    fn actions(&self) -> ActionMap {
        let mut actions = ActionMap::new();
        actions.insert(
            "echo".to_string(),
            action(|args, body| async move {
                ActionResult::alert(args.join("/"), String::from_utf8_lossy(&body).into_owned())
            }),
        );
        actions
    }

    fn render(&self, args: &[String]) -> Page {
        Page::new("Echo").with(ui::header(&args.join("/")))
    }
}

/// A panel wired up in memory, without a listening socket
pub struct TestPanel {
    pub router: Router,
    pub sessions: Arc<SessionManager>,
    pub runtime: Arc<PluginRuntime>,
    pub shutdown: CancellationToken,
    _dir: TempDir,
}

/// Build a panel with one user and the echo plugin running
pub fn panel() -> TestPanel {
    let dir = tempfile::tempdir().unwrap();
    let shutdown = CancellationToken::new();
    let sessions = Arc::new(SessionManager::with_system_clock(
        shutdown.clone(),
        chrono::Duration::hours(3),
    ));

    let services = Services {
        dispatcher: Dispatcher::new(Arc::clone(&sessions)),
        settings: Arc::new(SettingsStore::load(dir.path().join("settings.json")).unwrap()),
        shutdown: shutdown.clone(),
        tracker: TaskTracker::new(),
        build: BuildInfo::current(),
        host: Arc::new(NoopHost),
    };
    let runtime = Arc::new(PluginRuntime::new(services, PluginCatalog::with_builtins()));
    runtime.init_plugins(vec![Arc::new(EchoPlugin)]).unwrap();

    let authenticator = Arc::new(PasswordAuthenticator::new(vec![UserConfig {
        name: USER.to_string(),
        password_sha256: hash_password(PASSWORD),
    }]));

    let server = ApiServerBuilder::new(Arc::clone(&sessions), Arc::clone(&runtime), authenticator)
        .host_name("test-host")
        .host_badge_color("#ff0000")
        .shutdown(shutdown.clone())
        .build();

    TestPanel {
        router: server.router(),
        sessions,
        runtime,
        shutdown,
        _dir: dir,
    }
}

/// Send `req` and return the status and JSON body (`Null` when empty)
pub async fn send(router: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

/// JSON POST request
pub fn post(uri: &str, token: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header(TOKEN_HEADER, token);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Bodyless request with an optional session token
pub fn request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(TOKEN_HEADER, token);
    }
    builder.body(Body::empty()).unwrap()
}

/// Log in as the test user and return the access token
pub async fn login(router: &Router) -> String {
    let body = format!(r#"{{"login": "{USER}", "password": "{PASSWORD}"}}"#);
    let (status, json) = send(router, post("/api/login", None, &body)).await;
    assert_eq!(status, StatusCode::OK);
    json["access-token"].as_str().unwrap().to_string()
}
