#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;

use axum::body::Body;
use axum::extract::ws::Message;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use medval_core::events::JobEvent;
use tempfile::{NamedTempFile, TempDir};
use tokio::sync::mpsc;
use tower::ServiceExt;

use medval_api::config::ServerConfig;
use medval_api::router::build_app_router;
use medval_api::state::AppState;

pub const BOUNDARY: &str = "medval-test-boundary";

/// Worker that reports three progress steps and writes a one-row result.
pub const SUCCESS_WORKER: &str = r#"
echo "INFO:loading $1"
echo PROGRESS:0
echo PROGRESS:50
printf '字段名,字段含义,判断结果,问题类别,清洗建议\nage,年龄,符合,,\n' > "$3"
echo PROGRESS:100
"#;

/// Build a test `ServerConfig` rooted in `root`.
///
/// The worker is `bash <script>`, so tests control its behaviour by
/// writing the script body.
pub fn test_config(root: &std::path::Path, script: &std::path::Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        upload_dir: root.join("uploads"),
        results_dir: root.join("results"),
        worker_program: "bash".to_string(),
        worker_script: script.to_string_lossy().into_owned(),
        heartbeat_interval_secs: 30,
        heartbeat_timeout_secs: 90,
        max_upload_bytes: 10 * 1024 * 1024,
    }
}

/// A fully wired application over temporary directories.
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub config: ServerConfig,
    _root: TempDir,
    _script: NamedTempFile,
}

impl TestApp {
    pub fn upload_dir(&self) -> PathBuf {
        self.config.upload_dir.clone()
    }

    pub fn results_dir(&self) -> PathBuf {
        self.config.results_dir.clone()
    }

    /// Fire a request at a fresh clone of the router.
    pub async fn request(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.request(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    /// Submit a job with the given `(field, file name, contents)` parts.
    pub async fn submit(&self, parts: &[(&str, &str, &[u8])]) -> Response<Body> {
        self.request(multipart_request("/api/upload", parts)).await
    }

    /// Register a fake observer directly with the hub.
    pub async fn observe(&self, conn_id: &str) -> mpsc::UnboundedReceiver<Message> {
        self.state.hub.register(conn_id.to_string()).await
    }
}

/// Build the full application with a bash worker running `worker_body`.
pub fn build_test_app(worker_body: &str) -> TestApp {
    build_test_app_with(worker_body, |_| {})
}

/// Like [`build_test_app`], with a hook to adjust the configuration.
pub fn build_test_app_with(worker_body: &str, adjust: impl FnOnce(&mut ServerConfig)) -> TestApp {
    let root = tempfile::tempdir().unwrap();
    let mut script = NamedTempFile::new().unwrap();
    writeln!(script, "#!/bin/bash").unwrap();
    script.write_all(worker_body.as_bytes()).unwrap();
    script.flush().unwrap();

    let mut config = test_config(root.path(), script.path());
    adjust(&mut config);
    std::fs::create_dir_all(&config.upload_dir).unwrap();
    std::fs::create_dir_all(&config.results_dir).unwrap();

    let state = AppState::from_config(config.clone());
    let app = build_app_router(state.clone());

    TestApp {
        app,
        state,
        config,
        _root: root,
        _script: script,
    }
}

/// Encode a multipart/form-data request.
pub fn multipart_request(uri: &str, parts: &[(&str, &str, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (field, file_name, data) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::post(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

/// Every job event already queued for a fake observer.
pub fn drain_events(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<JobEvent> {
    let mut events = Vec::new();
    while let Ok(message) = rx.try_recv() {
        if let Message::Text(text) = message {
            events.push(serde_json::from_str(text.as_str()).unwrap());
        }
    }
    events
}
