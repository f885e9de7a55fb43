//! Observer client against a real server and against nothing at all.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use axum::body::Bytes;
use medval_api::config::ServerConfig;
use medval_api::jobs::{JobRequest, UploadedFile};
use medval_api::router::build_app_router;
use medval_api::state::AppState;
use medval_core::events::JobEvent;
use medval_observer::client::{ObserverClient, ObserverError};
use medval_observer::reconnect::{ConnectionState, ReconnectPolicy};
use tokio_util::sync::CancellationToken;

fn fast_policy(max_attempts: u32) -> ReconnectPolicy {
    ReconnectPolicy {
        delay: Duration::from_millis(10),
        max_attempts,
    }
}

/// A port with nothing listening on it.
async fn closed_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

// ---------------------------------------------------------------------------
// Test: an unreachable server exhausts the attempts and reports Unreachable
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unreachable_server_gives_up_after_max_attempts() {
    let port = closed_port().await;
    let client = ObserverClient::new(format!("ws://127.0.0.1:{port}/ws"), fast_policy(3));
    let mut state = client.state();

    let result = client.run(&CancellationToken::new(), |_| {}).await;

    assert_matches!(result, Err(ObserverError::Unreachable { attempts: 3, .. }));
    assert_eq!(*state.borrow_and_update(), ConnectionState::Unreachable);
}

// ---------------------------------------------------------------------------
// Test: cancellation stops the reconnect loop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancellation_stops_reconnecting() {
    let port = closed_port().await;
    let client = ObserverClient::new(
        format!("ws://127.0.0.1:{port}/ws"),
        ReconnectPolicy {
            delay: Duration::from_secs(60),
            max_attempts: 5,
        },
    );
    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), client.run(&cancel, |_| {}))
        .await
        .expect("run returns after cancel");

    assert!(result.is_ok());
    assert_eq!(
        *client.state().borrow(),
        ConnectionState::Reconnecting { attempt: 1 }
    );
}

// ---------------------------------------------------------------------------
// Test: a connected client receives events broadcast by the server
// ---------------------------------------------------------------------------

#[tokio::test]
async fn receives_job_events_from_server() {
    let root = tempfile::tempdir().unwrap();
    let script = root.path().join("worker.sh");
    std::fs::write(
        &script,
        "echo PROGRESS:25\necho PROGRESS:75\necho 'ERROR:bad header' >&2\nexit 1\n",
    )
    .unwrap();

    let config = ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".into()],
        request_timeout_secs: 30,
        upload_dir: root.path().join("uploads"),
        results_dir: root.path().join("results"),
        worker_program: "bash".into(),
        worker_script: script.to_string_lossy().into_owned(),
        heartbeat_interval_secs: 30,
        heartbeat_timeout_secs: 90,
        max_upload_bytes: 1024 * 1024,
    };
    std::fs::create_dir_all(&config.upload_dir).unwrap();
    std::fs::create_dir_all(&config.results_dir).unwrap();

    let state = AppState::from_config(config.clone());
    let app = build_app_router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = ObserverClient::new(format!("ws://{addr}/ws"), fast_policy(5));
    let events = Arc::new(Mutex::new(Vec::new()));
    let cancel = CancellationToken::new();

    let sink = Arc::clone(&events);
    let run_cancel = cancel.clone();
    let runner = tokio::spawn(async move {
        client
            .run(&run_cancel, move |event| sink.lock().unwrap().push(event))
            .await
    });

    for _ in 0..100 {
        if state.hub.connection_count().await == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(state.hub.connection_count().await, 1);

    let file = |name: &str| UploadedFile {
        file_name: name.to_string(),
        data: Bytes::from_static(b"a\n1\n"),
    };
    state
        .orchestrator
        .submit(JobRequest {
            standard: Some(file("standard.csv")),
            subject: Some(file("validation.csv")),
        })
        .await;

    for _ in 0..100 {
        if events.lock().unwrap().len() >= 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    cancel.cancel();
    assert!(runner.await.unwrap().is_ok());

    let events = events.lock().unwrap().clone();
    let progress: Vec<f64> = events
        .iter()
        .filter_map(|e| match e {
            JobEvent::Progress { progress } => Some(*progress),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![25.0, 75.0]);
    assert!(events.contains(&JobEvent::Error {
        message: "bad header".into()
    }));
}
