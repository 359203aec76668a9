//! Common utilities for integration tests.
//!
//! This module provides shared functions and types used across multiple integration test modules,
//! such as spawning the relay, faking the YouTube API and OBS, and waiting for services to be ready.

use alloc::sync::Arc;
use core::{
    sync::atomic::{AtomicBool, AtomicU16, AtomicU64, AtomicUsize, Ordering},
    time::Duration,
};
use std::{collections::HashMap, env, fs, time::Instant};

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use clap::Parser as _;
use futures::{SinkExt as _, StreamExt as _};
use likesync_common::obs::{
    self, AuthChallenge, Envelope, Hello, Identified, Identify, Request, RequestResponse,
    RequestStatus, SetInputSettings, op,
};
use likesync_relay::cli::Cli;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc,
    task,
    time::{self, timeout},
};
use tokio_tungstenite::{
    WebSocketStream, accept_async,
    tungstenite::{
        Message,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};

/// API key the fake API accepts.
pub(crate) const API_KEY: &str = "test-key";
/// The only video the fake API knows.
pub(crate) const VIDEO_ID: &str = "abc";

static NEXT_PORT: AtomicU16 = AtomicU16::new(18000);

pub(crate) fn get_free_port() -> u16 {
    NEXT_PORT.fetch_add(1, Ordering::SeqCst)
}

/// Guard that aborts a spawned relay or fake server when dropped.
pub(crate) struct KillOnDrop(pub task::JoinHandle<()>);

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub(crate) fn api_client() -> reqwest::Client {
    likesync_relay::install_crypto_provider();
    reqwest::Client::new()
}

/// Renders a relay config pointing at the fake API and fake OBS.
pub(crate) fn relay_config(
    port: u16,
    youtube_port: u16,
    obs_port: u16,
    obs_password: Option<&str>,
) -> String {
    let password = obs_password
        .map(|p| format!("password = \"{p}\""))
        .unwrap_or_default();
    format!(
        r#"
        [server]
        port = {port}
        bind = "127.0.0.1"

        [source]
        api_key = "{API_KEY}"
        video_id = "{VIDEO_ID}"
        api_base = "http://127.0.0.1:{youtube_port}"
        request_timeout_secs = 2

        [destination]
        endpoint = "127.0.0.1:{obs_port}"
        {password}

        [polling]
        interval_secs = 1
        error_delay_secs = 1
        "#
    )
}

/// Writes `config_toml` to a temp file and returns its path.
fn write_config(name: &str, port: u16, config_toml: &str) -> String {
    let tmp = env::temp_dir().join(format!("likesync_{name}_{port}.toml"));
    fs::write(&tmp, config_toml).expect("failed to write config");
    tmp.to_str().unwrap().to_string()
}

fn spawn_cli(cli: Cli) -> KillOnDrop {
    let handle = tokio::spawn(async move {
        // SAFETY: This is only used in integration tests and no user-facing code. It just tells the relay to log less verbose output.
        unsafe {
            env::set_var("LIKESYNC_INTEGRATION_TEST", "1");
        }
        likesync_relay::inner_main(cli)
            .await
            .expect("inner_main failed");
    });
    KillOnDrop(handle)
}

/// Spawn the relay service from a given config string.
pub(crate) fn spawn_relay_with_config(port: u16, config_toml: &str) -> KillOnDrop {
    let path = write_config("service", port, config_toml);
    spawn_cli(Cli::parse_from(["likesync", "serve", "--config", &path]))
}

/// Spawn a headless session from a given config string.
pub(crate) fn spawn_headless_with_config(port: u16, config_toml: &str) -> KillOnDrop {
    let path = write_config("headless", port, config_toml);
    spawn_cli(Cli::parse_from(["likesync", "run", "--config", &path]))
}

/// Block until a TCP listener is accepting on `127.0.0.1:port` or timeout.
pub(crate) async fn wait_for_listening(port: u16, timeout_secs: u64) {
    let start = Instant::now();
    while TcpStream::connect(("127.0.0.1", port)).await.is_err() {
        assert!(
            start.elapsed() <= Duration::from_secs(timeout_secs),
            "server did not start within timeout"
        );
        time::sleep(Duration::from_millis(100)).await;
    }
}

/// Polls `GET /api/session` until the state matches `state` or timeout.
pub(crate) async fn wait_for_session_state(port: u16, state: &str, timeout_secs: u64) -> Value {
    let client = api_client();
    let url = format!("http://127.0.0.1:{port}/api/session");
    let start = Instant::now();
    loop {
        let status: Value = client.get(&url).send().await.unwrap().json().await.unwrap();
        if status["state"] == state {
            return status;
        }
        assert!(
            start.elapsed() <= Duration::from_secs(timeout_secs),
            "session did not reach state {state}, last status: {status}"
        );
        time::sleep(Duration::from_millis(100)).await;
    }
}

/// Minimal stand-in for `GET /videos?part=statistics` of the YouTube Data API.
#[derive(Clone, Default)]
pub(crate) struct FakeYouTube {
    pub likes: Arc<AtomicU64>,
    pub hits: Arc<AtomicUsize>,
    pub unavailable: Arc<AtomicBool>,
}

impl FakeYouTube {
    pub(crate) async fn spawn(port: u16, likes: u64) -> (Self, KillOnDrop) {
        let fake = Self::default();
        fake.set_likes(likes);
        let app = Router::new()
            .route("/videos", get(videos))
            .with_state(fake.clone());
        let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (fake, KillOnDrop(handle))
    }

    pub(crate) fn set_likes(&self, likes: u64) {
        self.likes.store(likes, Ordering::SeqCst);
    }

    pub(crate) fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn videos(
    State(fake): State<FakeYouTube>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    fake.hits.fetch_add(1, Ordering::SeqCst);
    if params.get("key").map(String::as_str) != Some(API_KEY) {
        let body = json!({"error": {
            "code": 400,
            "message": "API key not valid. Please pass a valid API key.",
            "errors": [{"reason": "keyInvalid"}],
        }});
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    }
    if fake.unavailable.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    if params.get("id").map(String::as_str) != Some(VIDEO_ID) {
        return Json(json!({"items": []})).into_response();
    }
    let likes = fake.likes.load(Ordering::SeqCst);
    Json(json!({"items": [{
        "id": VIDEO_ID,
        "statistics": {"viewCount": "1000", "likeCount": likes.to_string()},
    }]}))
    .into_response()
}

const OBS_SALT: &str = "lM1GncleQOaCu9lT1yeUZhFYnqhsLLP1G5lAGo3ixaI=";
const OBS_CHALLENGE: &str = "+IxH4CnCiqpX1rM9scsNynZzbOe4KhDeYcTNS3PDaeY=";

/// Spawns a fake obs-websocket server. Every `SetInputSettings` it receives is forwarded
/// to the returned channel.
pub(crate) async fn spawn_fake_obs(
    port: u16,
    password: Option<&str>,
) -> (mpsc::UnboundedReceiver<SetInputSettings>, KillOnDrop) {
    let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    let password = password.map(|p| Arc::new(SecretString::from(p)));
    let handle = tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let tx = tx.clone();
            let password = password.clone();
            tokio::spawn(async move {
                let socket = accept_async(stream).await.unwrap();
                serve_obs_connection(socket, password.as_deref(), &tx).await;
            });
        }
    });
    (rx, KillOnDrop(handle))
}

async fn send_frame(socket: &mut WebSocketStream<TcpStream>, op: u8, d: impl serde::Serialize) {
    let json = serde_json::to_string(&Envelope::new(op, d)).unwrap();
    socket.send(Message::Text(json.into())).await.unwrap();
}

async fn next_frame(socket: &mut WebSocketStream<TcpStream>) -> Option<Envelope> {
    while let Some(Ok(msg)) = socket.next().await {
        if let Message::Text(text) = msg {
            return Some(serde_json::from_str(text.as_str()).unwrap());
        }
    }
    None
}

async fn serve_obs_connection(
    mut socket: WebSocketStream<TcpStream>,
    password: Option<&SecretString>,
    updates: &mpsc::UnboundedSender<SetInputSettings>,
) {
    let challenge = AuthChallenge {
        challenge: OBS_CHALLENGE.to_string(),
        salt: OBS_SALT.to_string(),
    };
    let hello = Hello {
        obs_web_socket_version: Some("5.5.0".to_string()),
        rpc_version: obs::RPC_VERSION,
        authentication: password.map(|_| challenge.clone()),
    };
    send_frame(&mut socket, op::HELLO, hello).await;

    let Some(identify) = next_frame(&mut socket).await else {
        return;
    };
    assert_eq!(identify.op, op::IDENTIFY, "expected Identify");
    let identify: Identify = serde_json::from_value(identify.d).unwrap();
    if let Some(password) = password {
        let expected = obs::authentication_string(password, &challenge);
        if identify.authentication.as_deref() != Some(expected.as_str()) {
            let frame = CloseFrame {
                code: CloseCode::Library(4009),
                reason: "Authentication failed.".into(),
            };
            drop(socket.close(Some(frame)).await);
            return;
        }
    }
    send_frame(
        &mut socket,
        op::IDENTIFIED,
        Identified {
            negotiated_rpc_version: obs::RPC_VERSION,
        },
    )
    .await;

    while let Some(frame) = next_frame(&mut socket).await {
        if frame.op != op::REQUEST {
            continue;
        }
        let request: Request = serde_json::from_value(frame.d).unwrap();
        let known = request.request_type == "SetInputSettings";
        if known {
            let settings: SetInputSettings =
                serde_json::from_value(request.request_data.unwrap()).unwrap();
            drop(updates.send(settings));
        }
        let response = RequestResponse {
            request_type: request.request_type,
            request_id: request.request_id,
            request_status: RequestStatus {
                result: known,
                code: if known {
                    obs::REQUEST_STATUS_SUCCESS
                } else {
                    204
                },
                comment: None,
            },
            response_data: None,
        };
        send_frame(&mut socket, op::REQUEST_RESPONSE, response).await;
    }
}

/// Waits for the next update the fake OBS received and returns the written text.
pub(crate) async fn next_obs_text(updates: &mut mpsc::UnboundedReceiver<SetInputSettings>) -> String {
    let settings = timeout(Duration::from_secs(5), updates.recv())
        .await
        .expect("no update reached OBS in time")
        .expect("fake OBS stopped");
    assert_eq!(settings.input_name, likesync_common::DEFAULT_INPUT_NAME);
    settings.input_settings["text"].as_str().unwrap().to_string()
}
