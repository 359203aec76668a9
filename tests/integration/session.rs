//! Integration tests for the session control API.

use core::time::Duration;

use reqwest::StatusCode;
use serde_json::{Value, json};
use tokio::time;

use crate::common::{
    FakeYouTube, api_client, get_free_port, next_obs_text, relay_config, spawn_fake_obs,
    spawn_relay_with_config, wait_for_listening, wait_for_session_state,
};

fn url(port: u16, path: &str) -> String {
    format!("http://127.0.0.1:{port}/api/session{path}")
}

#[tokio::test]
async fn start_push_and_stop() {
    let port = get_free_port();
    let youtube_port = get_free_port();
    let obs_port = get_free_port();
    let (youtube, _youtube_guard) = FakeYouTube::spawn(youtube_port, 41).await;
    let (mut updates, _obs_guard) = spawn_fake_obs(obs_port, None).await;
    let _relay = spawn_relay_with_config(port, &relay_config(port, youtube_port, obs_port, None));
    wait_for_listening(port, 5).await;
    let client = api_client();

    let resp = client
        .post(url(port, "/start"))
        .json(&json!({"template": "{count} likes"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let status: Value = resp.json().await.unwrap();
    assert_eq!(status["state"], "running");
    assert_eq!(status["video_id"], "abc");

    assert_eq!(next_obs_text(&mut updates).await, "41 likes");
    youtube.set_likes(42);
    assert_eq!(next_obs_text(&mut updates).await, "42 likes");

    let status: Value = client.get(url(port, "")).send().await.unwrap().json().await.unwrap();
    assert_eq!(status["last_count"], 42);
    assert!(status["last_error"].is_null(), "no error expected: {status}");

    let resp = client.post(url(port, "/stop")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let status: Value = resp.json().await.unwrap();
    assert_eq!(status["state"], "stopping");

    let status = wait_for_session_state(port, "idle", 5).await;
    assert_eq!(status["last_count"], 42);

    let hits = youtube.hits();
    time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(youtube.hits(), hits, "no fetch may happen after the session stopped");

    let resp = client.post(url(port, "/stop")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn second_start_conflicts() {
    let port = get_free_port();
    let youtube_port = get_free_port();
    let obs_port = get_free_port();
    let (_youtube, _youtube_guard) = FakeYouTube::spawn(youtube_port, 1).await;
    let (_updates, _obs_guard) = spawn_fake_obs(obs_port, None).await;
    let _relay = spawn_relay_with_config(port, &relay_config(port, youtube_port, obs_port, None));
    wait_for_listening(port, 5).await;
    let client = api_client();

    let resp = client.post(url(port, "/start")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = client.post(url(port, "/start")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "a session is already running");
}

#[tokio::test]
async fn unreachable_obs_is_bad_gateway_and_stays_idle() {
    let port = get_free_port();
    let youtube_port = get_free_port();
    let obs_port = get_free_port();
    let (youtube, _youtube_guard) = FakeYouTube::spawn(youtube_port, 1).await;
    let _relay = spawn_relay_with_config(port, &relay_config(port, youtube_port, obs_port, None));
    wait_for_listening(port, 5).await;
    let client = api_client();

    let resp = client.post(url(port, "/start")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let status: Value = client.get(url(port, "")).send().await.unwrap().json().await.unwrap();
    assert_eq!(status["state"], "idle");
    assert_eq!(youtube.hits(), 0, "nothing may be fetched without a destination");

    // Once OBS is up, starting works.
    let (mut updates, _obs_guard) = spawn_fake_obs(obs_port, None).await;
    let resp = client.post(url(port, "/start")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(next_obs_text(&mut updates).await, "1");
}

#[tokio::test]
async fn invalid_start_requests_are_rejected() {
    let port = get_free_port();
    let _relay = spawn_relay_with_config(port, &relay_config(port, 1, 1, None));
    wait_for_listening(port, 5).await;
    let client = api_client();

    let resp = client
        .post(url(port, "/start"))
        .json(&json!({"template": "no placeholder"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let resp = client
        .post(url(port, "/start"))
        .json(&json!({"video_id": ""}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let resp = client
        .post(url(port, "/start"))
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn obs_password_is_checked() {
    let youtube_port = get_free_port();
    let obs_port = get_free_port();
    let (_youtube, _youtube_guard) = FakeYouTube::spawn(youtube_port, 5).await;
    let (mut updates, _obs_guard) = spawn_fake_obs(obs_port, Some("supersecretpassword")).await;
    let client = api_client();

    let wrong = get_free_port();
    let _relay_wrong = spawn_relay_with_config(
        wrong,
        &relay_config(wrong, youtube_port, obs_port, Some("guess")),
    );
    let missing = get_free_port();
    let _relay_missing =
        spawn_relay_with_config(missing, &relay_config(missing, youtube_port, obs_port, None));
    let right = get_free_port();
    let _relay_right = spawn_relay_with_config(
        right,
        &relay_config(right, youtube_port, obs_port, Some("supersecretpassword")),
    );

    for port in [wrong, missing] {
        wait_for_listening(port, 5).await;
        let resp = client.post(url(port, "/start")).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    wait_for_listening(right, 5).await;
    let resp = client.post(url(right, "/start")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(next_obs_text(&mut updates).await, "5");
}

#[tokio::test]
async fn api_outage_is_reported_and_polling_continues() {
    let port = get_free_port();
    let youtube_port = get_free_port();
    let obs_port = get_free_port();
    let (youtube, _youtube_guard) = FakeYouTube::spawn(youtube_port, 10).await;
    youtube.unavailable.store(true, core::sync::atomic::Ordering::SeqCst);
    let (mut updates, _obs_guard) = spawn_fake_obs(obs_port, None).await;
    let _relay = spawn_relay_with_config(port, &relay_config(port, youtube_port, obs_port, None));
    wait_for_listening(port, 5).await;
    let client = api_client();

    let resp = client.post(url(port, "/start")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let mut last_error = Value::Null;
    for _ in 0..30 {
        let status: Value = client.get(url(port, "")).send().await.unwrap().json().await.unwrap();
        if !status["last_error"].is_null() {
            last_error = status["last_error"].clone();
            break;
        }
        time::sleep(Duration::from_millis(100)).await;
    }
    assert!(
        last_error.as_str().unwrap().contains("503"),
        "outage should surface in the status: {last_error}"
    );
    assert_eq!(wait_for_session_state(port, "running", 1).await["state"], "running");

    youtube.unavailable.store(false, core::sync::atomic::Ordering::SeqCst);
    assert_eq!(next_obs_text(&mut updates).await, "10");
}
