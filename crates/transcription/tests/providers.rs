use std::collections::HashMap;

use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use castkit_transcription::{AudioUpload, CloudAsr, SelfHostedAsr, SpeechToText};

async fn serve(app: Router) -> (String, oneshot::Sender<()>) {
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
            .ok();
    });

    (format!("http://{addr}"), shutdown_tx)
}

async fn start_mock_asr(status: u16, body: &'static str) -> (String, oneshot::Sender<()>) {
    let app = Router::new().route(
        "/asr",
        post(move |Query(params): Query<HashMap<String, String>>| async move {
            if params.get("output").map(String::as_str) != Some("srt") {
                return (StatusCode::BAD_REQUEST, "output=srt expected").into_response();
            }
            (StatusCode::from_u16(status).unwrap(), body).into_response()
        }),
    );
    serve(app).await
}

async fn start_mock_cloud(status: u16, body: &'static str) -> (String, oneshot::Sender<()>) {
    let app = Router::new().route(
        "/v1/audio/transcriptions",
        post(move |headers: HeaderMap| async move {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            if auth != "Bearer test-key" {
                return (StatusCode::UNAUTHORIZED, "bad key").into_response();
            }
            (StatusCode::from_u16(status).unwrap(), body).into_response()
        }),
    );
    serve(app).await
}

fn upload(duration_secs: Option<f64>) -> AudioUpload {
    AudioUpload {
        bytes: b"fake audio bytes".to_vec(),
        file_name: "clip.mp3".to_string(),
        mime: "audio/mpeg".to_string(),
        duration_secs,
    }
}

#[tokio::test]
async fn given_srt_response_when_self_hosted_transcribes_then_returns_cues() {
    let body = "1\n00:00:00,000 --> 00:00:01,500\nHello\n\n2\n00:00:01,500 --> 00:00:03,000\nWorld\n";
    let (base_url, shutdown_tx) = start_mock_asr(200, body).await;

    let asr = SelfHostedAsr::new(&base_url);
    let track = asr.transcribe(&upload(Some(3.0))).await.unwrap();

    assert_eq!(track.len(), 2);
    assert_eq!(track.cues()[1].text, "World");
    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn given_base_url_with_suffix_when_self_hosted_transcribes_then_suffix_is_not_doubled() {
    let (base_url, shutdown_tx) = start_mock_asr(200, "plain words").await;

    let asr = SelfHostedAsr::new(&format!("{base_url}/asr/"));
    let track = asr.transcribe(&upload(Some(12.0))).await.unwrap();

    assert_eq!(track.len(), 1);
    assert_eq!(track.cues()[0].end_secs, 12.0);
    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn given_json_segments_when_self_hosted_transcribes_then_one_cue_per_segment() {
    let body = r#"{"text":"a b","segments":[{"start":0.0,"end":1.0,"text":"a"},{"start":1.0,"end":2.5,"text":"b"}]}"#;
    let (base_url, shutdown_tx) = start_mock_asr(200, body).await;

    let track = SelfHostedAsr::new(&base_url)
        .transcribe(&upload(None))
        .await
        .unwrap();

    assert_eq!(track.len(), 2);
    assert_eq!(track.cues()[1].end_secs, 2.5);
    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn given_server_error_when_self_hosted_transcribes_then_returns_none() {
    let (base_url, shutdown_tx) = start_mock_asr(500, "boom").await;

    assert!(SelfHostedAsr::new(&base_url)
        .transcribe(&upload(Some(1.0)))
        .await
        .is_none());
    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn given_unreachable_server_when_self_hosted_transcribes_then_returns_none() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    assert!(SelfHostedAsr::new(&format!("http://{addr}"))
        .transcribe(&upload(Some(1.0)))
        .await
        .is_none());
}

#[tokio::test]
async fn given_subtitle_model_when_cloud_transcribes_then_parses_srt() {
    let body = "1\n00:00:00,000 --> 00:00:02,000\nFrom the cloud\n";
    let (base_url, shutdown_tx) = start_mock_cloud(200, body).await;

    let asr = CloudAsr::new(
        format!("{base_url}/v1/audio/transcriptions"),
        "test-key",
        "whisper-1",
    );
    let track = asr.transcribe(&upload(Some(2.0))).await.unwrap();

    assert_eq!(track.cues()[0].text, "From the cloud");
    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn given_text_only_model_when_cloud_transcribes_then_wraps_text_in_one_cue() {
    let (base_url, shutdown_tx) = start_mock_cloud(200, r#"{"text": "whole episode"}"#).await;

    let asr = CloudAsr::new(
        format!("{base_url}/v1/audio/transcriptions"),
        "test-key",
        "gpt-4o-transcribe",
    );
    let track = asr.transcribe(&upload(Some(30.0))).await.unwrap();
    assert_eq!(track.len(), 1);
    assert_eq!(track.cues()[0].start_secs, 0.0);
    assert_eq!(track.cues()[0].end_secs, 30.0);

    let track = asr.transcribe(&upload(None)).await.unwrap();
    assert_eq!(track.cues()[0].end_secs, 1.0);
    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn given_wrong_key_when_cloud_transcribes_then_returns_none() {
    let (base_url, shutdown_tx) = start_mock_cloud(200, "unused").await;

    let asr = CloudAsr::new(
        format!("{base_url}/v1/audio/transcriptions"),
        "other-key",
        "whisper-1",
    );
    assert!(asr.transcribe(&upload(Some(1.0))).await.is_none());
    shutdown_tx.send(()).ok();
}
