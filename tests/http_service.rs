//! HTTP client tests against a mock conversion service

use futures::TryStreamExt;
use mediagrab::service::http::METADATA_ERROR;
use mediagrab::service::MediaDuration;
use mediagrab::{
    DirectorySink, DownloadConfig, DownloadEngine, HttpMediaService, MediaFormat, MediaService,
    MediagrabError, TransferOutcome, TransferPhase, TransferRequest,
};
use mockito::{Matcher, Server};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

const PAGE: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

fn engine_for(server: &Server, dir: &TempDir) -> DownloadEngine {
    let service = HttpMediaService::new(&server.url()).expect("client");
    DownloadEngine::new(
        Arc::new(service),
        Arc::new(DirectorySink::new(dir.path())),
        DownloadConfig::default(),
    )
}

#[tokio::test]
async fn test_fetch_info_parses_card() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/info")
        .match_body(Matcher::Json(json!({ "url": PAGE })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "title": "Never Gonna Give You Up",
                "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/hq.jpg",
                "duration": 213,
                "uploader": "Rick Astley"
            })
            .to_string(),
        )
        .create_async()
        .await;

    let service = HttpMediaService::new(&server.url()).expect("client");
    let info = service.fetch_info(PAGE).await.expect("info");

    mock.assert_async().await;
    assert_eq!(info.title, "Never Gonna Give You Up");
    assert_eq!(info.uploader.as_deref(), Some("Rick Astley"));
    assert_eq!(info.duration, Some(MediaDuration::Seconds(213.0)));
}

#[tokio::test]
async fn test_fetch_info_failure_is_generic() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/info")
        .with_status(400)
        .with_body(r#"{"detail":"Unsupported URL"}"#)
        .create_async()
        .await;

    let service = HttpMediaService::new(&server.url()).expect("client");
    let err = service.fetch_info(PAGE).await.unwrap_err();

    assert!(matches!(err, MediagrabError::MetadataUnavailable(_)));
    assert_eq!(err.to_string(), METADATA_ERROR);
}

#[tokio::test]
async fn test_fetch_info_rejects_malformed_json() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/info")
        .with_status(200)
        .with_body("not json")
        .create_async()
        .await;

    let service = HttpMediaService::new(&server.url()).expect("client");
    let err = service.fetch_info(PAGE).await.unwrap_err();
    assert_eq!(err.to_string(), METADATA_ERROR);
}

#[tokio::test]
async fn test_open_download_sends_request_and_streams_body() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/download")
        .match_body(Matcher::Json(json!({
            "url": PAGE,
            "format": "audio",
            "quality": "320"
        })))
        .with_status(200)
        .with_header("content-type", "audio/mpeg")
        .with_body("ID3abc")
        .create_async()
        .await;

    let service = HttpMediaService::new(&server.url()).expect("client");
    let request = TransferRequest::new(PAGE, MediaFormat::Audio, "320").expect("request");
    let response = service.open_download(&request).await.expect("response");

    assert!(response.is_success());
    let body = response.body.expect("body");
    let chunks: Vec<_> = body.try_collect().await.expect("read body");
    let payload: Vec<u8> = chunks.iter().flat_map(|c| c.iter().copied()).collect();

    mock.assert_async().await;
    assert_eq!(payload, b"ID3abc");
}

#[tokio::test]
async fn test_engine_saves_downloaded_file() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/download")
        .with_status(200)
        .with_body(vec![7u8; 4096])
        .create_async()
        .await;

    let dir = TempDir::new().expect("temp dir");
    let engine = engine_for(&server, &dir);
    let request = TransferRequest::new(PAGE, MediaFormat::Video, "720").expect("request");

    let outcome = engine
        .start_transfer(&request, Some("Clip"))
        .await
        .expect("transfer");

    let path = match outcome {
        TransferOutcome::Completed { artifact, path } => {
            assert_eq!(artifact.len(), 4096);
            path
        }
        other => panic!("expected completion, got {:?}", other),
    };
    assert_eq!(path, dir.path().join("Clip.mp4"));
    let written = tokio::fs::read(&path).await.expect("saved file");
    assert_eq!(written.len(), 4096);
    assert_eq!(engine.state().phase, TransferPhase::Completed);
}

#[tokio::test]
async fn test_engine_surfaces_service_detail() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/download")
        .with_status(429)
        .with_header("content-type", "application/json")
        .with_body(r#"{"detail":"quota exceeded"}"#)
        .create_async()
        .await;

    let dir = TempDir::new().expect("temp dir");
    let engine = engine_for(&server, &dir);
    let request = TransferRequest::new(PAGE, MediaFormat::Audio, "128").expect("request");

    let err = engine.start_transfer(&request, None).await.unwrap_err();

    match &err {
        MediagrabError::RequestRejected { status, reason } => {
            assert_eq!(*status, 429);
            assert_eq!(reason, "quota exceeded");
        }
        other => panic!("expected rejection, got {:?}", other),
    }
    assert_eq!(engine.last_error().as_deref(), Some("quota exceeded"));
    assert_eq!(engine.state().phase, TransferPhase::Failed);
}

#[tokio::test]
async fn test_engine_unreadable_error_body_uses_generic_reason() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/download")
        .with_status(500)
        .with_body("<html>Internal Server Error</html>")
        .create_async()
        .await;

    let dir = TempDir::new().expect("temp dir");
    let engine = engine_for(&server, &dir);
    let request = TransferRequest::new(PAGE, MediaFormat::Video, "1080").expect("request");

    let err = engine.start_transfer(&request, None).await.unwrap_err();
    assert_eq!(err.to_string(), "Download failed");
}

#[tokio::test]
async fn test_engine_unreachable_service_is_transfer_error() {
    // Nothing listens on the discard port
    let service = HttpMediaService::new("http://127.0.0.1:9").expect("client");
    let dir = TempDir::new().expect("temp dir");
    let engine = DownloadEngine::new(
        Arc::new(service),
        Arc::new(DirectorySink::new(dir.path())),
        DownloadConfig::default(),
    );
    let request = TransferRequest::new(PAGE, MediaFormat::Video, "1080").expect("request");

    let err = engine.start_transfer(&request, None).await.unwrap_err();
    assert!(matches!(err, MediagrabError::Transfer(_)));
    assert_eq!(engine.state().phase, TransferPhase::Failed);
}
