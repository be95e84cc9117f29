//! HTTP server accepting device info, camera frames and audio clips.
//!
//! Routes:
//!   GET  /                    → landing page
//!   GET  /probe.js            → bundled client script
//!   GET  /static/*            → files under the configured static dir
//!   GET  /api/health          → health check
//!   POST /api/device-info     → store arbitrary JSON
//!   POST /api/capture-image   → store a data-URI image as JPEG
//!   POST /api/record-audio    → store a data-URI audio clip verbatim

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{ConnectInfo, DefaultBodyLimit, State};
use axum::http::header;
use axum::response::{Html, IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use probe_common::config::Config;
use probe_common::datauri;
use probe_common::protocol::{AudioSubmission, HealthResponse, ImageSubmission, StatusResponse};
use probe_common::submission::{store_audio, store_device_info, store_image};
use probe_common::{Submission, SubmissionError, SubmissionKind, SubmissionResult};

use crate::error::ApiResult;

const INDEX_HTML: &str = include_str!("../assets/index.html");
const PROBE_JS: &str = include_str!("../assets/probe.js");

/// Shared state for route handlers.
#[derive(Clone)]
pub struct AppState {
    data_dir: PathBuf,
    static_dir: PathBuf,
    jpeg_quality: u8,
    start_time: Instant,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            static_dir: config.static_dir.clone(),
            jpeg_quality: config.jpeg_quality,
            start_time: Instant::now(),
        }
    }
}

/// Build the application router.
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    let static_files = ServeDir::new(&state.static_dir);

    Router::new()
        .route("/", get(index))
        .route("/probe.js", get(probe_script))
        .route("/api/health", get(health))
        .route("/api/device-info", post(device_info))
        .route("/api/capture-image", post(capture_image))
        .route("/api/record-audio", post(record_audio))
        .nest_service("/static", static_files)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server. Blocks until shutdown.
pub async fn run(config: &Config, shutdown: Arc<AtomicBool>) -> anyhow::Result<()> {
    let app = router(AppState::new(config), config.max_body_bytes);

    let listen_addr = config.listen_addr();
    let listener = TcpListener::bind(listen_addr).await?;
    info!("Probe HTTP server listening on http://{listen_addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_millis(250)).await;
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
        }
    })
    .await?;

    Ok(())
}

/// Run blocking disk and codec work off the async workers.
async fn blocking<T, F>(work: F) -> SubmissionResult<T>
where
    F: FnOnce() -> SubmissionResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| SubmissionError::Task(e.to_string()))?
}

/// Treat a missing, null or empty field the same way.
fn require(field: Option<String>, kind: SubmissionKind) -> SubmissionResult<String> {
    field
        .filter(|uri| !uri.is_empty())
        .ok_or(SubmissionError::MissingPayload(kind))
}

// ── route handlers ───────────────────────────────────────────────────────

async fn index(State(state): State<AppState>) -> Html<String> {
    let custom = state.static_dir.join("index.html");
    match tokio::fs::read_to_string(&custom).await {
        Ok(page) => Html(page),
        Err(_) => Html(INDEX_HTML.to_string()),
    }
}

async fn probe_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        PROBE_JS,
    )
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

async fn device_info(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(info): Json<serde_json::Value>,
) -> ApiResult<Json<StatusResponse>> {
    let submission = Submission::new(SubmissionKind::DeviceInfo, peer.ip());
    let dir = state.data_dir.clone();
    blocking(move || store_device_info(&dir, &submission, &info)).await?;

    Ok(Json(StatusResponse::new("Device info received")))
}

async fn capture_image(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(body): Json<ImageSubmission>,
) -> ApiResult<Json<StatusResponse>> {
    let uri = require(body.image, SubmissionKind::Image)?;
    debug!("Image data URI from {peer}: {} chars", uri.len());

    let submission = Submission::new(SubmissionKind::Image, peer.ip());
    let dir = state.data_dir.clone();
    let quality = state.jpeg_quality;
    let path = blocking(move || {
        let raw = datauri::decode(&uri)?;
        store_image(&dir, &submission, &raw, quality)
    })
    .await?;

    Ok(Json(StatusResponse::new(format!(
        "Image {} received and saved",
        path.display()
    ))))
}

async fn record_audio(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(body): Json<AudioSubmission>,
) -> ApiResult<Json<StatusResponse>> {
    let uri = require(body.audio, SubmissionKind::Audio)?;
    debug!("Audio data URI from {peer}: {} chars", uri.len());

    let submission = Submission::new(SubmissionKind::Audio, peer.ip());
    let dir = state.data_dir.clone();
    let path = blocking(move || {
        let raw = datauri::decode(&uri)?;
        store_audio(&dir, &submission, &raw)
    })
    .await?;

    Ok(Json(StatusResponse::new(format!(
        "Audio {} received and saved",
        path.display()
    ))))
}

// ─── tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::Path;

    use axum::body::Body;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::{Request, StatusCode};
    use base64::{engine::general_purpose, Engine as _};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct Harness {
        data: tempfile::TempDir,
        statics: tempfile::TempDir,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                data: tempfile::tempdir().unwrap(),
                statics: tempfile::tempdir().unwrap(),
            }
        }

        fn app_with_limit(&self, max_body_bytes: usize) -> Router {
            let config = Config {
                data_dir: self.data.path().to_path_buf(),
                static_dir: self.statics.path().to_path_buf(),
                ..Config::default()
            };
            router(AppState::new(&config), max_body_bytes)
                .layer(MockConnectInfo(SocketAddr::from(([10, 0, 0, 7], 41234))))
        }

        fn app(&self) -> Router {
            self.app_with_limit(Config::default().max_body_bytes)
        }

        fn stored(&self) -> Vec<PathBuf> {
            let mut files: Vec<PathBuf> = std::fs::read_dir(self.data.path())
                .unwrap()
                .map(|e| e.unwrap().path())
                .collect();
            files.sort();
            files
        }
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, body)
    }

    async fn post_json(
        app: Router,
        uri: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let req = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, bytes) = send(app, req).await;
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn file_name(path: &Path) -> String {
        path.file_name().unwrap().to_string_lossy().to_string()
    }

    fn png_data_uri() -> String {
        let img = image::RgbaImage::from_pixel(16, 9, image::Rgba([200, 40, 90, 255]));
        let mut png = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut png, image::ImageFormat::Png)
            .unwrap();
        format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode(png.into_inner())
        )
    }

    fn wav_bytes() -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut out = Cursor::new(Vec::new());
        let mut writer = hound::WavWriter::new(&mut out, spec).unwrap();
        for i in 0..1600 {
            writer.write_sample(((i * 37) % 2000) as i16).unwrap();
        }
        writer.finalize().unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn test_device_info_is_stored_verbatim() {
        let h = Harness::new();
        let info = serde_json::json!({
            "userAgent": "Mozilla/5.0",
            "screen": {"width": 1920, "height": 1080},
            "plugins": [],
            "isDarkMode": false,
            "location": null
        });

        let (status, body) = post_json(h.app(), "/api/device-info", info.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"status": "Device info received"}));

        let files = h.stored();
        assert_eq!(files.len(), 1);
        let name = file_name(&files[0]);
        assert!(name.starts_with("device_info-10.0.0.7-"), "{name}");
        assert!(name.ends_with(".json"), "{name}");

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&files[0]).unwrap()).unwrap();
        assert_eq!(saved, info);
    }

    #[tokio::test]
    async fn test_device_info_rejects_invalid_json() {
        let h = Harness::new();
        let req = Request::post("/api/device-info")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, _) = send(h.app(), req).await;
        assert!(status.is_client_error());
        assert!(h.stored().is_empty());
    }

    #[tokio::test]
    async fn test_same_second_submissions_do_not_overwrite() {
        let h = Harness::new();
        for n in 0..3 {
            let (status, _) =
                post_json(h.app(), "/api/device-info", serde_json::json!({ "n": n })).await;
            assert_eq!(status, StatusCode::OK);
        }
        assert_eq!(h.stored().len(), 3);
    }

    #[tokio::test]
    async fn test_capture_image_saves_jpeg() {
        let h = Harness::new();
        let (status, body) = post_json(
            h.app(),
            "/api/capture-image",
            serde_json::json!({ "image": png_data_uri(), "fileName": "image_x.jpg" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let files = h.stored();
        assert_eq!(files.len(), 1);
        let name = file_name(&files[0]);
        assert!(name.starts_with("10.0.0.7-") && name.ends_with("-image.jpg"), "{name}");
        assert_eq!(
            body["status"],
            format!("Image {} received and saved", files[0].display())
        );

        let jpeg = std::fs::read(&files[0]).unwrap();
        assert_eq!(image::guess_format(&jpeg).unwrap(), image::ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 9));
    }

    #[tokio::test]
    async fn test_capture_image_without_data_is_400() {
        let h = Harness::new();
        let expected = serde_json::json!({"status": "No image data received"});

        for body in [
            serde_json::json!({}),
            serde_json::json!({ "image": "" }),
            serde_json::json!({ "image": null }),
        ] {
            let (status, resp) = post_json(h.app(), "/api/capture-image", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(resp, expected);
        }
        assert!(h.stored().is_empty());
    }

    #[tokio::test]
    async fn test_capture_image_with_undecodable_bytes_is_500() {
        let h = Harness::new();
        let garbage = general_purpose::STANDARD.encode(b"this is not an image");
        let (status, resp) = post_json(
            h.app(),
            "/api/capture-image",
            serde_json::json!({ "image": format!("data:image/png;base64,{garbage}") }),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp["status"], "Internal server error");
        assert!(h.stored().is_empty());
    }

    #[tokio::test]
    async fn test_record_audio_round_trips_bytes() {
        let h = Harness::new();
        let wav = wav_bytes();
        let uri = format!(
            "data:audio/wav;base64,{}",
            general_purpose::STANDARD.encode(&wav)
        );

        let (status, body) =
            post_json(h.app(), "/api/record-audio", serde_json::json!({ "audio": uri })).await;
        assert_eq!(status, StatusCode::OK);

        let files = h.stored();
        assert_eq!(files.len(), 1);
        let name = file_name(&files[0]);
        assert!(name.starts_with("10.0.0.7-") && name.ends_with("-audio.wav"), "{name}");
        assert_eq!(
            body["status"],
            format!("Audio {} received and saved", files[0].display())
        );
        assert_eq!(std::fs::read(&files[0]).unwrap(), wav);
    }

    #[tokio::test]
    async fn test_record_audio_keeps_non_wav_payloads() {
        let h = Harness::new();
        let webm = [0x1a, 0x45, 0xdf, 0xa3, 0x9f, 0x42, 0x86, 0x81];
        let uri = format!(
            "data:audio/webm;codecs=opus;base64,{}",
            general_purpose::STANDARD.encode(webm)
        );
        let (status, _) =
            post_json(h.app(), "/api/record-audio", serde_json::json!({ "audio": uri })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(std::fs::read(&h.stored()[0]).unwrap(), webm);
    }

    #[tokio::test]
    async fn test_record_audio_without_data_is_400() {
        let h = Harness::new();
        let (status, resp) = post_json(h.app(), "/api/record-audio", serde_json::json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp, serde_json::json!({"status": "No audio data received"}));
    }

    #[tokio::test]
    async fn test_record_audio_with_bad_base64_is_500() {
        let h = Harness::new();
        let (status, _) = post_json(
            h.app(),
            "/api/record-audio",
            serde_json::json!({ "audio": "data:audio/wav;base64,***" }),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, _) = post_json(
            h.app(),
            "/api/record-audio",
            serde_json::json!({ "audio": "no comma here" }),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(h.stored().is_empty());
    }

    #[tokio::test]
    async fn test_body_limit() {
        let h = Harness::new();
        let big = "A".repeat(4096);
        let (status, _) = post_json(
            h.app_with_limit(1024),
            "/api/record-audio",
            serde_json::json!({ "audio": format!("data:,{big}") }),
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_index_is_html() {
        let h = Harness::new();
        let resp = h
            .app()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let ct = resp.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(ct.starts_with("text/html"), "{ct}");

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8_lossy(&body).contains("/probe.js"));
    }

    #[tokio::test]
    async fn test_index_override_and_static_files() {
        let h = Harness::new();
        std::fs::write(h.statics.path().join("index.html"), "<h1>custom</h1>").unwrap();
        std::fs::write(h.statics.path().join("app.css"), "body{}").unwrap();

        let (status, body) = send(h.app(), Request::get("/").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"<h1>custom</h1>");

        let (status, body) =
            send(h.app(), Request::get("/static/app.css").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"body{}");
    }

    #[tokio::test]
    async fn test_probe_script_and_health() {
        let h = Harness::new();
        let (status, body) =
            send(h.app(), Request::get("/probe.js").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8_lossy(&body).contains("/api/record-audio"));

        let (status, body) =
            send(h.app(), Request::get("/api/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        let health: HealthResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(health.status, "ok");
    }
}
