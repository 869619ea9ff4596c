use axum::body::{to_bytes, Body};
use axum::extract::{Query, State};
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use statboard::config::{Config, RemoteConfig, SourceConfig};
use statboard::data::Dataset;
use statboard::error::DashboardError;
use statboard::page::{render_page, Page, PanelOutcome, WidgetState};
use statboard::server::{router, AppState};
use statboard::source::{direct_download_url, DatasetCache};
use statboard::stats::CorrelationMatrix;
use statboard::theme::Theme;
use statboard::RenderOptions;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "statboard-test-boundary";

fn fixture(name: &str) -> String {
    fs::read_to_string(format!("test/{}", name)).expect("Failed to read test CSV")
}

fn small_render() -> RenderOptions {
    RenderOptions {
        width: 400,
        height: 300,
        pair_cell: 120,
    }
}

/// Check if bytes are a valid PNG
fn is_valid_png(bytes: &[u8]) -> bool {
    bytes.len() > 8 && bytes[0..8] == [137, 80, 78, 71, 13, 10, 26, 10]
}

fn upload_app(dir: &Path) -> Router {
    let config = Config {
        app_data_dir: dir.join("app_data"),
        video_dir: dir.join("videos"),
        render: small_render(),
        ..Config::default()
    };
    router(AppState::new(&config).unwrap())
}

fn multipart_body(file_name: &str, bytes: &[u8], page: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(page) = page {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"page\"\r\n\r\n{page}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             Content-Type: text/csv\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(file_name: &str, bytes: &[u8], page: Option<&str>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(file_name, bytes, page)))
        .unwrap()
}

async fn send_get(app: &Router, uri: &str) -> Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

#[test]
fn test_univariate_renders_four_panels() {
    let dataset = Dataset::from_csv_str(&fixture("penguins.csv")).unwrap();
    let page = render_page(
        Page::Univariate,
        Some(&dataset),
        &WidgetState::default(),
        &small_render(),
        &Theme::default(),
    )
    .unwrap();

    assert_eq!(page.panels.len(), 4);
    for panel in &page.panels {
        let figure = panel.figure().expect("panel should hold a figure");
        assert!(is_valid_png(&figure.png));
    }
    let titles: Vec<&str> = page
        .panels
        .iter()
        .filter_map(|p| p.figure())
        .map(|f| f.title.as_str())
        .collect();
    assert_eq!(
        titles,
        vec![
            "Histogram of bill_length_mm",
            "Countplot of species",
            "Pie Chart of species",
            "Boxplot of bill_length_mm"
        ]
    );
}

#[test]
fn test_numeric_only_omits_category_panels() {
    let dataset = Dataset::from_csv_str(&fixture("numeric_only.csv")).unwrap();
    let page = render_page(
        Page::Univariate,
        Some(&dataset),
        &WidgetState::default(),
        &small_render(),
        &Theme::default(),
    )
    .unwrap();
    assert_eq!(page.panels.len(), 2);
    assert!(page.panels.iter().all(|p| p.figure().is_some()));
}

#[test]
fn test_text_only_multivariate_reports_errors() {
    let dataset = Dataset::from_csv_str(&fixture("text_only.csv")).unwrap();
    let page = render_page(
        Page::Multivariate,
        Some(&dataset),
        &WidgetState::default(),
        &small_render(),
        &Theme::default(),
    )
    .unwrap();
    assert_eq!(page.panels.len(), 2);
    for panel in &page.panels {
        assert!(matches!(panel.outcome, PanelOutcome::Error(_)));
    }
}

#[test]
fn test_correlation_matrix_symmetric_and_masked() {
    let dataset = Dataset::from_csv_str(&fixture("penguins.csv")).unwrap();
    let columns = dataset.classify().numeric_columns;
    let matrix = CorrelationMatrix::compute(&dataset, &columns).unwrap();

    assert!(matrix.is_symmetric());
    let n = matrix.len();
    assert_eq!(n, 4);
    for i in 0..n {
        for j in 0..n {
            assert_eq!(matrix.is_masked(i, j), j > i);
        }
    }
    assert_eq!(matrix.visible_cells().count(), n * (n + 1) / 2);
}

#[tokio::test]
async fn test_root_redirects_to_welcome() {
    let dir = tempfile::tempdir().unwrap();
    let app = upload_app(dir.path());
    let response = send_get(&app, "/").await;
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/page/welcome");
}

#[tokio::test]
async fn test_unknown_page_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let app = upload_app(dir.path());
    let response = send_get(&app, "/page/settings").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_page_without_dataset_prompts_upload() {
    let dir = tempfile::tempdir().unwrap();
    let app = upload_app(dir.path());
    let response = send_get(&app, "/page/univariate").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Please upload a dataset to proceed."));
    assert!(html.contains("action=\"/upload\""));
    assert!(!html.contains("data:image/png"));
}

#[tokio::test]
async fn test_upload_stages_bytes_and_renders() {
    let dir = tempfile::tempdir().unwrap();
    let app = upload_app(dir.path());
    let csv = fixture("penguins.csv");

    let response = app
        .clone()
        .oneshot(upload_request("penguins.csv", csv.as_bytes(), Some("bivariate")))
        .await
        .unwrap();
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/page/bivariate?dataset=penguins.csv");

    let staged = fs::read(dir.path().join("app_data/penguins.csv")).unwrap();
    assert_eq!(staged, csv.as_bytes());

    let response = send_get(&app, "/page/bivariate?dataset=penguins.csv").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Dataset &#39;penguins.csv&#39; Loaded Successfully!"));
    assert_eq!(html.matches("data:image/png;base64,").count(), 4);
    assert!(html.contains("Bar Plot: species vs bill_length_mm"));
}

#[tokio::test]
async fn test_upload_rejects_non_csv() {
    let dir = tempfile::tempdir().unwrap();
    let app = upload_app(dir.path());
    let response = app
        .clone()
        .oneshot(upload_request("notes.txt", b"hello", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_dataset_reported_inline() {
    let dir = tempfile::tempdir().unwrap();
    let app = upload_app(dir.path());
    let response = send_get(&app, "/page/univariate?dataset=ghost.csv").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Failed to load dataset &#39;ghost.csv&#39;"));
}

#[tokio::test]
async fn test_widget_state_from_query() {
    let dir = tempfile::tempdir().unwrap();
    let app = upload_app(dir.path());
    app.clone()
        .oneshot(upload_request("penguins.csv", fixture("penguins.csv").as_bytes(), None))
        .await
        .unwrap();

    let html = body_text(
        send_get(
            &app,
            "/page/univariate?dataset=penguins.csv&hist=body_mass_g&pie=island&top_n=3",
        )
        .await,
    )
    .await;
    assert!(html.contains("alt=\"Histogram of body_mass_g\""));
    assert!(html.contains("alt=\"Pie Chart of island\""));
    assert!(html.contains("<output>3</output>"));

    let html = body_text(
        send_get(&app, "/page/multivariate?dataset=penguins.csv&_multi=pair").await,
    )
    .await;
    assert!(html.contains("Please select at least one column for the Pairplot."));
    assert!(html.contains("alt=\"Correlation Heatmap\""));
}

#[tokio::test]
async fn test_schema_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let app = upload_app(dir.path());
    app.clone()
        .oneshot(upload_request("penguins.csv", fixture("penguins.csv").as_bytes(), None))
        .await
        .unwrap();

    let response = send_get(&app, "/api/schema?dataset=penguins.csv").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["rows"], 15);
    assert_eq!(json["numeric_columns"].as_array().unwrap().len(), 4);
    assert_eq!(
        json["categorical_columns"],
        serde_json::json!(["species", "island", "sex"])
    );
    assert_eq!(json["columns"][0]["kind"], "categorical");

    let response = send_get(&app, "/api/schema").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_welcome_sample_and_videos() {
    let dir = tempfile::tempdir().unwrap();
    let app = upload_app(dir.path());

    let html = body_text(send_get(&app, "/page/welcome").await).await;
    assert!(html.contains("your uploaded dataset"));
    assert!(html.contains("No CSV file found"));
    assert!(html.contains("No videos found"));
    assert_eq!(send_get(&app, "/sample").await.status(), StatusCode::NOT_FOUND);

    fs::write(dir.path().join("videos/tour.mp4"), b"not really a video").unwrap();
    fs::write(dir.path().join("app_data/b.csv"), "x\n1\n").unwrap();
    fs::write(dir.path().join("app_data/a.csv"), "y\n2\n").unwrap();

    let html = body_text(send_get(&app, "/page/welcome?dataset=b.csv").await).await;
    assert!(html.contains("href=\"/sample?dataset=b.csv\""));
    assert!(html.contains("src=\"/videos/tour.mp4\""));

    let response = send_get(&app, "/sample").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"a.csv\""
    );
    assert_eq!(body_text(response).await, "y\n2\n");

    let response = send_get(&app, "/videos/tour.mp4").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(send_get(&app, "/videos/missing.mp4").await.status(), StatusCode::NOT_FOUND);
}

/// Stand-in for the file host: serves one CSV under id `good`, 404 otherwise
async fn serve_remote_files() -> (String, Arc<AtomicUsize>) {
    async fn download(
        State(hits): State<Arc<AtomicUsize>>,
        Query(query): Query<HashMap<String, String>>,
    ) -> Response {
        hits.fetch_add(1, Ordering::SeqCst);
        match query.get("id").map(String::as_str) {
            Some("good") => fs::read_to_string("test/penguins.csv")
                .unwrap()
                .into_response(),
            _ => StatusCode::NOT_FOUND.into_response(),
        }
    }

    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/uc", get(download))
        .with_state(Arc::clone(&hits));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), hits)
}

#[tokio::test]
async fn test_remote_fetch_parses_and_caches() {
    let (base_url, hits) = serve_remote_files().await;
    let client = reqwest::Client::new();
    let cache = DatasetCache::new();
    let url = direct_download_url(&base_url, "good");

    let first = cache.fetch(&client, &url).await.unwrap();
    let direct = Dataset::from_csv_str(&fixture("penguins.csv")).unwrap();
    assert_eq!(first.row_count(), direct.row_count());
    assert_eq!(first.column_count(), direct.column_count());
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let second = cache.fetch(&client, &url).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_misses_share_one_fetch() {
    let (base_url, hits) = serve_remote_files().await;
    let client = reqwest::Client::new();
    let cache = DatasetCache::new();
    let url = direct_download_url(&base_url, "good");

    let (a, b) = tokio::join!(cache.fetch(&client, &url), cache.fetch(&client, &url));
    assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_remote_404_is_not_cached() {
    let (base_url, hits) = serve_remote_files().await;
    let client = reqwest::Client::new();
    let cache = DatasetCache::new();
    let url = direct_download_url(&base_url, "missing");

    let err = cache.fetch(&client, &url).await.unwrap_err();
    assert!(matches!(err, DashboardError::RemoteStatus { status: 404, .. }));
    assert!(cache.is_empty().await);

    assert!(cache.fetch(&client, &url).await.is_err());
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_remote_dashboard() {
    let (base_url, hits) = serve_remote_files().await;
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        app_data_dir: dir.path().join("app_data"),
        video_dir: dir.path().join("videos"),
        render: small_render(),
        source: SourceConfig::Remote(RemoteConfig {
            share_link: "https://drive.google.com/file/d/good/view?usp=sharing".to_string(),
            base_url: base_url.clone(),
            preview_link: Some("https://drive.google.com/file/d/vid/view".to_string()),
        }),
        ..Config::default()
    };
    let app = router(AppState::new(&config).unwrap());

    let html = body_text(send_get(&app, "/page/welcome").await).await;
    assert!(html.contains("the sample dataset"));
    assert!(html.contains(&format!("{}/uc?export=download&amp;id=good", base_url)));
    assert!(html.contains(&format!("{}/file/d/vid/preview", base_url)));
    assert!(!html.contains("action=\"/upload\""));
    assert!(!html.contains("msg error"));
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let html = body_text(send_get(&app, "/page/univariate").await).await;
    assert_eq!(html.matches("data:image/png;base64,").count(), 4);
    let html = body_text(send_get(&app, "/page/multivariate").await).await;
    assert!(html.contains("alt=\"Correlation Heatmap\""));
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let response = app
        .clone()
        .oneshot(upload_request("x.csv", b"a\n1\n", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_remote_failure_halts_page() {
    let (base_url, hits) = serve_remote_files().await;
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        app_data_dir: dir.path().join("app_data"),
        video_dir: dir.path().join("videos"),
        source: SourceConfig::Remote(RemoteConfig {
            share_link: "missing".to_string(),
            base_url,
            preview_link: None,
        }),
        ..Config::default()
    };
    let app = router(AppState::new(&config).unwrap());

    let response = send_get(&app, "/page/welcome").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("HTTP 404"));
    assert!(html.contains("the sample dataset"));
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let response = send_get(&app, "/page/univariate").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("HTTP 404"));
    assert!(!html.contains("data:image/png"));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[test]
fn test_cli_inspect() {
    let output = Command::new(env!("CARGO_BIN_EXE_statboard"))
        .args(["inspect", "--csv", "test/numeric_only.csv"])
        .output()
        .expect("Failed to run statboard");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["rows"], 6);
    assert_eq!(json["numeric_columns"], serde_json::json!(["x", "y", "z"]));
}

#[test]
fn test_cli_render_writes_pngs() {
    let out = tempfile::tempdir().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_statboard"))
        .args(["render", "--page", "univariate", "--csv", "test/penguins.csv", "--out"])
        .arg(out.path())
        .args(["--set", "pie=sex", "--set", "top_n=3"])
        .output()
        .expect("Failed to run statboard");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let mut names: Vec<String> = fs::read_dir(out.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec!["01-histogram.png", "02-countplot.png", "03-pie.png", "04-boxplot.png"]
    );
    let png = fs::read(out.path().join("03-pie.png")).unwrap();
    assert!(is_valid_png(&png));
}

#[test]
fn test_cli_rejects_unknown_page() {
    let out = tempfile::tempdir().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_statboard"))
        .args(["render", "--page", "dashboard", "--csv", "test/penguins.csv", "--out"])
        .arg(out.path())
        .output()
        .expect("Failed to run statboard");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown page 'dashboard'"));
}
