//! HTTP surface: pages, uploads, downloads and the schema endpoint

use crate::assets::{self, WelcomeContent};
use crate::config::{Config, SourceConfig};
use crate::data::{Dataset, Schema};
use crate::error::DashboardError;
use crate::html::{self, Chrome, Level};
use crate::page::{render_page, Page, WidgetState};
use crate::source::{build_http_client, DatasetCache, RemoteSource, UploadStore};
use crate::theme::Theme;
use crate::RenderOptions;
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use reqwest::Client;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Where page requests get their dataset from
pub enum DatasetSource {
    Upload(UploadStore),
    Remote {
        source: RemoteSource,
        client: Client,
        cache: DatasetCache,
    },
}

pub struct AppInner {
    pub source: DatasetSource,
    pub video_dir: PathBuf,
    pub render: RenderOptions,
    pub theme: Theme,
    pub max_upload_bytes: usize,
}

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppInner>,
}

impl AppState {
    /// Build shared state from configuration, creating the staging and
    /// video folders if missing
    pub fn new(config: &Config) -> crate::error::Result<Self> {
        std::fs::create_dir_all(&config.video_dir)?;
        let source = match &config.source {
            SourceConfig::Upload => DatasetSource::Upload(UploadStore::new(&config.app_data_dir)?),
            SourceConfig::Remote(remote) => DatasetSource::Remote {
                source: RemoteSource::new(remote)?,
                client: build_http_client()?,
                cache: DatasetCache::new(),
            },
        };
        Ok(Self {
            inner: Arc::new(AppInner {
                source,
                video_dir: config.video_dir.clone(),
                render: config.render.clone(),
                theme: config.theme.resolve(),
                max_upload_bytes: config.max_upload_bytes(),
            }),
        })
    }

    fn is_remote(&self) -> bool {
        matches!(self.inner.source, DatasetSource::Remote { .. })
    }

    fn store(&self) -> Option<&UploadStore> {
        match &self.inner.source {
            DatasetSource::Upload(store) => Some(store),
            DatasetSource::Remote { .. } => None,
        }
    }

    /// Resolve the dataset a request refers to
    async fn dataset(&self, name: Option<&str>) -> crate::error::Result<Arc<Dataset>> {
        match &self.inner.source {
            DatasetSource::Upload(store) => {
                let name = name.ok_or(DashboardError::NoDataset)?.to_string();
                let store = store.clone();
                run_blocking(move || store.load(&name)).await.map(Arc::new)
            }
            DatasetSource::Remote {
                source,
                client,
                cache,
            } => source.resolve(client, cache).await,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.inner.max_upload_bytes;
    Router::new()
        .route("/", get(index))
        .route("/page/{page}", get(show_page))
        .route("/upload", post(upload))
        .route("/sample", get(sample))
        .route("/videos/{name}", get(video))
        .route("/api/schema", get(schema))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Error response for requests that cannot produce a page at all
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<DashboardError> for AppError {
    fn from(err: DashboardError) -> Self {
        let status = match &err {
            DashboardError::UnknownPage(_) | DashboardError::NoDataset => StatusCode::NOT_FOUND,
            DashboardError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                StatusCode::NOT_FOUND
            }
            DashboardError::InvalidUpload { .. }
            | DashboardError::Csv(_)
            | DashboardError::RaggedRow { .. }
            | DashboardError::EmptyDataset => StatusCode::BAD_REQUEST,
            DashboardError::RemoteStatus { .. } | DashboardError::RemoteTransport(_) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(status = self.status.as_u16(), error = %self.message, "request failed");
        }
        (self.status, self.message).into_response()
    }
}

/// Run filesystem and drawing work off the async workers
async fn run_blocking<T, F>(work: F) -> crate::error::Result<T>
where
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| DashboardError::Render(format!("worker failed: {}", e)))?
}

async fn index() -> Redirect {
    Redirect::to("/page/welcome")
}

async fn show_page(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
) -> Result<Html<String>, AppError> {
    let page: Page = slug.parse()?;
    let widgets = WidgetState::from_pairs(query);
    let dataset_name = widgets
        .get("dataset")
        .filter(|n| !n.is_empty())
        .map(str::to_string);
    let chrome = Chrome {
        dataset: dataset_name.clone(),
        remote: state.is_remote(),
    };

    if page == Page::Welcome {
        let mut body = String::new();
        let content = match &state.inner.source {
            DatasetSource::Upload(store) => {
                let store = store.clone();
                let video_dir = state.inner.video_dir.clone();
                run_blocking(move || {
                    WelcomeContent::for_upload(&store, &video_dir, dataset_name.as_deref())
                })
                .await?
            }
            DatasetSource::Remote { source, .. } => {
                // Warm the cache so a broken share link shows up here
                if let Err(err) = state.dataset(None).await {
                    warn!(page = page.slug(), error = %err, "dataset unavailable");
                    body.push_str(&html::message(Level::Error, &err.to_string()));
                }
                WelcomeContent::for_remote(source)
            }
        };
        body.push_str(&html::welcome(&content, &chrome));
        return Ok(Html(html::document(page, &chrome, None, &body)));
    }

    let dataset = match state.dataset(dataset_name.as_deref()).await {
        Ok(dataset) => dataset,
        Err(DashboardError::NoDataset) => {
            let text = DashboardError::NoDataset.to_string();
            let body = html::halted(page, Level::Info, &text);
            return Ok(Html(html::document(page, &chrome, Some((Level::Info, text)), &body)));
        }
        Err(err) => {
            warn!(page = page.slug(), error = %err, "dataset unavailable");
            let text = match &dataset_name {
                Some(name) if !state.is_remote() => format!("Failed to load dataset '{}': {}", name, err),
                _ => err.to_string(),
            };
            let body = html::halted(page, Level::Error, &text);
            return Ok(Html(html::document(page, &chrome, None, &body)));
        }
    };

    let notice = match &dataset_name {
        Some(name) if !state.is_remote() => Some((
            Level::Success,
            format!("✅ Dataset '{}' Loaded Successfully!", name),
        )),
        _ => None,
    };

    let inner = Arc::clone(&state.inner);
    let body = run_blocking(move || {
        let rendered = render_page(page, Some(dataset.as_ref()), &widgets, &inner.render, &inner.theme)?;
        Ok(html::rendered_page(&rendered, &chrome))
    })
    .await?;

    let chrome = Chrome {
        dataset: dataset_name,
        remote: state.is_remote(),
    };
    Ok(Html(html::document(page, &chrome, notice, &body)))
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Redirect, AppError> {
    let Some(store) = state.store().cloned() else {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "Uploads are disabled when the dataset comes from a remote source",
        ));
    };

    let mut file: Option<(String, Vec<u8>)> = None;
    let mut target = Page::Univariate;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::new(e.status(), e.body_text()))?
    {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("file") => {
                let name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::new(e.status(), e.body_text()))?;
                file = Some((name, bytes.to_vec()));
            }
            Some("page") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::new(e.status(), e.body_text()))?;
                if let Ok(page) = text.parse::<Page>() {
                    if page.needs_dataset() {
                        target = page;
                    }
                }
            }
            _ => {}
        }
    }

    let (name, bytes) = file.ok_or_else(|| {
        AppError::new(StatusCode::BAD_REQUEST, "Missing multipart field 'file'")
    })?;
    let staged = run_blocking(move || store.stage(&name, &bytes)).await?;

    Ok(Redirect::to(&format!(
        "/page/{}?dataset={}",
        target.slug(),
        urlencoding::encode(&staged)
    )))
}

#[derive(Debug, Deserialize)]
struct DatasetQuery {
    dataset: Option<String>,
}

async fn sample(
    State(state): State<AppState>,
    Query(query): Query<DatasetQuery>,
) -> Result<Response, AppError> {
    let store = match &state.inner.source {
        DatasetSource::Upload(store) => store.clone(),
        DatasetSource::Remote { source, .. } => {
            return Ok(Redirect::to(&source.download_url).into_response());
        }
    };

    let (name, bytes) = run_blocking(move || {
        let name = assets::find_sample(&store, query.dataset.as_deref())?
            .ok_or(DashboardError::NoDataset)?;
        let bytes = store.read(&name)?;
        Ok((name, bytes))
    })
    .await?;

    info!(name = %name, bytes = bytes.len(), "sample download");
    let disposition = format!("attachment; filename=\"{}\"", name.replace('"', ""));
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

async fn video(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    let path = assets::video_path(&state.inner.video_dir, &name)
        .ok_or_else(|| AppError::new(StatusCode::NOT_FOUND, format!("No video named '{}'", name)))?;
    let bytes = tokio::fs::read(&path).await.map_err(DashboardError::from)?;
    Ok((
        [(header::CONTENT_TYPE, assets::video_mime(&name))],
        Body::from(bytes),
    )
        .into_response())
}

async fn schema(
    State(state): State<AppState>,
    Query(query): Query<DatasetQuery>,
) -> Result<Json<Schema>, AppError> {
    let dataset = state.dataset(query.dataset.as_deref()).await?;
    Ok(Json(dataset.schema()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (DashboardError::UnknownPage("x".into()), StatusCode::NOT_FOUND),
            (
                DashboardError::InvalidUpload { name: "a.txt".into() },
                StatusCode::BAD_REQUEST,
            ),
            (
                DashboardError::RemoteStatus {
                    url: "u".into(),
                    status: 404,
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                DashboardError::Io(std::io::Error::from(std::io::ErrorKind::NotFound)),
                StatusCode::NOT_FOUND,
            ),
            (DashboardError::Render("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status, status);
        }
    }
}
