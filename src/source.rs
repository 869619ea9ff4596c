//! Where datasets come from: the upload staging folder or a shared remote file

use crate::config::RemoteConfig;
use crate::data::Dataset;
use crate::error::{DashboardError, Result};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while1},
    combinator::all_consuming,
    sequence::{pair, preceded},
    IResult,
};
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

pub const DEFAULT_BASE_URL: &str = "https://drive.google.com";

/// Folder that uploaded CSV files are written into, verbatim
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    /// Open the staging folder, creating it if missing
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write an upload under its original file name and return that name
    pub fn stage(&self, file_name: &str, bytes: &[u8]) -> Result<String> {
        let name = csv_file_name(file_name)?;
        fs::write(self.dir.join(&name), bytes)?;
        info!(name = %name, bytes = bytes.len(), "dataset staged");
        Ok(name)
    }

    pub fn path(&self, file_name: &str) -> Result<PathBuf> {
        Ok(self.dir.join(csv_file_name(file_name)?))
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.path(file_name).map(|p| p.is_file()).unwrap_or(false)
    }

    pub fn read(&self, file_name: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.path(file_name)?)?)
    }

    pub fn load(&self, file_name: &str) -> Result<Dataset> {
        let dataset = Dataset::from_path(&self.path(file_name)?)?;
        info!(
            name = file_name,
            rows = dataset.row_count(),
            columns = dataset.column_count(),
            "dataset loaded"
        );
        Ok(dataset)
    }

    /// Staged CSV file names, sorted
    pub fn list_csv(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if has_extension(name, &["csv"]) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Final path component of a client-supplied name, which must be a `.csv`
fn csv_file_name(raw: &str) -> Result<String> {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let stem_ok = name.len() > ".csv".len() && name != "..";
    if stem_ok && has_extension(name, &["csv"]) {
        Ok(name.to_string())
    } else {
        Err(DashboardError::InvalidUpload {
            name: raw.to_string(),
        })
    }
}

/// Case-insensitive extension check
pub(crate) fn has_extension(name: &str, extensions: &[&str]) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}

fn file_id(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-')(input)
}

/// .../file/d/<ID>/...
fn file_path_id(input: &str) -> IResult<&str, &str> {
    preceded(pair(take_until("/file/d/"), tag("/file/d/")), file_id)(input)
}

/// ...?id=<ID> or ...&id=<ID>
fn query_id(input: &str) -> IResult<&str, &str> {
    alt((
        preceded(pair(take_until("?id="), tag("?id=")), file_id),
        preceded(pair(take_until("&id="), tag("&id=")), file_id),
    ))(input)
}

/// Pull the file identifier out of a share link
pub fn parse_share_link(link: &str) -> Result<String> {
    let link = link.trim();
    alt((file_path_id, query_id, all_consuming(file_id)))(link)
        .map(|(_, id)| id.to_string())
        .map_err(|_| DashboardError::InvalidShareLink(link.to_string()))
}

pub fn direct_download_url(base_url: &str, file_id: &str) -> String {
    format!(
        "{}/uc?export=download&id={}",
        base_url.trim_end_matches('/'),
        file_id
    )
}

pub fn preview_url(base_url: &str, file_id: &str) -> String {
    format!("{}/file/d/{}/preview", base_url.trim_end_matches('/'), file_id)
}

/// Parsed datasets keyed by source URL. Only successes are stored.
#[derive(Debug, Default)]
pub struct DatasetCache {
    entries: RwLock<HashMap<String, Arc<Dataset>>>,
    /// Held across a miss so concurrent requests share one GET
    loading: Mutex<()>,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, url: &str) -> Option<Arc<Dataset>> {
        self.entries.read().await.get(url).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Read-through fetch: a cached dataset, or one GET that fills the cache
    pub async fn fetch(&self, client: &Client, url: &str) -> Result<Arc<Dataset>> {
        if let Some(dataset) = self.get(url).await {
            debug!(url, cache = "hit", "remote dataset");
            return Ok(dataset);
        }

        let _loading = self.loading.lock().await;
        if let Some(dataset) = self.get(url).await {
            debug!(url, cache = "hit", "remote dataset loaded by another request");
            return Ok(dataset);
        }

        let response = client.get(url).send().await?;
        let status = response.status();
        info!(url, status = status.as_u16(), cache = "miss", "remote fetch");
        if status != StatusCode::OK {
            warn!(url, status = status.as_u16(), "remote fetch failed");
            return Err(DashboardError::RemoteStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let dataset = Arc::new(Dataset::from_reader(body.as_ref())?);
        info!(
            url,
            rows = dataset.row_count(),
            columns = dataset.column_count(),
            "dataset loaded"
        );

        self.entries
            .write()
            .await
            .insert(url.to_string(), Arc::clone(&dataset));
        Ok(dataset)
    }
}

/// A fixed shared file fetched over HTTP
#[derive(Debug, Clone)]
pub struct RemoteSource {
    pub file_id: String,
    pub download_url: String,
    pub preview_url: Option<String>,
}

impl RemoteSource {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let file_id = parse_share_link(&config.share_link)?;
        let preview_url = match &config.preview_link {
            Some(link) => Some(preview_url(&config.base_url, &parse_share_link(link)?)),
            None => None,
        };
        Ok(Self {
            download_url: direct_download_url(&config.base_url, &file_id),
            file_id,
            preview_url,
        })
    }

    pub async fn resolve(&self, client: &Client, cache: &DatasetCache) -> Result<Arc<Dataset>> {
        cache.fetch(client, &self.download_url).await
    }
}

/// HTTP client used for remote datasets
pub fn build_http_client() -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(60))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(concat!("statboard/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_share_link_forms() {
        assert_eq!(
            parse_share_link("https://drive.google.com/file/d/1AbC-d_9/view?usp=sharing").unwrap(),
            "1AbC-d_9"
        );
        assert_eq!(
            parse_share_link("https://drive.google.com/open?id=XyZ123").unwrap(),
            "XyZ123"
        );
        assert_eq!(
            parse_share_link("https://drive.google.com/uc?export=download&id=Q_q-1").unwrap(),
            "Q_q-1"
        );
        assert_eq!(parse_share_link("  plainId42 ").unwrap(), "plainId42");
    }

    #[test]
    fn test_parse_share_link_rejects_garbage() {
        assert!(matches!(
            parse_share_link("https://example.com/nothing/here"),
            Err(DashboardError::InvalidShareLink(_))
        ));
        assert!(parse_share_link("").is_err());
        assert!(parse_share_link("https://host/file/d//view").is_err());
    }

    #[test]
    fn test_urls() {
        assert_eq!(
            direct_download_url("https://drive.google.com/", "abc"),
            "https://drive.google.com/uc?export=download&id=abc"
        );
        assert_eq!(
            preview_url("http://127.0.0.1:9000", "abc"),
            "http://127.0.0.1:9000/file/d/abc/preview"
        );
    }

    #[test]
    fn test_remote_source_from_config() {
        let config = RemoteConfig {
            share_link: "https://drive.google.com/file/d/DATA1/view".to_string(),
            base_url: "http://localhost:1".to_string(),
            preview_link: Some("https://drive.google.com/file/d/VID2/view".to_string()),
        };
        let source = RemoteSource::new(&config).unwrap();
        assert_eq!(source.download_url, "http://localhost:1/uc?export=download&id=DATA1");
        assert_eq!(
            source.preview_url.as_deref(),
            Some("http://localhost:1/file/d/VID2/preview")
        );
    }

    #[test]
    fn test_csv_file_name() {
        assert_eq!(csv_file_name("iris.csv").unwrap(), "iris.csv");
        assert_eq!(csv_file_name("C:\\Users\\me\\Sales.CSV").unwrap(), "Sales.CSV");
        assert_eq!(csv_file_name("../../etc/data.csv").unwrap(), "data.csv");
        assert!(csv_file_name("notes.txt").is_err());
        assert!(csv_file_name(".csv").is_err());
        assert!(csv_file_name("dir/").is_err());
    }

    #[test]
    fn test_stage_writes_bytes_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().join("app_data")).unwrap();
        let bytes = b"a,b\r\n1,2\r\n\xef\xbb\xbf";

        let name = store.stage("nested/path/My Data.csv", bytes).unwrap();
        assert_eq!(name, "My Data.csv");
        assert_eq!(fs::read(dir.path().join("app_data/My Data.csv")).unwrap(), bytes);
        assert!(store.contains("My Data.csv"));
    }

    #[test]
    fn test_stage_rejects_non_csv() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path()).unwrap();
        let err = store.stage("report.xlsx", b"x").unwrap_err();
        assert!(matches!(err, DashboardError::InvalidUpload { .. }));
        assert!(store.list_csv().unwrap().is_empty());
    }

    #[test]
    fn test_list_csv_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path()).unwrap();
        store.stage("zeta.csv", b"a\n1\n").unwrap();
        store.stage("Alpha.CSV", b"a\n1\n").unwrap();
        fs::write(dir.path().join("readme.md"), "x").unwrap();
        assert_eq!(store.list_csv().unwrap(), vec!["Alpha.CSV", "zeta.csv"]);
    }

    #[test]
    fn test_load_staged_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path()).unwrap();
        store.stage("t.csv", b"x,label\n1,a\n2,b\n").unwrap();
        let dataset = store.load("t.csv").unwrap();
        assert_eq!(dataset.row_count(), 2);
        assert!(matches!(
            store.load("missing.csv"),
            Err(DashboardError::Io(_))
        ));
    }
}
