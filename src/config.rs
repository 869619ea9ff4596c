// Configuration file loading

use crate::error::{DashboardError, Result};
use crate::source::DEFAULT_BASE_URL;
use crate::theme::ThemeConfig;
use crate::RenderOptions;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind: String,
    pub app_data_dir: PathBuf,
    pub video_dir: PathBuf,
    pub max_upload_mb: usize,
    pub source: SourceConfig,
    pub render: RenderOptions,
    pub theme: ThemeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8501".to_string(),
            app_data_dir: PathBuf::from("app_data"),
            video_dir: PathBuf::from("videos"),
            max_upload_mb: 200,
            source: SourceConfig::default(),
            render: RenderOptions::default(),
            theme: ThemeConfig::default(),
        }
    }
}

/// How the dashboard obtains its dataset
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SourceConfig {
    #[default]
    Upload,
    Remote(RemoteConfig),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteConfig {
    pub share_link: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub preview_link: Option<String>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| DashboardError::Config(e.to_string()))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| DashboardError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Defaults when no file is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_path(path),
            None => Ok(Self::default()),
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    /// Apply `--remote`: switch to the remote variant, keeping any base URL
    /// and preview link already configured
    pub fn use_remote(&mut self, share_link: &str) {
        let (base_url, preview_link) = match &self.source {
            SourceConfig::Remote(remote) => (remote.base_url.clone(), remote.preview_link.clone()),
            SourceConfig::Upload => (default_base_url(), None),
        };
        self.source = SourceConfig::Remote(RemoteConfig {
            share_link: share_link.to_string(),
            base_url,
            preview_link,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.bind, "127.0.0.1:8501");
        assert_eq!(config.app_data_dir, PathBuf::from("app_data"));
        assert_eq!(config.video_dir, PathBuf::from("videos"));
        assert_eq!(config.max_upload_mb, 200);
        assert_eq!(config.source, SourceConfig::Upload);
        assert_eq!(config.render.width, 800);
        assert_eq!(config.render.height, 600);
        assert_eq!(config.render.pair_cell, 260);
        assert_eq!(config.theme.title_color, "#FF0000");
    }

    #[test]
    fn test_remote_source() {
        let config = Config::from_toml_str(
            r#"
            bind = "0.0.0.0:9000"

            [source]
            mode = "remote"
            share_link = "https://drive.google.com/file/d/abc/view"

            [render]
            width = 1024
            "#,
        )
        .unwrap();
        assert_eq!(config.bind, "0.0.0.0:9000");
        assert_eq!(config.render.width, 1024);
        assert_eq!(config.render.height, 600);
        match config.source {
            SourceConfig::Remote(remote) => {
                assert_eq!(remote.base_url, DEFAULT_BASE_URL);
                assert_eq!(remote.preview_link, None);
            }
            other => panic!("expected remote source, got {:?}", other),
        }
    }

    #[test]
    fn test_theme_section() {
        let config = Config::from_toml_str(
            r##"
            [theme]
            title_color = "#0000FF"
            palette = ["#111111", "#222222"]
            "##,
        )
        .unwrap();
        assert_eq!(config.theme.title_color, "#0000FF");
        assert_eq!(config.theme.title_size, 25.0);
        assert_eq!(config.theme.palette.len(), 2);
    }

    #[test]
    fn test_invalid_config() {
        let err = Config::from_toml_str("max_upload_mb = \"lots\"").unwrap_err();
        assert!(matches!(err, DashboardError::Config(_)));
        let err = Config::from_toml_str("[source]\nmode = \"ftp\"").unwrap_err();
        assert!(matches!(err, DashboardError::Config(_)));
    }

    #[test]
    fn test_use_remote_keeps_base_url() {
        let mut config = Config::from_toml_str(
            r#"
            [source]
            mode = "remote"
            share_link = "old"
            base_url = "http://127.0.0.1:5000"
            "#,
        )
        .unwrap();
        config.use_remote("new");
        assert_eq!(
            config.source,
            SourceConfig::Remote(RemoteConfig {
                share_link: "new".to_string(),
                base_url: "http://127.0.0.1:5000".to_string(),
                preview_link: None,
            })
        );
    }
}
