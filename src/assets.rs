//! Welcome page content: the sample download and the tutorial videos

use crate::error::Result;
use crate::source::{has_extension, RemoteSource, UploadStore};
use std::fs;
use std::path::{Path, PathBuf};

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv"];

/// MIME type for a stored video, by extension
pub fn video_mime(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        Some("mkv") => "video/x-matroska",
        _ => "video/mp4",
    }
}

/// Video files in `dir`, sorted by name. The folder is created if missing.
pub fn list_videos(dir: &Path) -> Result<Vec<String>> {
    fs::create_dir_all(dir)?;
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if has_extension(name, VIDEO_EXTENSIONS) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Path of a stored video, if `name` is a plain video file name that exists
pub fn video_path(dir: &Path, name: &str) -> Option<PathBuf> {
    let plain = !name.is_empty() && !name.contains(['/', '\\']) && name != "..";
    if !plain || !has_extension(name, VIDEO_EXTENSIONS) {
        return None;
    }
    let path = dir.join(name);
    path.is_file().then_some(path)
}

/// The CSV offered for download: the active dataset when it is staged,
/// otherwise the first staged file by name
pub fn find_sample(store: &UploadStore, active: Option<&str>) -> Result<Option<String>> {
    if let Some(name) = active {
        if store.contains(name) {
            return Ok(Some(name.to_string()));
        }
    }
    Ok(store.list_csv()?.into_iter().next())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleDownload {
    /// Served from the staging folder through `/sample`
    Staged { file_name: String },
    /// Direct link to the remote file
    Remote { url: String },
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WelcomeMedia {
    Videos(Vec<String>),
    Preview { url: String },
    None,
}

/// Everything the Welcome page shows besides its static text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WelcomeContent {
    pub remote: bool,
    pub sample: SampleDownload,
    pub media: WelcomeMedia,
}

impl WelcomeContent {
    pub fn for_upload(store: &UploadStore, video_dir: &Path, active: Option<&str>) -> Result<Self> {
        let sample = match find_sample(store, active)? {
            Some(file_name) => SampleDownload::Staged { file_name },
            None => SampleDownload::None,
        };
        let videos = list_videos(video_dir)?;
        let media = if videos.is_empty() {
            WelcomeMedia::None
        } else {
            WelcomeMedia::Videos(videos)
        };
        Ok(Self {
            remote: false,
            sample,
            media,
        })
    }

    pub fn for_remote(source: &RemoteSource) -> Self {
        Self {
            remote: true,
            sample: SampleDownload::Remote {
                url: source.download_url.clone(),
            },
            media: match &source.preview_url {
                Some(url) => WelcomeMedia::Preview { url: url.clone() },
                None => WelcomeMedia::None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_mime() {
        assert_eq!(video_mime("intro.MP4"), "video/mp4");
        assert_eq!(video_mime("a.mov"), "video/quicktime");
        assert_eq!(video_mime("a.mkv"), "video/x-matroska");
        assert_eq!(video_mime("a.avi"), "video/x-msvideo");
    }

    #[test]
    fn test_list_videos_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let videos = dir.path().join("videos");
        assert!(list_videos(&videos).unwrap().is_empty());
        assert!(videos.is_dir());

        for name in ["b.mkv", "A.MP4", "notes.txt", "c.mov"] {
            fs::write(videos.join(name), b"x").unwrap();
        }
        assert_eq!(list_videos(&videos).unwrap(), vec!["A.MP4", "b.mkv", "c.mov"]);
    }

    #[test]
    fn test_video_path_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("clip.mp4"), b"x").unwrap();
        assert!(video_path(dir.path(), "clip.mp4").is_some());
        assert!(video_path(dir.path(), "../clip.mp4").is_none());
        assert!(video_path(dir.path(), "missing.mp4").is_none());
        assert!(video_path(dir.path(), "clip.txt").is_none());
    }

    #[test]
    fn test_find_sample_prefers_active_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path()).unwrap();
        assert_eq!(find_sample(&store, None).unwrap(), None);

        store.stage("b.csv", b"x\n1\n").unwrap();
        store.stage("a.csv", b"x\n1\n").unwrap();
        assert_eq!(find_sample(&store, None).unwrap().as_deref(), Some("a.csv"));
        assert_eq!(find_sample(&store, Some("b.csv")).unwrap().as_deref(), Some("b.csv"));
        assert_eq!(find_sample(&store, Some("gone.csv")).unwrap().as_deref(), Some("a.csv"));
    }

    #[test]
    fn test_welcome_for_remote() {
        let source = RemoteSource {
            file_id: "abc".to_string(),
            download_url: "http://h/uc?export=download&id=abc".to_string(),
            preview_url: None,
        };
        let content = WelcomeContent::for_remote(&source);
        assert!(content.remote);
        assert_eq!(
            content.sample,
            SampleDownload::Remote {
                url: "http://h/uc?export=download&id=abc".to_string()
            }
        );
        assert_eq!(content.media, WelcomeMedia::None);
    }
}
