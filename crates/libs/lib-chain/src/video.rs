//! # Project Videos
//!
//! Best-effort local map of project name to video URL. It only decorates views;
//! a missing or unreadable store never fails a refresh.

use lib_core::dto::ListedProjectView;
use lib_core::{AppError, Result};
use lib_utils::validate_not_empty;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Largest accepted upload.
pub const MAX_VIDEO_BYTES: u64 = 50 * 1024 * 1024;

/// Metadata of a file picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoUpload {
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
}

pub fn validate_upload(upload: &VideoUpload) -> Result<()> {
    if !upload.content_type.starts_with("video/") {
        return Err(AppError::InvalidInput("Please upload a valid video file".to_string()));
    }
    if upload.size_bytes > MAX_VIDEO_BYTES {
        return Err(AppError::InvalidInput("Video file size must be less than 50MB".to_string()));
    }
    Ok(())
}

pub struct VideoStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl VideoStore {
    /// Open the store at `path`. A missing or malformed file yields an empty store.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "ignoring malformed video store");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read video store");
                BTreeMap::new()
            }
        };
        debug!(path = %path.display(), count = entries.len(), "video store loaded");
        Self {
            path,
            entries: RwLock::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn url_for(&self, project_name: &str) -> Option<String> {
        self.entries.read().await.get(project_name).cloned()
    }

    /// Record the video of an uploaded file and persist the map.
    pub async fn attach(&self, project_name: &str, upload: &VideoUpload, url: &str) -> Result<()> {
        validate_upload(upload)?;
        self.save(project_name, url).await
    }

    pub async fn save(&self, project_name: &str, url: &str) -> Result<()> {
        validate_not_empty(project_name, "Project name").map_err(AppError::InvalidInput)?;
        validate_not_empty(url, "Video URL").map_err(AppError::InvalidInput)?;

        let mut entries = self.entries.write().await;
        let mut next = entries.clone();
        next.insert(project_name.to_string(), url.to_string());
        self.persist(&next).await?;
        *entries = next;
        Ok(())
    }

    /// Drop the entry for `project_name`. Memory only changes once the file does.
    pub async fn remove(&self, project_name: &str) -> Result<bool> {
        let mut entries = self.entries.write().await;
        let mut next = entries.clone();
        if next.remove(project_name).is_none() {
            return Ok(false);
        }
        self.persist(&next).await?;
        *entries = next;
        Ok(true)
    }

    /// Fill `video_url` on every view with a stored entry.
    pub async fn decorate(&self, views: &mut [ListedProjectView]) {
        let entries = self.entries.read().await;
        for view in views {
            view.video_url = entries.get(&view.name).cloned();
        }
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_core::ErrorKind;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("greenstake-{}", uuid::Uuid::new_v4()))
            .join("videos.json")
    }

    fn upload(content_type: &str, size_bytes: u64) -> VideoUpload {
        VideoUpload {
            file_name: "pitch.mp4".into(),
            content_type: content_type.into(),
            size_bytes,
        }
    }

    #[test]
    fn upload_rules() {
        assert!(validate_upload(&upload("video/mp4", MAX_VIDEO_BYTES)).is_ok());
        assert_eq!(
            validate_upload(&upload("image/png", 10)).unwrap_err().user_message(),
            "Please upload a valid video file"
        );
        assert_eq!(
            validate_upload(&upload("video/webm", MAX_VIDEO_BYTES + 1)).unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
    }

    #[tokio::test]
    async fn persists_across_loads() {
        let path = temp_path();
        let store = VideoStore::load(&path).await;
        assert!(store.url_for("Reef").await.is_none());

        store
            .attach("Reef", &upload("video/mp4", 1024), "https://cdn.example/reef.mp4")
            .await
            .unwrap();

        let reopened = VideoStore::load(&path).await;
        assert_eq!(
            reopened.url_for("Reef").await.as_deref(),
            Some("https://cdn.example/reef.mp4")
        );
        assert!(reopened.remove("Reef").await.unwrap());
        assert!(!reopened.remove("Reef").await.unwrap());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn failed_write_leaves_memory_untouched() {
        let path = temp_path();
        let store = VideoStore::load(&path).await;
        store.save("Reef", "https://cdn.example/reef.mp4").await.unwrap();

        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert!(store.save("Forest", "https://cdn.example/forest.mp4").await.is_err());
        assert!(store.url_for("Forest").await.is_none());
        assert!(store.remove("Reef").await.is_err());
        assert_eq!(
            store.url_for("Reef").await.as_deref(),
            Some("https://cdn.example/reef.mp4")
        );
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn malformed_file_is_ignored() {
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();

        let store = VideoStore::load(&path).await;

        assert!(store.url_for("anything").await.is_none());
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
