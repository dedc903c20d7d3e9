//! On-disk bookkeeping: per-session metadata and named session bookmarks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::client::Job;
use crate::error::Result;
use crate::params::ProcessingParams;

/// What we know about the image that seeded a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub byte_len: u64,
}

/// Metadata recorded when a job completes, keyed by session id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: String,
    pub task_id: String,
    pub created_at: DateTime<Utc>,
    pub parameters: ProcessingParams,
    #[serde(default)]
    pub image: ImageInfo,
}

impl SessionMetadata {
    pub fn new(job: &Job, parameters: ProcessingParams, image: ImageInfo) -> Self {
        Self {
            session_id: job.session_id.clone(),
            task_id: job.task_id.clone(),
            created_at: Utc::now(),
            parameters,
            image,
        }
    }
}

/// Writes and reads `session_{id}.json` files in the metadata directory.
pub struct MetadataStore {
    dir: PathBuf,
}

impl MetadataStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("session_{session_id}.json"))
    }

    pub fn save(&self, metadata: &SessionMetadata) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&metadata.session_id);
        std::fs::write(&path, serde_json::to_string_pretty(metadata)?)?;
        info!("saved session metadata to {}", path.display());
        Ok(path)
    }

    pub fn load(&self, session_id: &str) -> Option<SessionMetadata> {
        let path = self.path_for(session_id);
        let text = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&text) {
            Ok(metadata) => Some(metadata),
            Err(err) => {
                warn!("corrupt metadata file {}: {err}", path.display());
                None
            }
        }
    }
}

/// A named bookmark pointing at a session/task pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionBookmark {
    pub session_id: String,
    pub task_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Named bookmarks, one JSON file per name in the sessions directory.
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    pub fn save(&self, name: &str, job: &Job) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let bookmark = SessionBookmark {
            session_id: job.session_id.clone(),
            task_id: job.task_id.clone(),
            timestamp: Utc::now(),
        };
        let path = self.path_for(name);
        std::fs::write(&path, serde_json::to_string_pretty(&bookmark)?)?;
        info!("saved session '{name}' to {}", path.display());
        Ok(())
    }

    pub fn load(&self, name: &str) -> Option<Job> {
        let path = self.path_for(name);
        let text = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<SessionBookmark>(&text) {
            Ok(bookmark) => Some(Job {
                session_id: bookmark.session_id,
                task_id: bookmark.task_id,
            }),
            Err(err) => {
                warn!("corrupt session file {}: {err}", path.display());
                None
            }
        }
    }

    pub fn names(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "json") {
                    path.file_stem().map(|s| s.to_string_lossy().into_owned())
                } else {
                    None
                }
            })
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ProcessingParams;

    fn job() -> Job {
        Job {
            session_id: "sess-1".to_string(),
            task_id: "task-1".to_string(),
        }
    }

    #[test]
    fn metadata_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        let metadata = SessionMetadata::new(
            &job(),
            ProcessingParams::default(),
            ImageInfo {
                filename: Some("cat.png".to_string()),
                byte_len: 1234,
            },
        );
        store.save(&metadata).unwrap();
        let loaded = store.load("sess-1").unwrap();
        assert_eq!(loaded.task_id, "task-1");
        assert_eq!(loaded.image.byte_len, 1234);
        assert!(store.load("missing").is_none());
    }

    #[test]
    fn bookmarks_round_trip_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        store.save("my-chair", &job()).unwrap();
        let loaded = store.load("my-chair").unwrap();
        assert_eq!(loaded, job());
        assert_eq!(store.names(), vec!["my-chair".to_string()]);
        assert!(store.load("other").is_none());
    }
}
