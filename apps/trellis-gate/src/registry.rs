//! Resolves artifact ids to files on disk.
//!
//! Owned by the server state with an explicit lifetime; lookups search the
//! configured download directories for `{id}_output.<ext>` first, then the
//! bare `{id}.<ext>`, and cache hits until the file disappears.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;
use trellis_client::{ArtifactKind, Config};

pub struct ArtifactRegistry {
    dirs: Vec<PathBuf>,
    cache: Mutex<HashMap<(String, ArtifactKind), PathBuf>>,
}

impl ArtifactRegistry {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self {
            dirs,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(vec![
            config.storage.download_dir.clone(),
            config.storage.api_download_dir.clone(),
        ])
    }

    pub fn find(&self, id: &str, kind: ArtifactKind) -> Option<PathBuf> {
        if !is_safe_id(id) {
            debug!("rejected artifact id '{id}'");
            return None;
        }
        let key = (id.to_string(), kind);
        {
            let mut cache = self.cache.lock().expect("registry cache poisoned");
            if let Some(path) = cache.get(&key) {
                if path.exists() {
                    return Some(path.clone());
                }
                cache.remove(&key);
            }
        }
        let candidates = [
            format!("{id}_output.{}", kind.extension()),
            format!("{id}.{}", kind.extension()),
        ];
        for dir in &self.dirs {
            for name in &candidates {
                let path = dir.join(name);
                if path.exists() {
                    self.cache
                        .lock()
                        .expect("registry cache poisoned")
                        .insert(key, path.clone());
                    return Some(path);
                }
            }
        }
        None
    }
}

/// Ids come straight from URLs; keep them from walking the filesystem.
fn is_safe_id(id: &str) -> bool {
    !id.is_empty() && !id.contains(['/', '\\']) && !id.contains("..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_output_name_before_bare_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sess-1_output.glb"), b"a").unwrap();
        std::fs::write(dir.path().join("sess-1.glb"), b"b").unwrap();
        let registry = ArtifactRegistry::new(vec![dir.path().to_path_buf()]);
        let found = registry.find("sess-1", ArtifactKind::Model).unwrap();
        assert!(found.ends_with("sess-1_output.glb"));
    }

    #[test]
    fn searches_all_dirs_and_falls_back_to_bare_name() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(second.path().join("sess-2.mp4"), b"v").unwrap();
        let registry = ArtifactRegistry::new(vec![
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ]);
        assert!(registry.find("sess-2", ArtifactKind::Video).is_some());
        assert!(registry.find("sess-2", ArtifactKind::Model).is_none());
    }

    #[test]
    fn cache_entry_is_dropped_when_the_file_goes_away() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sess-3_output.glb");
        std::fs::write(&path, b"a").unwrap();
        let registry = ArtifactRegistry::new(vec![dir.path().to_path_buf()]);
        assert!(registry.find("sess-3", ArtifactKind::Model).is_some());
        std::fs::remove_file(&path).unwrap();
        assert!(registry.find("sess-3", ArtifactKind::Model).is_none());
    }

    #[test]
    fn traversal_attempts_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ArtifactRegistry::new(vec![dir.path().to_path_buf()]);
        assert!(registry.find("../etc/passwd", ArtifactKind::Model).is_none());
        assert!(registry.find("", ArtifactKind::Model).is_none());
    }
}
