//! Display nodes: hand the host an iframe pointing at the gate's viewer
//! pages, or register arbitrary files for preview.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;
use tracing::warn;

use crate::output::{NodeOutput, PreviewKind, UiPayload};

const VIEWER_FRAME_WIDTH: u32 = 800;
const VIEWER_FRAME_HEIGHT: u32 = 600;

/// Derive the session id from an artifact path, e.g.
/// `trellis_downloads/sess-1_output.glb` -> `sess-1`.
pub fn session_id_from_path(path: &str) -> Option<String> {
    let stem = Path::new(path).file_stem()?.to_str()?;
    Some(stem.strip_suffix("_output").unwrap_or(stem).to_string())
}

/// Shows a downloaded mesh in the embedded three.js viewer and passes the
/// path through for further wiring.
pub struct ModelViewerNode;

impl ModelViewerNode {
    pub fn view(&self, glb_path: &str) -> NodeOutput<String> {
        let Some(session_id) = existing_session_id(glb_path) else {
            return NodeOutput::with_ui(
                String::new(),
                UiPayload::Text {
                    text: "Model file not found or invalid path".to_string(),
                },
            );
        };
        NodeOutput::with_ui(
            glb_path.to_string(),
            UiPayload::Iframe {
                src: format!("/trellis/view-model/{session_id}"),
                width: VIEWER_FRAME_WIDTH,
                height: VIEWER_FRAME_HEIGHT,
            },
        )
    }
}

/// Plays a downloaded turntable video in the embedded player.
pub struct VideoPlayerNode;

impl VideoPlayerNode {
    pub fn view(&self, video_path: &str) -> NodeOutput<()> {
        let Some(session_id) = existing_session_id(video_path) else {
            return NodeOutput::with_ui(
                (),
                UiPayload::Text {
                    text: "Video file not found or invalid path".to_string(),
                },
            );
        };
        NodeOutput::with_ui(
            (),
            UiPayload::Iframe {
                src: format!("/trellis/view-video/{session_id}"),
                width: VIEWER_FRAME_WIDTH,
                height: VIEWER_FRAME_HEIGHT,
            },
        )
    }
}

fn existing_session_id(path: &str) -> Option<String> {
    if path.is_empty() || !Path::new(path).exists() {
        warn!("viewer input does not exist: '{path}'");
        return None;
    }
    session_id_from_path(path)
}

#[derive(Debug, Clone)]
pub struct PreviewEntry {
    pub path: PathBuf,
    pub kind: PreviewKind,
    pub modified: Option<SystemTime>,
}

/// Registered preview files, keyed by a stable id derived from the path.
/// Owned explicitly (by the preview node or the gate), never process-global.
#[derive(Default)]
pub struct PreviewRegistry {
    entries: Mutex<HashMap<String, PreviewEntry>>,
}

impl PreviewRegistry {
    pub fn register(&self, path: &Path, kind: PreviewKind) -> String {
        let file_id = preview_id(path);
        let entry = PreviewEntry {
            path: path.to_path_buf(),
            kind,
            modified: std::fs::metadata(path).and_then(|m| m.modified()).ok(),
        };
        self.entries
            .lock()
            .expect("preview registry poisoned")
            .insert(file_id.clone(), entry);
        file_id
    }

    pub fn get(&self, file_id: &str) -> Option<PreviewEntry> {
        self.entries
            .lock()
            .expect("preview registry poisoned")
            .get(file_id)
            .cloned()
    }
}

fn preview_id(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(16);
    for byte in &digest[..8] {
        hex.push_str(&format!("{byte:02x}"));
    }
    format!("preview_{hex}")
}

/// Previews any local model or video file, auto-detecting the kind from the
/// extension when asked to.
pub struct PreviewNode {
    registry: std::sync::Arc<PreviewRegistry>,
}

impl PreviewNode {
    pub fn new(registry: std::sync::Arc<PreviewRegistry>) -> Self {
        Self { registry }
    }

    pub fn preview(&self, file_path: &str, file_type: Option<PreviewKind>) -> NodeOutput<()> {
        let path = Path::new(file_path);
        if file_path.is_empty() || !path.exists() {
            return NodeOutput::with_ui(
                (),
                UiPayload::Status {
                    status: "waiting".to_string(),
                },
            );
        }
        let kind = match file_type.or_else(|| detect_kind(path)) {
            Some(kind) => kind,
            None => {
                return NodeOutput::with_ui(
                    (),
                    UiPayload::Text {
                        text: format!("Unsupported file type: {file_path}"),
                    },
                );
            }
        };
        let file_id = self.registry.register(path, kind);
        NodeOutput::with_ui(
            (),
            UiPayload::Preview {
                file_id,
                file_type: kind,
            },
        )
    }
}

fn detect_kind(path: &Path) -> Option<PreviewKind> {
    match path.extension()?.to_str()? {
        "glb" | "gltf" => Some(PreviewKind::Model),
        "mp4" | "webm" | "mov" => Some(PreviewKind::Video),
        _ => None,
    }
}
