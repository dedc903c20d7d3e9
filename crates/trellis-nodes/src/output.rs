//! Node return values: output tuple plus an optional UI side-channel
//! payload the host renders next to the node.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewKind {
    Model,
    Video,
}

/// Structured UI data. The host consumes this as opaque JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UiPayload {
    Iframe {
        src: String,
        width: u32,
        height: u32,
    },
    Text {
        text: String,
    },
    Status {
        status: String,
    },
    Preview {
        file_id: String,
        file_type: PreviewKind,
    },
}

#[derive(Debug, Clone)]
pub struct NodeOutput<T> {
    pub values: T,
    pub ui: Option<UiPayload>,
}

impl<T> NodeOutput<T> {
    pub fn with_ui(values: T, ui: UiPayload) -> Self {
        Self {
            values,
            ui: Some(ui),
        }
    }
}
