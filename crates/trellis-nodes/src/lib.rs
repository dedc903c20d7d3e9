//! Host-facing node wrappers around [`trellis_client`].
//!
//! Each node reads typed inputs, drives one job on a fresh runtime, and
//! converts every failure into empty outputs plus a log line; the host has
//! no structured error channel for node execution.

pub mod image_input;
pub mod output;
pub mod process;
pub mod runtime;
pub mod session;
pub mod viewer;

pub use image_input::ImageInput;
pub use output::{NodeOutput, PreviewKind, UiPayload};
pub use process::{MultiImageNode, ProcessInputs, ProcessNode};
pub use session::{SessionAction, SessionNode, StatusNode};
pub use viewer::{ModelViewerNode, PreviewNode, PreviewRegistry, VideoPlayerNode};
