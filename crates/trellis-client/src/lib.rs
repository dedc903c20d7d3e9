//! Client for the Trellis image-to-3D generation backend.
//!
//! One [`TrellisClient`] owns one WebSocket connection and drives one job at
//! a time: submit an image, wait for the multi-stage job to finish, then
//! pull the resulting mesh and turntable video chunk by chunk. Concurrent
//! jobs use independent client instances; there is no shared state.

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod params;
pub mod protocol;
pub mod store;

pub use client::{Job, JobArtifacts, ProgressFn, TrellisClient};
pub use config::Config;
pub use error::{Result, TrellisError};
pub use params::{ParamOverrides, ProcessingParams, TextureSize};
pub use protocol::{ArtifactKind, ChunkResult, CHUNK_SIZE};
