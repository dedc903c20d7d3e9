//! The processing nodes: submit an image (or several) and return artifact
//! paths.
//!
//! The host has no error channel for node execution, so the public entry
//! points never propagate: every failure becomes empty-string outputs plus
//! a logged error, and a partial job (say, mesh downloaded but video
//! failed) yields whatever succeeded.

use thiserror::Error;
use tracing::{error, warn};
use trellis_client::store::{ImageInfo, MetadataStore, SessionMetadata};
use trellis_client::{Config, JobArtifacts, ParamOverrides, TrellisClient, TrellisError};

use crate::image_input::{ImageInput, ImageInputError};
use crate::runtime;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Client(#[from] TrellisError),
    #[error(transparent)]
    Image(#[from] ImageInputError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Typed inputs shared by the processing nodes.
#[derive(Debug, Clone, Default)]
pub struct ProcessInputs {
    /// Overrides the configured backend URL when set.
    pub server_url: Option<String>,
    /// Named preset applied under the explicit per-field overrides.
    pub preset: Option<String>,
    pub overrides: ParamOverrides,
}

pub struct ProcessNode {
    config: Config,
}

impl ProcessNode {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Host entry point. Returns `(glb_path, video_path)`, empty on failure.
    pub fn process(&self, image: ImageInput, inputs: &ProcessInputs) -> (String, String) {
        match runtime::block_on(self.process_async(image, inputs)) {
            Ok(Ok(paths)) => paths,
            Ok(Err(err)) => {
                error!("trellis processing failed: {err}");
                (String::new(), String::new())
            }
            Err(err) => {
                error!("could not start runtime: {err}");
                (String::new(), String::new())
            }
        }
    }

    async fn process_async(
        &self,
        image: ImageInput,
        inputs: &ProcessInputs,
    ) -> Result<(String, String), NodeError> {
        let png = image.into_png_bytes()?;
        let mut client = self.build_client(inputs);

        let job = client.submit_and_await(&png, &inputs.overrides).await?;
        let artifacts = client.fetch_artifacts(&job).await;
        client.disconnect().await;

        let metadata = SessionMetadata::new(
            &job,
            client.merged_params(&inputs.overrides),
            ImageInfo {
                filename: None,
                byte_len: png.len() as u64,
            },
        );
        if let Err(err) = MetadataStore::new(&self.config.storage.metadata_dir).save(&metadata) {
            warn!("could not save session metadata: {err}");
        }

        Ok(paths_or_empty(artifacts))
    }

    fn build_client(&self, inputs: &ProcessInputs) -> TrellisClient {
        let server_url = inputs
            .server_url
            .as_deref()
            .unwrap_or(&self.config.server.websocket_url);
        let defaults = match &inputs.preset {
            Some(name) => self.config.preset_params(name),
            None => self.config.processing.default_parameters.clone(),
        };
        TrellisClient::with_options(
            server_url,
            self.config.storage.download_dir.clone(),
            defaults,
            self.config.recv_timeout(),
        )
    }
}

/// Multi-image variant: one job built from several views of the same
/// subject. Additionally exposes the job tokens for downstream nodes.
pub struct MultiImageNode {
    config: Config,
}

impl MultiImageNode {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Returns `(glb_path, video_path, session_id, task_id)`, empty on failure.
    pub fn process(
        &self,
        images: Vec<ImageInput>,
        inputs: &ProcessInputs,
    ) -> (String, String, String, String) {
        match runtime::block_on(self.process_async(images, inputs)) {
            Ok(Ok(out)) => out,
            Ok(Err(err)) => {
                error!("trellis multi-image processing failed: {err}");
                Default::default()
            }
            Err(err) => {
                error!("could not start runtime: {err}");
                Default::default()
            }
        }
    }

    async fn process_async(
        &self,
        images: Vec<ImageInput>,
        inputs: &ProcessInputs,
    ) -> Result<(String, String, String, String), NodeError> {
        let mut encoded = Vec::with_capacity(images.len());
        for image in images {
            encoded.push(image.into_png_bytes()?);
        }
        let mut client = ProcessNode::new(self.config.clone()).build_client(inputs);

        let job = client.submit_many_and_await(&encoded, &inputs.overrides).await?;
        let artifacts = client.fetch_artifacts(&job).await;
        client.disconnect().await;

        let (glb, video) = paths_or_empty(artifacts);
        Ok((glb, video, job.session_id, job.task_id))
    }
}

fn paths_or_empty(artifacts: JobArtifacts) -> (String, String) {
    let to_string = |path: Option<std::path::PathBuf>| {
        path.map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default()
    };
    (to_string(artifacts.model), to_string(artifacts.video))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_produces_empty_outputs_not_a_panic() {
        // point at a port nothing listens on; the node must swallow the error
        let mut config = Config::default();
        config.server.websocket_url = "ws://127.0.0.1:1".to_string();
        let node = ProcessNode::new(config);
        let image = ImageInput::Rgba {
            width: 1,
            height: 1,
            data: vec![0, 0, 0, 255],
        };
        let (glb, video) = node.process(image, &ProcessInputs::default());
        assert_eq!(glb, "");
        assert_eq!(video, "");
    }

    #[test]
    fn preset_feeds_client_defaults() {
        let config = Config::default();
        let node = ProcessNode::new(config.clone());
        let inputs = ProcessInputs {
            preset: Some("fast".to_string()),
            ..Default::default()
        };
        let client = node.build_client(&inputs);
        let merged = client.merged_params(&ParamOverrides::default());
        assert_eq!(merged, config.preset_params("fast"));
    }
}
