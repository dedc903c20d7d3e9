//! The job client: submission, completion wait, and chunked artifact
//! retrieval over one exclusively-owned connection.
//!
//! Everything here is sequential per job. Chunk fetches must not be
//! reordered or parallelized: ordering is implicit in the offset cursor the
//! server keeps per `(session_id, task_id)`, not in any chunk header.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::connection::Connection;
use crate::error::{Result, TrellisError};
use crate::params::{ParamOverrides, ProcessingParams};
use crate::protocol::{ArtifactKind, ChunkResult, Command, Reply};

/// Capability token pair returned when the backend accepts a job. Both
/// tokens must be echoed back verbatim on every retrieval call; all other
/// job state lives server-side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub session_id: String,
    pub task_id: String,
}

/// Where the two artifacts of a finished job ended up. A `None` means that
/// download failed; the failure never cancels the other artifact.
#[derive(Debug, Clone, Default)]
pub struct JobArtifacts {
    pub model: Option<PathBuf>,
    pub video: Option<PathBuf>,
}

/// Per-chunk progress callback: artifact kind and bytes received so far.
/// The wire protocol carries no total size, so percentages are up to the
/// caller if it knows the expected artifact size.
pub type ProgressFn<'a> = dyn FnMut(ArtifactKind, u64) + 'a;

pub struct TrellisClient {
    conn: Connection,
    defaults: ProcessingParams,
    download_dir: PathBuf,
}

impl TrellisClient {
    pub fn new(server_url: &str, download_dir: impl Into<PathBuf>) -> Self {
        Self::with_options(
            server_url,
            download_dir,
            ProcessingParams::default(),
            Some(Duration::from_secs(600)),
        )
    }

    pub fn with_options(
        server_url: &str,
        download_dir: impl Into<PathBuf>,
        defaults: ProcessingParams,
        recv_timeout: Option<Duration>,
    ) -> Self {
        Self {
            conn: Connection::new(server_url, recv_timeout),
            defaults,
            download_dir: download_dir.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::with_options(
            &config.server.websocket_url,
            config.storage.download_dir.clone(),
            config.processing.default_parameters.clone(),
            config.recv_timeout(),
        )
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Parameters that would be transmitted for the given overrides.
    pub fn merged_params(&self, overrides: &ParamOverrides) -> ProcessingParams {
        overrides.apply_to(&self.defaults)
    }

    pub async fn connect(&mut self) -> Result<()> {
        self.conn.connect().await
    }

    pub async fn disconnect(&mut self) {
        self.conn.disconnect().await;
    }

    /// Submit one image and wait for the job to finish.
    ///
    /// Sends the submit envelope, requires an `accepted` reply carrying the
    /// task id, then consumes the stream until a terminal status arrives.
    /// Non-terminal statuses are logged as progress and skipped.
    pub async fn submit_and_await(
        &mut self,
        image: &[u8],
        overrides: &ParamOverrides,
    ) -> Result<Job> {
        let command = Command::ProcessSingle {
            image: BASE64.encode(image),
            params: overrides.apply_to(&self.defaults),
        };
        self.submit(command).await
    }

    /// Multi-image variant of [`submit_and_await`](Self::submit_and_await).
    pub async fn submit_many_and_await(
        &mut self,
        images: &[Vec<u8>],
        overrides: &ParamOverrides,
    ) -> Result<Job> {
        let command = Command::ProcessMulti {
            images: images.iter().map(|img| BASE64.encode(img)).collect(),
            params: overrides.apply_to(&self.defaults),
        };
        self.submit(command).await
    }

    async fn submit(&mut self, command: Command) -> Result<Job> {
        self.conn.ensure_connection().await?;
        match self.drive_submission(command).await {
            Ok(job) => Ok(job),
            Err(err) => {
                // Leave the channel for dead so the next call reconnects.
                self.conn.mark_dead();
                Err(err)
            }
        }
    }

    async fn drive_submission(&mut self, command: Command) -> Result<Job> {
        self.conn.send(&command).await?;
        debug!("submitted processing request");

        let accepted = self.conn.recv_reply().await?;
        if !accepted.is_status("accepted") {
            return Err(TrellisError::Rejected(
                accepted.message_or("request not accepted"),
            ));
        }
        let Some(task_id) = accepted.task_id else {
            return Err(TrellisError::Rejected(
                "accepted reply missing task_id".to_string(),
            ));
        };
        info!("task accepted: {task_id}");

        loop {
            let reply = self.conn.recv_reply().await?;
            match reply.status.as_str() {
                "success" => {
                    let Some(session_id) = reply.session_id else {
                        return Err(TrellisError::Processing(
                            "success reply missing session_id".to_string(),
                        ));
                    };
                    info!("job complete, session {session_id}");
                    return Ok(Job {
                        session_id,
                        task_id,
                    });
                }
                "error" => {
                    return Err(TrellisError::Processing(
                        reply.message_or("processing failed"),
                    ));
                }
                status => {
                    info!(
                        status,
                        progress = reply.progress,
                        message = reply.message.as_deref().unwrap_or(""),
                        "progress update"
                    );
                }
            }
        }
    }

    /// Ask the backend for the current status of a job.
    pub async fn check_status(&mut self, job: &Job) -> Result<Reply> {
        self.conn.ensure_connection().await?;
        self.conn
            .send(&Command::CheckStatus {
                session_id: job.session_id.clone(),
                task_id: job.task_id.clone(),
            })
            .await?;
        self.conn.recv_reply().await
    }

    /// Download one artifact by walking the offset cursor until the server
    /// signals end-of-stream, then write the reassembled bytes in a single
    /// pass. An interrupted download therefore leaves no file at all rather
    /// than a truncated one.
    pub async fn download(
        &mut self,
        job: &Job,
        kind: ArtifactKind,
        mut progress: Option<&mut ProgressFn<'_>>,
    ) -> Result<PathBuf> {
        self.conn.ensure_connection().await?;
        info!("downloading {kind} for session {}", job.session_id);

        let mut offset: u64 = 0;
        let mut chunks: Vec<Vec<u8>> = Vec::new();
        loop {
            self.conn
                .send(&Command::chunk(kind, &job.session_id, &job.task_id, offset))
                .await?;
            let reply = self.conn.recv_reply().await?;
            match ChunkResult::from_reply(&reply)? {
                ChunkResult::Data(chunk) => {
                    offset += chunk.len() as u64;
                    chunks.push(chunk);
                    if let Some(callback) = progress.as_deref_mut() {
                        callback(kind, offset);
                    }
                }
                ChunkResult::EndOfStream => break,
                ChunkResult::Failure(message) => {
                    return Err(TrellisError::Server(message));
                }
            }
        }

        tokio::fs::create_dir_all(&self.download_dir).await?;
        let path = self.download_dir.join(kind.file_name(&job.session_id));
        let mut buffer = Vec::with_capacity(offset as usize);
        for chunk in &chunks {
            buffer.extend_from_slice(chunk);
        }
        tokio::fs::write(&path, &buffer).await?;
        info!("downloaded {kind} ({offset} bytes) to {}", path.display());
        Ok(path)
    }

    /// Download both artifacts with per-artifact failure isolation: a failed
    /// video download must not discard an already-successful mesh, and vice
    /// versa.
    pub async fn fetch_artifacts(&mut self, job: &Job) -> JobArtifacts {
        let mut artifacts = JobArtifacts::default();
        for kind in [ArtifactKind::Model, ArtifactKind::Video] {
            match self.download(job, kind, None).await {
                Ok(path) => match kind {
                    ArtifactKind::Model => artifacts.model = Some(path),
                    ArtifactKind::Video => artifacts.video = Some(path),
                },
                Err(err) => {
                    warn!("{kind} download failed for session {}: {err}", job.session_id);
                }
            }
        }
        artifacts
    }
}
