use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tokio::time::{sleep, Duration};
use tracing::{error, info};
use trellis_client::store::{ImageInfo, MetadataStore, SessionMetadata, SessionStore};
use trellis_client::{ArtifactKind, Config, Job, ParamOverrides, TrellisClient};

#[derive(Parser, Debug)]
#[command(name = "trellis-gate")]
#[command(about = "Trellis artifact server and job runner")]
pub struct Cli {
    /// Path to the config file (defaults to ./config.json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Port for the artifact server
    #[arg(short, long, default_value_t = 8188)]
    pub port: u16,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit an image and download the resulting artifacts
    Process(ProcessArgs),

    /// Check the status of a previously submitted job
    Status {
        session_id: String,
        task_id: String,
    },

    /// List the configured parameter presets
    Presets,
}

#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Image file to send
    pub image: PathBuf,

    /// Backend URL, overriding the configured one
    #[arg(long)]
    pub server_url: Option<String>,

    /// Named parameter preset to start from
    #[arg(long)]
    pub preset: Option<String>,

    #[arg(long)]
    pub seed: Option<u32>,
    #[arg(long)]
    pub sparse_steps: Option<u32>,
    #[arg(long)]
    pub sparse_cfg_strength: Option<f64>,
    #[arg(long)]
    pub slat_steps: Option<u32>,
    #[arg(long)]
    pub slat_cfg_strength: Option<f64>,
    #[arg(long)]
    pub simplify: Option<f64>,
    #[arg(long)]
    pub texture_size: Option<u32>,

    /// Bookmark the job under this name for later reuse
    #[arg(long)]
    pub save_session: Option<String>,
}

impl ProcessArgs {
    fn overrides(&self) -> ParamOverrides {
        ParamOverrides {
            seed: self.seed,
            sparse_steps: self.sparse_steps,
            sparse_cfg_strength: self.sparse_cfg_strength,
            slat_steps: self.slat_steps,
            slat_cfg_strength: self.slat_cfg_strength,
            simplify: self.simplify,
            texture_size: self.texture_size,
        }
    }
}

pub async fn run_process(config: &Config, args: ProcessArgs) -> Result<()> {
    let image = std::fs::read(&args.image)
        .with_context(|| format!("could not read {}", args.image.display()))?;
    let server_url = args
        .server_url
        .as_deref()
        .unwrap_or(&config.server.websocket_url);
    let defaults = match &args.preset {
        Some(name) => config.preset_params(name),
        None => config.processing.default_parameters.clone(),
    };
    let mut client = TrellisClient::with_options(
        server_url,
        config.storage.download_dir.clone(),
        defaults,
        config.recv_timeout(),
    );
    connect_with_retry(&mut client, config).await?;

    let overrides = args.overrides();
    let job = client.submit_and_await(&image, &overrides).await?;
    info!("job accepted: session {} task {}", job.session_id, job.task_id);

    let mut on_progress =
        |kind: ArtifactKind, bytes: u64| info!("{kind}: {bytes} bytes downloaded");
    for kind in [ArtifactKind::Model, ArtifactKind::Video] {
        match client.download(&job, kind, Some(&mut on_progress)).await {
            Ok(path) => println!("{kind}: {}", path.display()),
            Err(err) => error!("{kind} download failed: {err}"),
        }
    }

    let metadata = SessionMetadata::new(
        &job,
        client.merged_params(&overrides),
        ImageInfo {
            filename: args
                .image
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            byte_len: image.len() as u64,
        },
    );
    MetadataStore::new(&config.storage.metadata_dir).save(&metadata)?;
    if let Some(name) = &args.save_session {
        SessionStore::new(config.storage.session_dir.clone()).save(name, &job)?;
    }

    client.disconnect().await;
    Ok(())
}

pub async fn run_status(config: &Config, session_id: String, task_id: String) -> Result<()> {
    let mut client = TrellisClient::from_config(config);
    connect_with_retry(&mut client, config).await?;
    let reply = client
        .check_status(&Job {
            session_id,
            task_id,
        })
        .await?;
    match reply.message {
        Some(message) => println!("status: {} ({message})", reply.status),
        None => println!("status: {}", reply.status),
    }
    client.disconnect().await;
    Ok(())
}

pub fn run_presets(config: &Config) {
    for name in config.preset_names() {
        let params = config.preset_params(&name);
        println!(
            "{name}: sparse_steps={} slat_steps={} texture_size={}",
            params.sparse_steps,
            params.slat_steps,
            params.texture_size.as_u32()
        );
    }
}

/// Startup-style connect: a small fixed number of attempts with a fixed
/// delay, then give up.
async fn connect_with_retry(client: &mut TrellisClient, config: &Config) -> Result<()> {
    let attempts = config.server.reconnect_attempts.max(1);
    let delay = Duration::from_secs(config.server.reconnect_delay_seconds);
    let mut attempt = 1;
    loop {
        match client.connect().await {
            Ok(()) => return Ok(()),
            Err(err) if attempt < attempts => {
                error!("connection attempt {attempt}/{attempts} failed: {err}");
                attempt += 1;
                sleep(delay).await;
            }
            Err(err) => return Err(err.into()),
        }
    }
}
