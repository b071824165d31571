//! CLI glue for waver: command parsing and the async [`run`] entrypoint.
//!
//! All generation logic lives in `waver-core`; this module loads the config
//! file, prepares the bucket and hands requests to
//! [`GenerationService`](waver_core::process::GenerationService), either once
//! (`generate`) or for every JSON line read from stdin (`listen`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use waver_core::process::GenerationService;
use waver_core::store::{init_bucket, store_from_settings};

use crate::ingress::{GenerationRequest, Ingress};
use crate::load_config::load_config;

/// CLI for waver: turn a source repository into a tutorial stored in a bucket.
#[derive(Parser)]
#[clap(
    name = "waver",
    version,
    about = "Generate tutorials from source repositories and upload them to object storage"
)]
pub struct Cli {
    /// Log at debug level (RUST_LOG still takes precedence)
    #[clap(short, long, global = true)]
    pub verbose: bool,
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a tutorial for one repository and upload it
    Generate {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Repository location: a local directory or a git URL
        #[clap(long)]
        source: String,
    },
    /// Read one JSON request per stdin line, e.g. {"sourceUrl": "..."}
    Listen {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
}

impl Cli {
    pub fn config_path(&self) -> &Path {
        match &self.command {
            Commands::Generate { config, .. } | Commands::Listen { config } => config,
        }
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Generate { config, source } => {
            let service = build_service(&config).await?;
            tracing::info!(command = "generate", source = %source, "Starting generation");
            let report = service
                .generate(&source)
                .await
                .with_context(|| format!("Generation failed for '{source}'"))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            println!(
                "Uploaded {} file(s), {} failed",
                report.success_count(),
                report.failure_count()
            );
            Ok(())
        }
        Commands::Listen { config } => {
            let service = build_service(&config).await?;
            tracing::info!(command = "listen", "Reading requests from stdin");
            let (ingress, worker) = Ingress::start(service);

            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Option<GenerationRequest>>(&line) {
                    Ok(request) => {
                        ingress.submit(request);
                    }
                    Err(e) => tracing::warn!(error = %e, "Ignoring malformed request line"),
                }
            }

            drop(ingress);
            tracing::info!(command = "listen", "Input closed, waiting for running requests");
            worker.await.context("Request processor crashed")?;
            Ok(())
        }
    }
}

async fn build_service(config_path: &Path) -> Result<GenerationService> {
    let config = load_config(config_path)?;
    config.waver.trace_loaded();
    config.minio.trace_loaded();

    let store = store_from_settings(&config.minio)?;
    // A failed bucket check is reported but does not stop the process.
    init_bucket(store.as_ref(), &config.minio.bucket_name).await;

    Ok(GenerationService::new(
        config.waver,
        store,
        config.minio.bucket_name,
    ))
}
