//! FolderTrim command line front end.
//!
//! Registers one or more folders with size quotas, watches them, and prints
//! every quota event as a JSON line until interrupted. Stands in for the
//! original tray UI: it only *reports* planned evictions, it never deletes.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use foldertrim_core::RegistrationService;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Watch folders and plan oldest-first evictions when they exceed quota.
#[derive(Debug, Parser)]
#[command(name = "foldertrim", version, about)]
struct Cli {
    /// Folders to watch, as PATH:QUOTA_GB (e.g. /var/cache/downloads:2.5).
    #[arg(required = true, value_name = "PATH:QUOTA_GB")]
    folders: Vec<String>,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_folder_spec(spec: &str) -> Result<(PathBuf, f64)> {
    let Some((path, quota)) = spec.rsplit_once(':') else {
        bail!("invalid folder spec {spec:?}: expected PATH:QUOTA_GB");
    };
    let quota_gb: f64 = quota
        .parse()
        .with_context(|| format!("invalid quota in folder spec {spec:?}"))?;
    Ok((PathBuf::from(path), quota_gb))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let (service, mut events) = RegistrationService::with_disk_walk();
    service.start().await?;

    for spec in &cli.folders {
        let (path, quota_gb) = parse_folder_spec(spec)?;
        let status = service
            .register_folder(&path, quota_gb)
            .await
            .with_context(|| format!("failed to register {}", path.display()))?;
        info!(
            "watching {} (quota {} GB)",
            status.path.display(),
            status.max_size_gb()
        );
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Some(event) => println!("{}", serde_json::to_string(&event)?),
                None => break,
            },
        }
    }

    service.stop().await;
    Ok(())
}
