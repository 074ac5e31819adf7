// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of VSN Bridge.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

mod config;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::FmtSubscriber;
use vsn_client::{NormalizedOutput, VsnClient, VsnModel, discover_vsn_device};

use config::AppConfig;

/// Polls an ABB/FIMER VSN300/VSN700 datalogger and prints normalized
/// SunSpec-aligned readings.
#[derive(Parser, Debug)]
#[command(name = "vsn-bridge", version, about)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Poll once, print the snapshot as JSON and exit
    #[arg(long)]
    once: bool,
}

/// Output of a single `--once` poll.
#[derive(Debug, Serialize)]
struct Snapshot {
    fetched_at: DateTime<Utc>,
    vsn_model: VsnModel,
    data: NormalizedOutput,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;

    info!("Starting VSN Bridge");
    info!("   Device: {}", config.device.host);
    info!(
        "   Model: {}",
        config
            .device
            .model
            .map_or_else(|| "auto-detect".to_owned(), |m| m.to_string())
    );
    info!("   Scan interval: {}s", config.polling.scan_interval_secs);

    let mut client = build_client(&config)?;

    let discovery = discover_vsn_device(&mut client).await?;
    info!("Discovered {}", discovery.title());
    if let Some(fw) = &discovery.firmware_version {
        info!("   Logger firmware: {fw}");
    }
    for device in &discovery.devices {
        info!(
            "   - {} ({}){}",
            device.device_id,
            device.device_type,
            device
                .device_model
                .as_deref()
                .map_or_else(String::new, |m| format!(" [{m}]"))
        );
    }
    let model = discovery.vsn_model;
    client = client.with_discovered_devices(discovery.devices);

    if cli.once {
        let data = client.normalized_data().await?;
        let snapshot = Snapshot {
            fetched_at: Utc::now(),
            vsn_model: model,
            data,
        };
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    poll_loop(&mut client, &config).await
}

fn build_client(config: &AppConfig) -> Result<VsnClient> {
    let mut client = VsnClient::new(
        config.device.host.clone(),
        config.device.username.clone(),
        config.device.password.clone(),
    )?
    .with_requires_auth(config.device.requires_auth);

    if let Some(model) = config.device.model {
        client = client.with_model(model);
    }
    if let Some(file) = &config.mapping.file {
        client = client.with_mapping_file(file);
    }

    Ok(client)
}

async fn poll_loop(client: &mut VsnClient, config: &AppConfig) -> Result<()> {
    let mut interval =
        tokio::time::interval(Duration::from_secs(config.polling.scan_interval_secs));
    let mut consecutive_failures: u32 = 0;

    loop {
        interval.tick().await;

        match client.normalized_data().await {
            Ok(output) => {
                if consecutive_failures > 0 {
                    info!("Device recovered after {consecutive_failures} failed polls");
                    consecutive_failures = 0;
                }
                info!(
                    "Poll cycle: {} devices, {} points",
                    output.devices.len(),
                    output.point_count()
                );
                println!("{}", serde_json::to_string(&output)?);
            }
            Err(e) => {
                consecutive_failures += 1;
                if consecutive_failures >= config.polling.failures_threshold {
                    error!(
                        "Device unreachable ({consecutive_failures} consecutive failures): {e}"
                    );
                } else {
                    warn!("Poll failed ({consecutive_failures}): {e}");
                }
            }
        }
    }
}
