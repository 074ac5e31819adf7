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

use crate::errors::{VsnError, VsnResult};
use std::time::Duration;
use tracing::debug;

/// Fail fast when the device is offline: a plain TCP connect is much
/// cheaper than waiting out a full HTTP timeout.
pub async fn check_socket_connection(base_url: &str, timeout: Duration) -> VsnResult<()> {
    let url = reqwest::Url::parse(base_url)
        .map_err(|e| VsnError::ConnectionFailed(format!("invalid device URL {base_url}: {e}")))?;

    let host = url
        .host_str()
        .ok_or_else(|| VsnError::ConnectionFailed(format!("no host in device URL {base_url}")))?
        .to_owned();
    let port = url
        .port_or_known_default()
        .ok_or_else(|| VsnError::ConnectionFailed(format!("no port in device URL {base_url}")))?;

    debug!("Testing TCP connection to {host}:{port}");

    match tokio::time::timeout(timeout, tokio::net::TcpStream::connect((host.as_str(), port)))
        .await
    {
        Ok(Ok(_stream)) => {
            debug!("TCP connection to {host}:{port} succeeded");
            Ok(())
        }
        Ok(Err(e)) => Err(VsnError::ConnectionFailed(format!(
            "cannot connect to {host}:{port}: {e}"
        ))),
        Err(_) => Err(VsnError::ConnectionFailed(format!(
            "timeout connecting to {host}:{port}"
        ))),
    }
}

/// Compact a serial number for use as a stable identifier: separators
/// removed, lowercased. "077909-3G82-3112" becomes "0779093g823112".
pub fn compact_serial_number(serial: &str) -> String {
    serial
        .chars()
        .filter(|c| !matches!(c, '-' | ':' | '_'))
        .collect::<String>()
        .to_lowercase()
}

/// User-facing device name, "Manufacturer Type Model (SERIAL)". A custom
/// prefix replaces the whole thing.
pub fn format_device_name(
    manufacturer: &str,
    device_type_simple: &str,
    device_model: Option<&str>,
    device_sn_original: &str,
    custom_prefix: Option<&str>,
) -> String {
    if let Some(prefix) = custom_prefix.filter(|p| !p.is_empty()) {
        return prefix.to_owned();
    }

    let sn_display = device_sn_original.to_uppercase();
    let type_display = capitalize(device_type_simple);

    match device_model {
        Some(model) => format!("{manufacturer} {type_display} {model} ({sn_display})"),
        None => format!("{manufacturer} {type_display} {sn_display}"),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
