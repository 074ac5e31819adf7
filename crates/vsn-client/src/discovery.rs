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

//! Device discovery: gathers the datalogger identity from `/v1/status` and
//! every connected device (inverters, meters, batteries) from
//! `/v1/livedata`.

use crate::client::VsnClient;
use crate::errors::{VsnError, VsnResult};
use crate::models::{DiscoveredDevice, DiscoveryResult, RawLivedata, VsnModel};
use serde_json::Value;
use tracing::{debug, info};

const UNKNOWN_SN: &str = "Unknown";

/// Logger identity extracted from the status payload.
#[derive(Debug, Clone)]
pub struct LoggerInfo {
    pub logger_sn: String,
    pub logger_model: Option<String>,
    pub firmware_version: Option<String>,
    pub hostname: Option<String>,
}

/// Run full discovery against a device. Connects the client if needed.
pub async fn discover_vsn_device(client: &mut VsnClient) -> VsnResult<DiscoveryResult> {
    debug!("Starting device discovery at {}", client.base_url());
    client.connect().await?;

    let model = client
        .model()
        .ok_or_else(|| VsnError::DetectionFailed("model not detected".to_owned()))?;

    let status = client.status().await?;
    let livedata = client.livedata().await?;

    let logger_info = extract_logger_info(&status, model);
    let devices = extract_devices(&livedata, model, &status);

    info!(
        "Discovery complete: {model} logger {} with {} devices",
        logger_info.logger_sn,
        devices.len()
    );

    Ok(DiscoveryResult {
        vsn_model: model,
        logger_sn: logger_info.logger_sn,
        logger_model: logger_info.logger_model,
        firmware_version: logger_info.firmware_version,
        hostname: logger_info.hostname,
        devices,
    })
}

fn status_key(status: &Value, key: &str) -> Option<String> {
    status
        .get("keys")?
        .get(key)?
        .get("value")?
        .as_str()
        .map(str::to_owned)
}

/// Pull the logger identity out of the status payload. VSN700 loggers
/// without a serial number report their MAC under `logger.loggerId`.
pub fn extract_logger_info(status: &Value, model: VsnModel) -> LoggerInfo {
    let mut logger_sn =
        status_key(status, "logger.sn").unwrap_or_else(|| UNKNOWN_SN.to_owned());

    if logger_sn == UNKNOWN_SN && model == VsnModel::Vsn700 {
        logger_sn =
            status_key(status, "logger.loggerId").unwrap_or_else(|| UNKNOWN_SN.to_owned());
    }

    LoggerInfo {
        logger_sn,
        logger_model: status_key(status, "logger.board_model"),
        firmware_version: status_key(status, "fw.release_number"),
        hostname: status_key(status, "logger.hostname"),
    }
}

/// Build the device list from livedata, plus a synthetic datalogger entry.
///
/// The datalogger never appears in livedata under its own serial number;
/// it is synthesized from the status payload. Livedata entries keyed by a
/// MAC (colons in the id) are datalogger self-entries: the `sn` point wins
/// as the clean id when present, otherwise the colons are stripped.
pub fn extract_devices(
    livedata: &RawLivedata,
    model: VsnModel,
    status: &Value,
) -> Vec<DiscoveredDevice> {
    let mut devices = Vec::new();

    let logger_info = extract_logger_info(status, model);
    let logger_sn = logger_info.logger_sn;
    let logger_id = logger_sn.replace(':', "");

    devices.push(DiscoveredDevice {
        device_id: logger_id.clone(),
        raw_device_id: logger_sn,
        device_type: "datalogger".to_owned(),
        device_model: Some(model.as_str().to_owned()),
        manufacturer: Some(
            match model {
                VsnModel::Vsn300 => "ABB",
                VsnModel::Vsn700 => "FIMER",
            }
            .to_owned(),
        ),
        firmware_version: logger_info.firmware_version,
        hardware_version: None,
        is_datalogger: true,
    });
    debug!("Created synthetic datalogger device {logger_id} ({model})");

    for (raw_device_id, device_data) in livedata {
        let is_datalogger = raw_device_id.contains(':');
        let points = device_data.points.as_deref().unwrap_or(&[]);

        let device_id = if is_datalogger {
            points
                .iter()
                .find(|p| p.name.as_deref() == Some("sn"))
                .and_then(|p| p.value.as_str())
                .map_or_else(|| raw_device_id.replace(':', ""), str::to_owned)
        } else {
            raw_device_id.clone()
        };

        let device_type = if is_datalogger {
            "datalogger".to_owned()
        } else {
            device_data
                .device_type
                .clone()
                .unwrap_or_else(|| "unknown".to_owned())
        };

        let device_model = if is_datalogger {
            Some(model.as_str().to_owned())
        } else {
            match model {
                VsnModel::Vsn700 => device_data.device_model.clone(),
                VsnModel::Vsn300 => status_key(status, "device.modelDesc"),
            }
        };

        let mut manufacturer = None;
        let mut firmware_version = None;
        for point in points {
            match point.name.as_deref() {
                Some("C_Mn") => manufacturer = point.value.as_str().map(str::to_owned),
                // SunSpec inverter firmware (e.g. "C008") or datalogger
                // firmware (e.g. "1.9.2")
                Some("C_Vr") | Some("fw_ver") => {
                    firmware_version = point.value.as_str().map(str::to_owned);
                }
                _ => {}
            }
        }

        debug!(
            "Discovered device {device_id} ({device_type}), model {:?}",
            device_model
        );

        devices.push(DiscoveredDevice {
            device_id,
            raw_device_id: raw_device_id.clone(),
            device_type,
            device_model,
            manufacturer,
            firmware_version,
            hardware_version: None,
            is_datalogger,
        });
    }

    devices
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vsn300_status() -> Value {
        json!({
            "keys": {
                "logger.sn": {"value": "111033-3N16-1421"},
                "logger.board_model": {"value": "WIFI LOGGER CARD"},
                "fw.release_number": {"value": "1.9.2"},
                "logger.hostname": {"value": "ABB-077909-3G82-3112.local"},
                "device.modelDesc": {"value": "PVI-10.0-OUTD"}
            }
        })
    }

    fn vsn300_livedata() -> RawLivedata {
        serde_json::from_value(json!({
            "077909-3G82-3112": {
                "device_type": "inverter_3phases",
                "points": [
                    {"name": "C_Mn", "value": "Power-One"},
                    {"name": "C_Vr", "value": "C008"},
                    {"name": "m103_1_W", "value": 5000}
                ]
            },
            "a4:06:e9:7f:42:49": {
                "points": [
                    {"name": "sn", "value": "111033-3N16-1421"},
                    {"name": "fw_ver", "value": "1.9.2"}
                ]
            }
        }))
        .unwrap()
    }

    #[test]
    fn logger_info_from_vsn300_status() {
        let info = extract_logger_info(&vsn300_status(), VsnModel::Vsn300);
        assert_eq!(info.logger_sn, "111033-3N16-1421");
        assert_eq!(info.logger_model.as_deref(), Some("WIFI LOGGER CARD"));
        assert_eq!(info.firmware_version.as_deref(), Some("1.9.2"));
        assert_eq!(
            info.hostname.as_deref(),
            Some("ABB-077909-3G82-3112.local")
        );
    }

    #[test]
    fn vsn700_logger_sn_falls_back_to_logger_id() {
        let status = json!({
            "keys": {
                "logger.loggerId": {"value": "a4:06:e9:7f:42:49"}
            }
        });
        let info = extract_logger_info(&status, VsnModel::Vsn700);
        assert_eq!(info.logger_sn, "a4:06:e9:7f:42:49");

        // VSN300 does not use the fallback
        let info = extract_logger_info(&status, VsnModel::Vsn300);
        assert_eq!(info.logger_sn, "Unknown");
    }

    #[test]
    fn devices_include_synthetic_datalogger() {
        let devices = extract_devices(&vsn300_livedata(), VsnModel::Vsn300, &vsn300_status());

        // synthetic datalogger + inverter + datalogger self-entry
        assert_eq!(devices.len(), 3);
        let synthetic = &devices[0];
        assert!(synthetic.is_datalogger);
        assert_eq!(synthetic.device_id, "111033-3N16-1421");
        assert_eq!(synthetic.device_model.as_deref(), Some("VSN300"));
        assert_eq!(synthetic.manufacturer.as_deref(), Some("ABB"));
        assert_eq!(synthetic.firmware_version.as_deref(), Some("1.9.2"));
    }

    #[test]
    fn inverter_metadata_sniffed_from_points() {
        let devices = extract_devices(&vsn300_livedata(), VsnModel::Vsn300, &vsn300_status());
        let inverter = devices
            .iter()
            .find(|d| d.device_type == "inverter_3phases")
            .unwrap();

        assert_eq!(inverter.device_id, "077909-3G82-3112");
        assert_eq!(inverter.manufacturer.as_deref(), Some("Power-One"));
        assert_eq!(inverter.firmware_version.as_deref(), Some("C008"));
        assert_eq!(inverter.device_model.as_deref(), Some("PVI-10.0-OUTD"));
        assert!(!inverter.is_datalogger);
    }

    #[test]
    fn mac_keyed_entry_prefers_sn_point() {
        let devices = extract_devices(&vsn300_livedata(), VsnModel::Vsn300, &vsn300_status());
        let self_entry = devices
            .iter()
            .find(|d| d.raw_device_id == "a4:06:e9:7f:42:49")
            .unwrap();

        assert!(self_entry.is_datalogger);
        assert_eq!(self_entry.device_id, "111033-3N16-1421");
        assert_eq!(self_entry.device_type, "datalogger");
        assert_eq!(self_entry.firmware_version.as_deref(), Some("1.9.2"));
    }

    #[test]
    fn mac_without_sn_point_is_stripped() {
        let livedata: RawLivedata = serde_json::from_value(json!({
            "a4:06:e9:7f:42:49": {
                "points": [{"name": "free_ram", "value": 1024}]
            }
        }))
        .unwrap();
        let status = json!({"keys": {"logger.loggerId": {"value": "a4:06:e9:7f:42:49"}}});

        let devices = extract_devices(&livedata, VsnModel::Vsn700, &status);
        let self_entry = devices
            .iter()
            .find(|d| d.raw_device_id == "a4:06:e9:7f:42:49")
            .unwrap();
        assert_eq!(self_entry.device_id, "a406e97f4249");
    }

    #[test]
    fn vsn700_device_model_comes_from_livedata() {
        let livedata: RawLivedata = serde_json::from_value(json!({
            "102905-3M95-3720": {
                "device_type": "inverter_3phases",
                "device_model": "TRIO-20.0-TL-OUTD",
                "points": [{"name": "Pgrid", "value": 1}]
            }
        }))
        .unwrap();

        let devices = extract_devices(&livedata, VsnModel::Vsn700, &json!({"keys": {}}));
        let inverter = &devices[1];
        assert_eq!(inverter.device_model.as_deref(), Some("TRIO-20.0-TL-OUTD"));
    }
}
