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

use crate::errors::VsnError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Datalogger model family. Determines the auth scheme (digest vs basic)
/// and which vendor point namespace a livedata payload uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VsnModel {
    #[serde(rename = "VSN300")]
    Vsn300,
    #[serde(rename = "VSN700")]
    Vsn700,
}

impl VsnModel {
    pub fn as_str(self) -> &'static str {
        match self {
            VsnModel::Vsn300 => "VSN300",
            VsnModel::Vsn700 => "VSN700",
        }
    }
}

impl fmt::Display for VsnModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VsnModel {
    type Err = VsnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VSN300" => Ok(VsnModel::Vsn300),
            "VSN700" => Ok(VsnModel::Vsn700),
            other => Err(VsnError::UnsupportedModel(other.to_owned())),
        }
    }
}

/// One canonical point definition from the VSN-SunSpec mapping table.
///
/// `ha_entity_name` is the primary key; the vendor name fields are `None`
/// when the point does not exist in that vendor's namespace (the loader
/// already folded the "N/A" sentinel away).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointMapping {
    pub vsn700_name: Option<String>,
    pub vsn300_name: Option<String>,
    pub sunspec_name: Option<String>,
    pub ha_entity_name: String,
    pub in_livedata: bool,
    pub in_feeds: bool,
    pub label: String,
    pub description: String,
    pub display_name: String,
    pub models: Vec<String>,
    pub category: String,
    pub units: String,
    pub state_class: String,
    pub device_class: String,
    pub entity_category: Option<String>,
    pub available_in_modbus: String,
    pub icon: Option<String>,
    pub suggested_display_precision: Option<i64>,
}

/// One raw point as reported by the vendor livedata endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPoint {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Value,
}

/// One device entry in the raw livedata payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDevice {
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub device_model: Option<String>,
    #[serde(default)]
    pub points: Option<Vec<RawPoint>>,
}

/// Raw livedata response: device id (serial number, or MAC with colons for
/// some dataloggers) to device entry.
pub type RawLivedata = BTreeMap<String, RawDevice>;

/// One canonical point after normalization, with HA display metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedPoint {
    pub value: Value,
    pub units: String,
    pub device_class: String,
    pub state_class: String,
    pub label: String,
    pub description: String,
    pub display_name: String,
    pub category: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sunspec_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_display_precision: Option<i64>,
}

/// One device in the normalized output, keyed by canonical entity names.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedDevice {
    pub points: BTreeMap<String, NormalizedPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
}

/// Normalized result of one poll cycle. Recomputed wholesale every cycle;
/// never merged with a previous cycle's output.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedOutput {
    pub devices: BTreeMap<String, NormalizedDevice>,
}

impl NormalizedOutput {
    /// Total number of normalized points across all devices.
    pub fn point_count(&self) -> usize {
        self.devices.values().map(|d| d.points.len()).sum()
    }
}

/// A device found during discovery (inverter, meter, battery, datalogger).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveredDevice {
    /// Clean ID (S/N, or MAC without colons)
    pub device_id: String,
    /// Original ID from the API (with colons if MAC)
    pub raw_device_id: String,
    /// inverter_3phases, meter, battery, datalogger, ...
    pub device_type: String,
    pub device_model: Option<String>,
    pub manufacturer: Option<String>,
    pub firmware_version: Option<String>,
    pub hardware_version: Option<String>,
    pub is_datalogger: bool,
}

/// Complete discovery result from a VSN device.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryResult {
    pub vsn_model: VsnModel,
    pub logger_sn: String,
    pub logger_model: Option<String>,
    pub firmware_version: Option<String>,
    pub hostname: Option<String>,
    pub devices: Vec<DiscoveredDevice>,
}

impl DiscoveryResult {
    /// Suitable display title, e.g. "VSN300 (111033-3N16-1421)".
    pub fn title(&self) -> String {
        format!("{} ({})", self.vsn_model, self.logger_sn)
    }

    /// First inverter found, if any.
    pub fn main_inverter(&self) -> Option<&DiscoveredDevice> {
        self.devices
            .iter()
            .find(|d| d.device_type.starts_with("inverter"))
    }
}
