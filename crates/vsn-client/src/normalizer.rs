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

use crate::mapping::MappingIndex;
use crate::models::{
    NormalizedDevice, NormalizedOutput, NormalizedPoint, PointMapping, RawLivedata, VsnModel,
};
use crate::names::normalize_point_name;
use crate::transform::apply_value_transformations;
use serde_json::{Number, Value};
use std::sync::Arc;
use tracing::debug;

/// Turns raw vendor livedata into the canonical, model-independent output.
///
/// Stateless apart from the model and the shared mapping index; every call
/// to [`DataNormalizer::normalize`] recomputes the output wholesale from
/// the given payload, so a point that disappears from the feed disappears
/// from the output.
#[derive(Debug, Clone)]
pub struct DataNormalizer {
    model: VsnModel,
    index: Arc<MappingIndex>,
}

impl DataNormalizer {
    pub fn new(model: VsnModel, index: Arc<MappingIndex>) -> Self {
        Self { model, index }
    }

    pub fn model(&self) -> VsnModel {
        self.model
    }

    /// Normalize one raw livedata payload.
    ///
    /// Devices without points, and devices where no point maps, are omitted
    /// entirely. Unknown point names are skipped with a debug log so new
    /// firmware points never break a poll cycle.
    pub fn normalize(&self, raw: &RawLivedata) -> NormalizedOutput {
        let mut output = NormalizedOutput::default();

        for (raw_device_id, device) in raw {
            let Some(points) = device.points.as_ref().filter(|p| !p.is_empty()) else {
                debug!("Device {raw_device_id} has no points, skipping");
                continue;
            };

            // Dataloggers key themselves by MAC; prefer the serial number
            // point as the device key when present.
            let device_key = points
                .iter()
                .find(|p| p.name.as_deref() == Some("sn"))
                .and_then(|p| p.value.as_str())
                .map_or_else(|| raw_device_id.clone(), str::to_owned);

            let mut normalized = NormalizedDevice {
                device_type: device.device_type.clone(),
                ..Default::default()
            };

            for point in points {
                let Some(raw_name) = point.name.as_deref().filter(|n| !n.is_empty()) else {
                    continue;
                };

                let canonical_name = normalize_point_name(self.model, raw_name);
                let Some(mapping) = self.index.get_by_vendor(self.model, &canonical_name)
                else {
                    debug!("No mapping for {} point {raw_name}, skipping", self.model);
                    continue;
                };

                // Transformations are keyed by the name the device actually
                // sent, not the canonical spelling.
                let value = apply_value_transformations(raw_name, &point.value, self.model);
                let (value, units) = convert_energy_units(value, mapping);

                normalized.points.insert(
                    mapping.ha_entity_name.clone(),
                    NormalizedPoint {
                        value,
                        units,
                        device_class: mapping.device_class.clone(),
                        state_class: mapping.state_class.clone(),
                        label: mapping.label.clone(),
                        description: mapping.description.clone(),
                        display_name: mapping.display_name.clone(),
                        category: mapping.category.clone(),
                        model: mapping.models.first().cloned().unwrap_or_default(),
                        sunspec_name: mapping.sunspec_name.clone(),
                        entity_category: mapping.entity_category.clone(),
                        icon: mapping.icon.clone(),
                        suggested_display_precision: mapping.suggested_display_precision,
                    },
                );
            }

            if normalized.points.is_empty() {
                debug!("Device {raw_device_id} produced no mapped points, omitting");
                continue;
            }

            output.devices.insert(device_key, normalized);
        }

        debug!(
            "Normalized {} devices, {} points",
            output.devices.len(),
            output.point_count()
        );
        output
    }

    /// Mapping metadata for a canonical entity name.
    pub fn point_metadata(&self, ha_entity_name: &str) -> Option<&PointMapping> {
        self.index.get_by_entity(ha_entity_name)
    }

    /// All points this normalizer's model can produce.
    pub fn expected_points(&self) -> Vec<&PointMapping> {
        self.index.points_expected_for(self.model)
    }

    /// Equivalent point name in the other vendor's namespace.
    pub fn cross_reference(&self, name: &str) -> Option<&str> {
        self.index.cross_reference(name, self.model)
    }
}

/// Lifetime energy counters arrive in Wh; HA dashboards expect kWh.
/// Applies only to numeric values; null keeps the table units.
fn convert_energy_units(value: Value, mapping: &PointMapping) -> (Value, String) {
    if mapping.state_class == "total_increasing" && mapping.units == "Wh" {
        if let Some(wh) = value.as_f64() {
            let kwh = Number::from_f64(wh / 1000.0)
                .map(Value::Number)
                .unwrap_or(Value::Null);
            return (kwh, "kWh".to_owned());
        }
    }
    (value, mapping.units.clone())
}
