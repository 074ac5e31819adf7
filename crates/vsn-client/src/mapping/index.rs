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

use crate::models::{PointMapping, VsnModel};
use std::collections::HashMap;
use tracing::info;

/// In-memory lookup structure over the point mapping table.
///
/// Three indices are built once from the loaded rows and are read-only
/// afterwards: VSN300 name, VSN700 name, and the canonical HA entity name
/// (the primary key). Lookups are case-sensitive exact matches.
#[derive(Debug, Default, Clone)]
pub struct MappingIndex {
    by_entity: HashMap<String, PointMapping>,
    vsn300_index: HashMap<String, String>,
    vsn700_index: HashMap<String, String>,
}

impl MappingIndex {
    /// Build the three indices from parsed mapping rows.
    ///
    /// Rows were already validated by the loader: every row carries a
    /// canonical entity name and vendor names never hold the "N/A" sentinel.
    pub fn from_rows(rows: Vec<PointMapping>) -> Self {
        let mut by_entity = HashMap::with_capacity(rows.len());
        let mut vsn300_index = HashMap::new();
        let mut vsn700_index = HashMap::new();

        for row in rows {
            if let Some(vsn300) = &row.vsn300_name {
                vsn300_index.insert(vsn300.clone(), row.ha_entity_name.clone());
            }
            if let Some(vsn700) = &row.vsn700_name {
                vsn700_index.insert(vsn700.clone(), row.ha_entity_name.clone());
            }
            by_entity.insert(row.ha_entity_name.clone(), row);
        }

        info!(
            "Indexed {} point mappings ({} VSN300, {} VSN700)",
            by_entity.len(),
            vsn300_index.len(),
            vsn700_index.len()
        );

        Self {
            by_entity,
            vsn300_index,
            vsn700_index,
        }
    }

    /// Look up by VSN300 point name (e.g. "m103_1_W").
    pub fn get_by_vsn300(&self, vsn300_name: &str) -> Option<&PointMapping> {
        self.vsn300_index
            .get(vsn300_name)
            .and_then(|key| self.by_entity.get(key))
    }

    /// Look up by VSN700 point name (e.g. "Pgrid").
    pub fn get_by_vsn700(&self, vsn700_name: &str) -> Option<&PointMapping> {
        self.vsn700_index
            .get(vsn700_name)
            .and_then(|key| self.by_entity.get(key))
    }

    /// Look up by canonical HA entity name (e.g. "watts").
    pub fn get_by_entity(&self, ha_entity_name: &str) -> Option<&PointMapping> {
        self.by_entity.get(ha_entity_name)
    }

    /// Look up by point name in the namespace of the given vendor model.
    pub fn get_by_vendor(&self, model: VsnModel, name: &str) -> Option<&PointMapping> {
        match model {
            VsnModel::Vsn300 => self.get_by_vsn300(name),
            VsnModel::Vsn700 => self.get_by_vsn700(name),
        }
    }

    /// All mappings keyed by HA entity name. Returns a defensive copy so
    /// callers cannot mutate the index through it.
    pub fn get_all(&self) -> HashMap<String, PointMapping> {
        self.by_entity.clone()
    }

    /// Given a point name in one vendor's namespace, return the equivalent
    /// name in the other vendor's namespace, or `None` if the point is
    /// unknown or vendor-exclusive.
    pub fn cross_reference(&self, name: &str, from: VsnModel) -> Option<&str> {
        let mapping = self.get_by_vendor(from, name)?;
        match from {
            VsnModel::Vsn300 => mapping.vsn700_name.as_deref(),
            VsnModel::Vsn700 => mapping.vsn300_name.as_deref(),
        }
    }

    /// All points that can appear in the given vendor's payload.
    pub fn points_expected_for(&self, model: VsnModel) -> Vec<&PointMapping> {
        self.by_entity
            .values()
            .filter(|m| match model {
                VsnModel::Vsn300 => m.vsn300_name.is_some(),
                VsnModel::Vsn700 => m.vsn700_name.is_some(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_entity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_entity.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(
        entity: &str,
        vsn300: Option<&str>,
        vsn700: Option<&str>,
    ) -> PointMapping {
        PointMapping {
            vsn700_name: vsn700.map(str::to_owned),
            vsn300_name: vsn300.map(str::to_owned),
            sunspec_name: None,
            ha_entity_name: entity.to_owned(),
            in_livedata: true,
            in_feeds: false,
            label: entity.to_owned(),
            description: String::new(),
            display_name: entity.to_owned(),
            models: vec!["M103".to_owned()],
            category: "Inverter".to_owned(),
            units: "W".to_owned(),
            state_class: "measurement".to_owned(),
            device_class: "power".to_owned(),
            entity_category: None,
            available_in_modbus: "YES".to_owned(),
            icon: None,
            suggested_display_precision: None,
        }
    }

    fn sample_index() -> MappingIndex {
        MappingIndex::from_rows(vec![
            mapping("watts", Some("m103_1_W"), Some("Pgrid")),
            mapping("amps", Some("m103_1_A"), None),
            mapping("battery_soc", None, Some("Soc")),
        ])
    }

    #[test]
    fn lookups_resolve_through_entity_key() {
        let index = sample_index();
        assert_eq!(
            index.get_by_vsn300("m103_1_W").unwrap().ha_entity_name,
            "watts"
        );
        assert_eq!(
            index.get_by_vsn700("Pgrid").unwrap().ha_entity_name,
            "watts"
        );
        assert_eq!(index.get_by_entity("amps").unwrap().vsn300_name.as_deref(), Some("m103_1_A"));
        assert!(index.get_by_vsn300("unknown").is_none());
    }

    #[test]
    fn lookups_are_case_sensitive() {
        let index = sample_index();
        assert!(index.get_by_vsn700("pgrid").is_none());
        assert!(index.get_by_vsn300("M103_1_W").is_none());
    }

    #[test]
    fn cross_reference_both_directions() {
        let index = sample_index();
        assert_eq!(
            index.cross_reference("m103_1_W", VsnModel::Vsn300),
            Some("Pgrid")
        );
        assert_eq!(
            index.cross_reference("Pgrid", VsnModel::Vsn700),
            Some("m103_1_W")
        );
        // Vendor-exclusive points have no counterpart
        assert_eq!(index.cross_reference("m103_1_A", VsnModel::Vsn300), None);
        assert_eq!(index.cross_reference("unknown", VsnModel::Vsn300), None);
    }

    #[test]
    fn points_expected_for_filters_on_vendor_name() {
        let index = sample_index();
        let vsn300: Vec<_> = index
            .points_expected_for(VsnModel::Vsn300)
            .iter()
            .map(|m| m.ha_entity_name.clone())
            .collect();
        assert_eq!(vsn300.len(), 2);
        assert!(vsn300.contains(&"watts".to_owned()));
        assert!(vsn300.contains(&"amps".to_owned()));

        let vsn700 = index.points_expected_for(VsnModel::Vsn700);
        assert_eq!(vsn700.len(), 2);
        assert!(vsn700.iter().all(|m| m.vsn700_name.is_some()));
    }

    #[test]
    fn get_all_is_a_defensive_copy() {
        let index = sample_index();
        let mut all = index.get_all();
        all.remove("watts");
        all.insert("bogus".to_owned(), mapping("bogus", None, None));

        assert_eq!(index.len(), 3);
        assert!(index.get_by_entity("watts").is_some());
        assert!(index.get_by_entity("bogus").is_none());
    }
}
