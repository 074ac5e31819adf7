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
use crate::mapping::MappingIndex;
use crate::models::PointMapping;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Canonical copy of the mapping table, fetched when the local file is missing.
pub const MAPPING_FALLBACK_URL: &str = "https://raw.githubusercontent.com/alexdelprete/ha-abb-fimer-pvi-vsn-rest/master/docs/vsn-sunspec-point-mapping.json";

const FALLBACK_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Cell value used in the table for "this point does not exist here".
const NA_SENTINEL: &str = "N/A";

/// Loads the VSN-SunSpec point mapping table and builds the [`MappingIndex`].
///
/// The load happens at most once per loader: concurrent callers racing on
/// [`MappingLoader::load`] all wait for the single in-flight load. If the
/// local file is missing, a fallback copy is fetched from the canonical URL
/// (bounded timeout) and persisted for the next start.
#[derive(Debug)]
pub struct MappingLoader {
    file_path: PathBuf,
    fallback_url: String,
    index: OnceCell<Arc<MappingIndex>>,
}

impl MappingLoader {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            fallback_url: MAPPING_FALLBACK_URL.to_owned(),
            index: OnceCell::new(),
        }
    }

    /// Loader pointed at the mapping file bundled with this crate.
    pub fn bundled() -> Self {
        Self::new(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/data/vsn-sunspec-point-mapping.json"
        ))
    }

    /// Override the fallback URL (used by tests against a mock server).
    pub fn with_fallback_url(mut self, url: impl Into<String>) -> Self {
        self.fallback_url = url.into();
        self
    }

    /// Load the table and build the index. Safe to call multiple times and
    /// from multiple tasks: only the first call performs I/O.
    pub async fn load(&self) -> VsnResult<Arc<MappingIndex>> {
        self.index
            .get_or_try_init(|| async {
                let rows = self.load_rows().await?;
                Ok(Arc::new(MappingIndex::from_rows(rows)))
            })
            .await
            .cloned()
    }

    /// The already-built index. Fails with [`VsnError::MappingNotLoaded`] if
    /// [`MappingLoader::load`] has not completed yet, so out-of-order callers
    /// cannot mistake an empty index for "device has no readings".
    pub fn index(&self) -> VsnResult<Arc<MappingIndex>> {
        self.index.get().cloned().ok_or(VsnError::MappingNotLoaded)
    }

    async fn load_rows(&self) -> VsnResult<Vec<PointMapping>> {
        if !self.file_path.exists() {
            warn!(
                "Mapping file not found at {}, fetching fallback copy",
                self.file_path.display()
            );
            let content = self.fetch_fallback().await?;
            self.persist_fallback(&content).await?;
        }

        debug!("Loading point mappings from {}", self.file_path.display());
        let content = tokio::fs::read_to_string(&self.file_path).await?;
        let rows: Vec<Value> = serde_json::from_str(&content)?;
        Ok(parse_mapping_rows(&rows))
    }

    async fn fetch_fallback(&self) -> VsnResult<String> {
        info!("Fetching mapping table from {}", self.fallback_url);

        let client = reqwest::Client::builder()
            .timeout(FALLBACK_FETCH_TIMEOUT)
            .build()?;

        let response = client.get(&self.fallback_url).send().await.map_err(|e| {
            VsnError::MappingUnavailable(format!(
                "local file missing and fallback fetch failed: {e}"
            ))
        })?;

        if !response.status().is_success() {
            return Err(VsnError::MappingUnavailable(format!(
                "local file missing and fallback returned HTTP {}",
                response.status().as_u16()
            )));
        }

        response.text().await.map_err(|e| {
            VsnError::MappingUnavailable(format!("failed to read fallback body: {e}"))
        })
    }

    async fn persist_fallback(&self, content: &str) -> VsnResult<()> {
        if let Some(parent) = self.file_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.file_path, content).await?;
        info!(
            "Cached fallback mapping table at {}",
            self.file_path.display()
        );
        Ok(())
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

/// Parse raw table rows (objects keyed by the human-readable column headers)
/// into [`PointMapping`] values.
///
/// Rows without a canonical HA entity name are skipped with a warning; the
/// "N/A" sentinel in the vendor name columns becomes `None` here and is never
/// visible downstream.
pub fn parse_mapping_rows(rows: &[Value]) -> Vec<PointMapping> {
    let mut mappings = Vec::with_capacity(rows.len());

    for row in rows {
        let Some(ha_entity_name) = cell_str(row, "HA Name") else {
            warn!("Mapping row missing HA entity name, skipping");
            continue;
        };

        let description = cell_string(row, "Description");
        let label = cell_string(row, "Label");
        // Fall back to description/label for tables predating the display
        // name column.
        let display_name = cell_str(row, "HA Display Name")
            .or_else(|| cell_str(row, "Description"))
            .unwrap_or_else(|| label.clone());

        mappings.push(PointMapping {
            vsn700_name: vendor_cell(row, "REST Name (VSN700)"),
            vsn300_name: vendor_cell(row, "REST Name (VSN300)"),
            sunspec_name: vendor_cell(row, "SunSpec Normalized Name"),
            ha_entity_name,
            in_livedata: cell_flag(row, "In /livedata"),
            in_feeds: cell_flag(row, "In /feeds"),
            label,
            description,
            display_name,
            models: cell_string_list(row, "models"),
            category: cell_string(row, "Category"),
            units: cell_string(row, "HA Unit of Measurement"),
            state_class: cell_string(row, "HA State Class"),
            device_class: cell_string(row, "HA Device Class"),
            entity_category: cell_str(row, "Entity Category"),
            available_in_modbus: cell_string(row, "Available in Modbus"),
            icon: cell_str(row, "HA Icon"),
            suggested_display_precision: row
                .get("Suggested Display Precision")
                .and_then(Value::as_i64),
        });
    }

    info!("Loaded {} point mappings from table", mappings.len());
    mappings
}

/// Non-empty string cell, or `None`.
fn cell_str(row: &Value, column: &str) -> Option<String> {
    row.get(column)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// String cell defaulting to empty.
fn cell_string(row: &Value, column: &str) -> String {
    cell_str(row, column).unwrap_or_default()
}

/// Vendor name cell: "N/A" and empty both mean absent.
fn vendor_cell(row: &Value, column: &str) -> Option<String> {
    cell_str(row, column).filter(|s| s != NA_SENTINEL)
}

/// Boolean-like cell: checkmark or "YES" (or an actual JSON bool) is true,
/// anything else is false.
fn cell_flag(row: &Value, column: &str) -> bool {
    match row.get(column) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "\u{2713}" || s.eq_ignore_ascii_case("yes"),
        _ => false,
    }
}

fn cell_string_list(row: &Value, column: &str) -> Vec<String> {
    row.get(column)
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_row() -> Value {
        json!({
            "REST Name (VSN700)": "Pgrid",
            "REST Name (VSN300)": "m103_1_W",
            "SunSpec Normalized Name": "W",
            "HA Name": "watts",
            "In /livedata": "\u{2713}",
            "In /feeds": "",
            "Label": "Watts",
            "Description": "AC Power",
            "HA Display Name": "Power AC",
            "models": ["M103"],
            "Category": "Inverter",
            "HA Unit of Measurement": "W",
            "HA State Class": "measurement",
            "HA Device Class": "power",
            "Entity Category": "",
            "Available in Modbus": "YES",
            "HA Icon": "",
            "Suggested Display Precision": 0
        })
    }

    #[test]
    fn parses_full_row() {
        let rows = parse_mapping_rows(&[sample_row()]);
        assert_eq!(rows.len(), 1);
        let m = &rows[0];
        assert_eq!(m.ha_entity_name, "watts");
        assert_eq!(m.vsn300_name.as_deref(), Some("m103_1_W"));
        assert_eq!(m.vsn700_name.as_deref(), Some("Pgrid"));
        assert_eq!(m.sunspec_name.as_deref(), Some("W"));
        assert!(m.in_livedata);
        assert!(!m.in_feeds);
        assert_eq!(m.display_name, "Power AC");
        assert_eq!(m.models, vec!["M103".to_owned()]);
        assert_eq!(m.entity_category, None);
        assert_eq!(m.icon, None);
        assert_eq!(m.suggested_display_precision, Some(0));
    }

    #[test]
    fn na_sentinel_becomes_none() {
        let mut row = sample_row();
        row["REST Name (VSN700)"] = json!("N/A");
        row["SunSpec Normalized Name"] = json!("N/A");

        let rows = parse_mapping_rows(&[row]);
        assert_eq!(rows[0].vsn700_name, None);
        assert_eq!(rows[0].sunspec_name, None);
        assert_eq!(rows[0].vsn300_name.as_deref(), Some("m103_1_W"));
    }

    #[test]
    fn row_without_entity_name_is_skipped() {
        let mut bad = sample_row();
        bad["HA Name"] = json!("");
        let rows = parse_mapping_rows(&[bad, sample_row()]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ha_entity_name, "watts");
    }

    #[test]
    fn display_name_falls_back_to_description() {
        let mut row = sample_row();
        row.as_object_mut().unwrap().remove("HA Display Name");
        let rows = parse_mapping_rows(&[row]);
        assert_eq!(rows[0].display_name, "AC Power");
    }

    #[test]
    fn flag_coercion_accepts_yes_and_bool() {
        let mut row = sample_row();
        row["In /livedata"] = json!("yes");
        row["In /feeds"] = json!(true);
        let rows = parse_mapping_rows(&[row]);
        assert!(rows[0].in_livedata);
        assert!(rows[0].in_feeds);
    }

    #[tokio::test]
    async fn load_reads_local_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.json");
        tokio::fs::write(&path, serde_json::to_string(&vec![sample_row()]).unwrap())
            .await
            .unwrap();

        let loader = MappingLoader::new(&path);
        assert!(matches!(loader.index(), Err(VsnError::MappingNotLoaded)));

        let index = loader.load().await.unwrap();
        assert_eq!(index.len(), 1);

        // Second load is a no-op returning the same index
        let again = loader.load().await.unwrap();
        assert!(Arc::ptr_eq(&index, &again));
        assert!(loader.index().is_ok());
    }

    #[tokio::test]
    async fn missing_file_with_failing_fallback_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/mapping.json")
            .with_status(404)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let loader = MappingLoader::new(dir.path().join("missing.json"))
            .with_fallback_url(format!("{}/mapping.json", server.url()));

        let err = loader.load().await.unwrap_err();
        assert!(matches!(err, VsnError::MappingUnavailable(_)));
    }

    #[tokio::test]
    async fn missing_file_fetches_and_caches_fallback() {
        let body = serde_json::to_string(&vec![sample_row()]).unwrap();
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/mapping.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(&body)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("mapping.json");
        let loader = MappingLoader::new(&path)
            .with_fallback_url(format!("{}/mapping.json", server.url()));

        let index = loader.load().await.unwrap();
        assert_eq!(index.len(), 1);
        assert!(path.exists());
        mock.assert_async().await;
    }
}
