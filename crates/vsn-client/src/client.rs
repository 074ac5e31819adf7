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

use crate::auth::{detect_vsn_model, vsn300_digest_header, vsn700_basic_auth};
use crate::errors::{VsnError, VsnResult};
use crate::mapping::MappingLoader;
use crate::models::{DiscoveredDevice, NormalizedOutput, RawLivedata, VsnModel};
use crate::normalizer::DataNormalizer;
use crate::utils::check_socket_connection;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

pub const ENDPOINT_STATUS: &str = "/v1/status";
pub const ENDPOINT_LIVEDATA: &str = "/v1/livedata";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const SOCKET_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// REST client for ABB/FIMER VSN300 and VSN700 dataloggers.
///
/// Construct with [`VsnClient::new`], optionally adjust with the builder
/// setters, then [`VsnClient::connect`]. Connecting detects the model when
/// it was not pinned, loads the point mapping table and builds the
/// normalizer; [`VsnClient::normalized_data`] connects on first use.
#[derive(Debug)]
pub struct VsnClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    requires_auth: bool,
    model: Option<VsnModel>,
    loader: MappingLoader,
    normalizer: Option<DataNormalizer>,
    discovered: Vec<DiscoveredDevice>,
}

impl VsnClient {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> VsnResult<Self> {
        let http = reqwest::Client::builder().timeout(DEFAULT_TIMEOUT).build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            username: username.into(),
            password: password.into(),
            requires_auth: true,
            model: None,
            loader: MappingLoader::bundled(),
            normalizer: None,
            discovered: Vec::new(),
        })
    }

    /// Pin the model, skipping auto-detection on connect.
    pub fn with_model(mut self, model: VsnModel) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> VsnResult<Self> {
        self.http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    /// Some installations expose the REST API without credentials.
    pub fn with_requires_auth(mut self, requires_auth: bool) -> Self {
        self.requires_auth = requires_auth;
        self
    }

    /// Point the mapping loader at a local table instead of the bundled one.
    pub fn with_mapping_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.loader = MappingLoader::new(path);
        self
    }

    /// Attach discovery results so device types can be backfilled into
    /// livedata payloads that omit them.
    pub fn with_discovered_devices(mut self, devices: Vec<DiscoveredDevice>) -> Self {
        self.discovered = devices;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> Option<VsnModel> {
        self.model
    }

    pub fn discovered_devices(&self) -> &[DiscoveredDevice] {
        &self.discovered
    }

    /// Detect the model (unless pinned), load the mapping table and build
    /// the normalizer. Idempotent; subsequent calls are cheap.
    pub async fn connect(&mut self) -> VsnResult<()> {
        check_socket_connection(&self.base_url, SOCKET_CHECK_TIMEOUT).await?;

        let model = match self.model {
            Some(model) => model,
            None => {
                let detected =
                    detect_vsn_model(&self.http, &self.base_url, &self.username, &self.password)
                        .await?;
                self.model = Some(detected);
                detected
            }
        };

        let index = self.loader.load().await?;
        self.normalizer = Some(DataNormalizer::new(model, index));

        info!("Connected to {model} at {}", self.base_url);
        Ok(())
    }

    /// Raw `/v1/status` payload.
    pub async fn status(&self) -> VsnResult<Value> {
        self.get_json(ENDPOINT_STATUS).await
    }

    /// Raw `/v1/livedata` payload.
    pub async fn livedata(&self) -> VsnResult<RawLivedata> {
        let value = self.get_json(ENDPOINT_LIVEDATA).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// One poll cycle: fetch livedata and normalize it. Connects first if
    /// needed, so this is the only call a simple consumer has to make.
    pub async fn normalized_data(&mut self) -> VsnResult<NormalizedOutput> {
        if self.normalizer.is_none() {
            debug!("Not connected yet, connecting before first poll");
            self.connect().await?;
        }

        let mut raw = self.livedata().await?;
        self.backfill_device_types(&mut raw);

        // connect() above guarantees the normalizer exists
        let normalizer = self
            .normalizer
            .as_ref()
            .ok_or(VsnError::MappingNotLoaded)?;

        let output = normalizer.normalize(&raw);
        debug!(
            "Poll cycle complete: {} devices, {} points",
            output.devices.len(),
            output.point_count()
        );
        Ok(output)
    }

    /// Livedata payloads from some firmware omit `device_type`; discovery
    /// knows it, so carry it over before normalizing.
    fn backfill_device_types(&self, raw: &mut RawLivedata) {
        for (raw_id, device) in raw.iter_mut() {
            if device.device_type.is_some() {
                continue;
            }
            if let Some(known) = self
                .discovered
                .iter()
                .find(|d| d.raw_device_id == *raw_id || d.device_id == *raw_id)
            {
                device.device_type = Some(known.device_type.clone());
            }
        }
    }

    pub(crate) async fn get_json(&self, uri: &str) -> VsnResult<Value> {
        check_socket_connection(&self.base_url, SOCKET_CHECK_TIMEOUT).await?;

        let url = format!("{}{uri}", self.base_url);
        let mut request = self.http.get(&url);

        if self.requires_auth {
            let model = self
                .model
                .ok_or_else(|| VsnError::DetectionFailed("model not detected yet".to_owned()))?;
            let auth = match model {
                VsnModel::Vsn300 => {
                    let digest = vsn300_digest_header(
                        &self.http,
                        &self.base_url,
                        &self.username,
                        &self.password,
                        "GET",
                        uri,
                    )
                    .await?;
                    format!("X-Digest {digest}")
                }
                VsnModel::Vsn700 => {
                    format!("Basic {}", vsn700_basic_auth(&self.username, &self.password))
                }
            };
            request = request.header("Authorization", auth);
        }

        debug!("GET {url}");
        let response = request.send().await?;
        let status = response.status();

        match status.as_u16() {
            200 => Ok(response.json().await?),
            401 => Err(VsnError::AuthenticationFailed(format!(
                "device rejected credentials for {uri}"
            ))),
            code => Err(VsnError::ApiError {
                status: code,
                message: format!("GET {uri} failed"),
            }),
        }
    }
}
