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

//! REST client for ABB/FIMER (ex Power-One) VSN300 and VSN700 solar
//! dataloggers: model detection, authentication, device discovery and
//! normalization of vendor livedata into SunSpec-aligned points.

pub mod auth;
pub mod client;
pub mod discovery;
pub mod errors;
pub mod mapping;
pub mod models;
pub mod names;
pub mod normalizer;
pub mod transform;
pub mod utils;

pub use client::{ENDPOINT_LIVEDATA, ENDPOINT_STATUS, VsnClient};
pub use discovery::{LoggerInfo, discover_vsn_device, extract_devices, extract_logger_info};
pub use errors::{VsnError, VsnResult};
pub use mapping::{MAPPING_FALLBACK_URL, MappingIndex, MappingLoader, parse_mapping_rows};
pub use models::{
    DiscoveredDevice, DiscoveryResult, NormalizedDevice, NormalizedOutput, NormalizedPoint,
    PointMapping, RawDevice, RawLivedata, RawPoint, VsnModel,
};
pub use names::normalize_point_name;
pub use normalizer::DataNormalizer;
pub use transform::apply_value_transformations;
pub use utils::{check_socket_connection, compact_serial_number, format_device_name};
