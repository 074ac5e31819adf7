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

use thiserror::Error;

/// VSN REST client error types
#[derive(Error, Debug)]
pub enum VsnError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("device returned error status {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("VSN model detection failed: {0}")]
    DetectionFailed(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("unsupported VSN model: {0}")]
    UnsupportedModel(String),

    #[error("point mapping table unavailable: {0}")]
    MappingUnavailable(String),

    #[error("point mapping table not loaded - call load() or connect() first")]
    MappingNotLoaded,

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type VsnResult<T> = Result<T, VsnError>;
