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

//! VSN authentication and model detection.
//!
//! VSN300 dataloggers answer with an HTTP Digest challenge and expect the
//! response under the vendor's `X-Digest` authorization scheme. VSN700
//! dataloggers take preemptive HTTP Basic credentials on every request.
//! Both families serve the same `/v1/*` endpoints, so the auth scheme in
//! the 401 challenge is also how the model is detected.

use crate::client::ENDPOINT_STATUS;
use crate::errors::{VsnError, VsnResult};
use crate::models::VsnModel;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use md5::{Digest, Md5};
use rand::RngCore;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

static CHALLENGE_PARAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\w+)=(?:"([^"]+)"|([^,\s]+))"#).unwrap());

static CHALLENGE_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(X-Digest|Digest)\s+").unwrap());

pub(crate) fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// RFC 2617 digest response. The qop branch is taken only when the
/// challenge supplied `qop` and the caller supplied `nc` and `cnonce`.
pub fn calculate_digest_response(
    username: &str,
    password: &str,
    realm: &str,
    nonce: &str,
    method: &str,
    uri: &str,
    qop: Option<&str>,
    nc: Option<&str>,
    cnonce: Option<&str>,
) -> String {
    let ha1 = md5_hex(&format!("{username}:{realm}:{password}"));
    let ha2 = md5_hex(&format!("{method}:{uri}"));

    match (qop, nc, cnonce) {
        (Some(qop), Some(nc), Some(cnonce)) => {
            md5_hex(&format!("{ha1}:{nonce}:{nc}:{cnonce}:{qop}:{ha2}"))
        }
        _ => md5_hex(&format!("{ha1}:{nonce}:{ha2}")),
    }
}

/// Parse a `WWW-Authenticate` digest challenge into its parameters.
/// Accepts both the standard `Digest` prefix and the vendor's `X-Digest`.
pub fn parse_digest_challenge(www_authenticate: &str) -> HashMap<String, String> {
    let challenge = CHALLENGE_PREFIX_RE.replace(www_authenticate, "");

    CHALLENGE_PARAM_RE
        .captures_iter(&challenge)
        .filter_map(|caps| {
            let key = caps.get(1)?.as_str().to_owned();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))?
                .as_str()
                .to_owned();
            Some((key, value))
        })
        .collect()
}

/// Build the `X-Digest` authorization value for a parsed challenge.
///
/// VSN300 firmware usually skips qop; when present the client nonce is
/// derived like the Python stdlib does, `md5(nonce:time:random)[..16]`,
/// and `qop` goes in unquoted.
pub fn build_digest_header(
    username: &str,
    password: &str,
    challenge: &HashMap<String, String>,
    method: &str,
    uri: &str,
) -> String {
    let realm = challenge.get("realm").map_or("", String::as_str);
    let nonce = challenge.get("nonce").map_or("", String::as_str);
    let qop = challenge.get("qop").map(String::as_str);
    let opaque = challenge.get("opaque").map(String::as_str);

    let mut parts = match qop {
        Some(qop) => {
            let nc = "00000001";
            let cnonce = generate_cnonce(nonce);
            let response = calculate_digest_response(
                username,
                password,
                realm,
                nonce,
                method,
                uri,
                Some(qop),
                Some(nc),
                Some(&cnonce),
            );
            vec![
                format!("username=\"{username}\""),
                format!("realm=\"{realm}\""),
                format!("nonce=\"{nonce}\""),
                format!("uri=\"{uri}\""),
                format!("response=\"{response}\""),
                "algorithm=\"MD5\"".to_owned(),
                format!("qop={qop}"),
                format!("nc={nc}"),
                format!("cnonce=\"{cnonce}\""),
            ]
        }
        None => {
            let response = calculate_digest_response(
                username, password, realm, nonce, method, uri, None, None, None,
            );
            vec![
                format!("username=\"{username}\""),
                format!("realm=\"{realm}\""),
                format!("nonce=\"{nonce}\""),
                format!("uri=\"{uri}\""),
                format!("response=\"{response}\""),
            ]
        }
    };

    if let Some(opaque) = opaque {
        parts.push(format!("opaque=\"{opaque}\""));
    }

    parts.join(", ")
}

fn generate_cnonce(nonce: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64());
    let mut random = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut random);
    let mut cnonce = md5_hex(&format!("{nonce}:{now}:{}", hex::encode(random)));
    cnonce.truncate(16);
    cnonce
}

/// Request a digest challenge from a VSN300 and build the `X-Digest`
/// authorization value for the given method and URI.
pub async fn vsn300_digest_header(
    client: &reqwest::Client,
    base_url: &str,
    username: &str,
    password: &str,
    method: &str,
    uri: &str,
) -> VsnResult<String> {
    let url = format!("{}{uri}", base_url.trim_end_matches('/'));
    debug!("Requesting digest challenge: {method} {url}");

    let response = client.get(&url).send().await?;
    let status = response.status();

    if status != reqwest::StatusCode::UNAUTHORIZED {
        return Err(VsnError::AuthenticationFailed(format!(
            "expected 401 challenge, got {}",
            status.as_u16()
        )));
    }

    let www_authenticate = response
        .headers()
        .get("www-authenticate")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !www_authenticate.to_lowercase().contains("digest") {
        return Err(VsnError::AuthenticationFailed(
            "challenge missing or not digest-based".to_owned(),
        ));
    }

    let challenge = parse_digest_challenge(www_authenticate);
    debug!(
        "Parsed digest challenge: realm={:?}, qop={:?}",
        challenge.get("realm"),
        challenge.get("qop")
    );

    Ok(build_digest_header(
        username, password, &challenge, method, uri,
    ))
}

/// Preemptive Basic credentials for a VSN700, base64 of `username:password`.
pub fn vsn700_basic_auth(username: &str, password: &str) -> String {
    BASE64.encode(format!("{username}:{password}"))
}

/// Detect the datalogger family from the auth scheme of its 401 challenge.
///
/// An unauthenticated `/v1/status` request must come back 401. A digest
/// challenge means VSN300. Otherwise a preemptive Basic probe is sent; if
/// the device accepts it, it is a VSN700.
pub async fn detect_vsn_model(
    client: &reqwest::Client,
    base_url: &str,
    username: &str,
    password: &str,
) -> VsnResult<VsnModel> {
    let base_url = base_url.trim_end_matches('/');
    let url = format!("{base_url}{ENDPOINT_STATUS}");
    debug!("Probing {url} for model detection");

    let response = client.get(&url).send().await?;
    let status = response.status();

    if status != reqwest::StatusCode::UNAUTHORIZED {
        return Err(VsnError::DetectionFailed(format!(
            "expected 401 response for detection, got {}",
            status.as_u16()
        )));
    }

    let www_authenticate = response
        .headers()
        .get("www-authenticate")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_owned();

    if www_authenticate.to_lowercase().contains("digest") {
        info!("Detected VSN300 (digest challenge: {www_authenticate})");
        return Ok(VsnModel::Vsn300);
    }

    // VSN700 may or may not advertise Basic; probe with credentials.
    debug!("No digest challenge, probing with preemptive Basic auth");
    let probe = client
        .get(&url)
        .header(
            "Authorization",
            format!("Basic {}", vsn700_basic_auth(username, password)),
        )
        .send()
        .await?;

    match probe.status().as_u16() {
        200 | 204 => {
            info!("Detected VSN700 (preemptive Basic auth accepted)");
            Ok(VsnModel::Vsn700)
        }
        other => Err(VsnError::DetectionFailed(format!(
            "device is not VSN300/VSN700 compatible, Basic probe returned {other}"
        ))),
    }
}
