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

use crate::models::VsnModel;
use serde_json::{Number, Value};

/// Leakage current points reported in microamperes, scaled down to mA.
const UA_TO_MA_POINTS: [&str; 4] = [
    "m64061_1_ILeakDcAc",
    "m64061_1_ILeakDcDc",
    "Ileak 1",
    "Ileak 2",
];

/// VSN700 leakage current points reported in amperes, scaled up to mA.
const A_TO_MA_POINTS: [&str; 2] = ["IleakInv", "IleakDC"];

/// Cabinet temperature points where some firmware revisions report tenths
/// of a degree.
const TEMP_CORRECTION_POINTS: [&str; 3] = ["m103_1_TmpCab", "m101_1_TmpCab", "Temp1"];

/// Any plausible cabinet temperature is below this; a value above it is a
/// tenths-of-degree reading.
const TEMP_THRESHOLD_CELSIUS: f64 = 70.0;

/// String points padded with leading/trailing dashes by the firmware.
const STRING_STRIP_POINTS: [&str; 2] = ["pn", "C_Md"];

/// String points reported in inconsistent casing.
const TITLE_CASE_POINTS: [&str; 1] = ["type"];

/// Datalogger memory points reported in bytes, scaled to MB.
const B_TO_MB_POINTS: [&str; 3] = ["flash_free", "free_ram", "store_size"];

const BYTES_PER_MEGABYTE: f64 = 1_048_576.0;

/// Apply the firmware-quirk correction for a raw point value, keyed by the
/// point's ORIGINAL vendor name (before any name normalization).
///
/// At most one rule applies per point; the first match wins and the value
/// is returned as-is when nothing matches. Nulls always pass through.
pub fn apply_value_transformations(name: &str, value: &Value, model: VsnModel) -> Value {
    if value.is_null() {
        return Value::Null;
    }

    if UA_TO_MA_POINTS.contains(&name) {
        // Runs for zero too: the unit still changes, so 0 becomes 0.0 mA.
        if let Some(ua) = value.as_f64() {
            return float_value(ua / 1000.0);
        }
        return value.clone();
    }

    if model == VsnModel::Vsn700 && A_TO_MA_POINTS.contains(&name) {
        if let Some(a) = value.as_f64()
            && a != 0.0
        {
            return float_value(a * 1000.0);
        }
        return value.clone();
    }

    if TEMP_CORRECTION_POINTS.contains(&name) {
        if let Some(temp) = value.as_f64()
            && temp > TEMP_THRESHOLD_CELSIUS
        {
            return float_value(temp / 10.0);
        }
        return value.clone();
    }

    if STRING_STRIP_POINTS.contains(&name) {
        if let Some(s) = value.as_str() {
            return Value::String(s.trim_matches('-').to_owned());
        }
        return value.clone();
    }

    if TITLE_CASE_POINTS.contains(&name) {
        if let Some(s) = value.as_str() {
            return Value::String(title_case(s));
        }
        return value.clone();
    }

    if B_TO_MB_POINTS.contains(&name) {
        if let Some(bytes) = value.as_f64() {
            return float_value(bytes / BYTES_PER_MEGABYTE);
        }
        return value.clone();
    }

    value.clone()
}

fn float_value(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

/// Uppercase the first letter and lowercase the rest of each
/// space-separated word.
fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
