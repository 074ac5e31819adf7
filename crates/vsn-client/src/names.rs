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

/// Single-phase and split-phase SunSpec model prefixes that fold into the
/// three-phase namespace the mapping table is keyed on.
const SINGLE_PHASE_PREFIXES: [&str; 2] = ["m101_", "m102_"];

const THREE_PHASE_PREFIX: &str = "m103_";

/// VSN700 firmware variants report a handful of points under alternate
/// names. Maps alternate name to the name used by the mapping table.
const VSN700_ALIASES: [(&str, &str); 1] = [("TSoc", "Soc")];

/// Rewrite a raw vendor point name into the namespace the mapping table
/// uses.
///
/// VSN300 loggers attached to single-phase inverters report SunSpec model
/// 101/102 point names; the table only carries the model-103 spelling, so
/// the prefix is rewritten for VSN300 payloads. VSN700 alias names are
/// folded the same way. Everything else passes through untouched.
/// Deterministic: same input, same output.
pub fn normalize_point_name(model: VsnModel, name: &str) -> String {
    match model {
        VsnModel::Vsn300 => {
            for prefix in SINGLE_PHASE_PREFIXES {
                if let Some(rest) = name.strip_prefix(prefix) {
                    return format!("{THREE_PHASE_PREFIX}{rest}");
                }
            }
        }
        VsnModel::Vsn700 => {
            for (alias, canonical) in VSN700_ALIASES {
                if name == alias {
                    return canonical.to_owned();
                }
            }
        }
    }

    name.to_owned()
}
