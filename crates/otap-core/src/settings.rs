//! Device settings codec.
//!
//! The registry stores per-device settings as a single `;`-joined string of
//! `key=value` tokens. Devices receive them expanded to `{key, val}` pairs
//! alongside an upgrade offer. Order is preserved; tokens without a `=` are
//! skipped.

use serde::{Deserialize, Serialize};

/// One `key=value` setting delivered to a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub val: String,
}

/// Expand a stored settings string into ordered pairs.
pub fn parse_settings(raw: &str) -> Vec<Setting> {
    raw.split(';')
        .filter_map(|token| {
            let token = token.trim();
            let (key, val) = token.split_once('=')?;
            if key.is_empty() {
                return None;
            }
            Some(Setting {
                key: key.to_string(),
                val: val.to_string(),
            })
        })
        .collect()
}
