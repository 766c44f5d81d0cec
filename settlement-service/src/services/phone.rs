//! Pakistani mobile number normalization and carrier lookup.
//!
//! Pure functions, no I/O. `is_valid` holds exactly when `network_of`
//! resolves a carrier, so the two can never drift apart.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Mobile carrier networks, keyed by the 3-digit prefix after the leading 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    Jazz,
    Telenor,
    Zong,
    Ufone,
    Warid,
    Scom,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Jazz => "jazz",
            Network::Telenor => "telenor",
            Network::Zong => "zong",
            Network::Ufone => "ufone",
            Network::Warid => "warid",
            Network::Scom => "scom",
        }
    }
}

static PREFIX_NETWORKS: Lazy<HashMap<u32, Network>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for prefix in 300..=309 {
        map.insert(prefix, Network::Jazz);
    }
    for prefix in 310..=318 {
        map.insert(prefix, Network::Zong);
    }
    for prefix in 320..=325 {
        map.insert(prefix, Network::Warid);
    }
    for prefix in 330..=337 {
        map.insert(prefix, Network::Ufone);
    }
    for prefix in 340..=349 {
        map.insert(prefix, Network::Telenor);
    }
    map.insert(355, Network::Scom);
    map
});

/// Normalize to the 11-digit local form `03XXXXXXXXX`.
///
/// Accepts `92XXXXXXXXXX`, `+92...` and local `03...` inputs with any mix of
/// spaces, hyphens, parentheses and a leading plus. Returns `None` for
/// anything that cannot be brought into the local form.
pub fn normalize(input: &str) -> Option<String> {
    let cleaned: String = input
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '+'))
        .collect();
    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if cleaned.len() == 12 && cleaned.starts_with("92") {
        return Some(format!("0{}", &cleaned[2..]));
    }
    if cleaned.len() == 11 && cleaned.starts_with("03") {
        return Some(cleaned);
    }
    None
}

/// Carrier for a number, or `None` if the number is invalid or the prefix
/// is not in the carrier table.
pub fn network_of(input: &str) -> Option<Network> {
    let normalized = normalize(input)?;
    let prefix: u32 = normalized[1..4].parse().ok()?;
    PREFIX_NETWORKS.get(&prefix).copied()
}

pub fn is_valid(input: &str) -> bool {
    network_of(input).is_some()
}
