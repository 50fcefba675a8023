use log::{debug, warn};
use std::collections::HashMap;
use std::env;

use crate::error::ConfigError;
use crate::models::MacAddress;

const DEFAULT_MAX_IN_FLIGHT: usize = 16;

/// Read-only settings shared by every unit of work
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// PostgreSQL sink; `None` logs batches instead
    pub database_url: Option<String>,
    /// Gateway id used when neither the request nor the payload names one
    pub default_gateway_id: Option<String>,
    /// Human-readable names by sensor address
    pub tags: HashMap<MacAddress, String>,
    /// Attach derived values to every decoded point
    pub extended: bool,
    /// Inbound messages processed concurrently by the binary
    pub max_in_flight: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig {
            database_url: None,
            default_gateway_id: None,
            tags: HashMap::new(),
            extended: false,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

impl IngestConfig {
    /// Load from the process environment and an optional `.env` file
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_vars(&env::vars().collect())
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let extended = match non_empty("EXTENDED_VALUES") {
            None => false,
            Some(value) => parse_bool(&value).ok_or(ConfigError::InvalidValue {
                key: "EXTENDED_VALUES",
                value,
            })?,
        };

        let max_in_flight = match non_empty("MAX_IN_FLIGHT") {
            None => DEFAULT_MAX_IN_FLIGHT,
            Some(value) => value
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidValue {
                    key: "MAX_IN_FLIGHT",
                    value,
                })?,
        };

        // Try RUUVI_TAGS format first
        let tags = match vars.get("RUUVI_TAGS") {
            Some(ruuvi_tags) => parse_tag_aliases(ruuvi_tags),
            None => indexed_tag_aliases(vars),
        };
        debug!("Total tags loaded: {}", tags.len());

        Ok(IngestConfig {
            database_url: non_empty("DATABASE_URL"),
            default_gateway_id: non_empty("GATEWAY_ID"),
            tags,
            extended,
            max_in_flight,
        })
    }

    /// Configured name for a sensor, if any
    pub fn tag_name(&self, mac: &MacAddress) -> Option<&str> {
        self.tags.get(mac).map(String::as_str)
    }
}

/// Parse `MAC=name,MAC=name` pairs, skipping malformed entries
pub fn parse_tag_aliases(ruuvi_tags: &str) -> HashMap<MacAddress, String> {
    let mut tags = HashMap::new();
    for pair in ruuvi_tags.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let Some((mac, name)) = pair.split_once('=') else {
            warn!("Failed to split tag alias: '{}'", pair);
            continue;
        };
        let name = name.trim();
        match mac.trim().parse::<MacAddress>() {
            Ok(mac) if !name.is_empty() => {
                debug!("Tag: {} -> {}", mac, name);
                tags.insert(mac, name.to_string());
            }
            Ok(_) => warn!("Empty name in tag alias: '{}'", pair),
            Err(e) => warn!("Ignoring tag alias '{}': {}", pair, e),
        }
    }
    tags
}

/// Fallback to `RUUVI_TAG_<N>_MAC` / `RUUVI_TAG_<N>_NAME` pairs
fn indexed_tag_aliases(vars: &HashMap<String, String>) -> HashMap<MacAddress, String> {
    let mut tags = HashMap::new();
    for (key, value) in vars {
        let Some(index) = key
            .strip_prefix("RUUVI_TAG_")
            .and_then(|s| s.strip_suffix("_MAC"))
        else {
            continue;
        };
        let name_key = format!("RUUVI_TAG_{}_NAME", index);
        let Some(name) = vars.get(&name_key) else {
            continue;
        };
        match value.parse::<MacAddress>() {
            Ok(mac) => {
                tags.insert(mac, name.trim().to_string());
            }
            Err(e) => warn!("Ignoring {}: {}", key, e),
        }
    }
    tags
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
