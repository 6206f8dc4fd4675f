use std::{env, fmt::Display, fs::read_to_string, str::FromStr, time::Duration};

use thiserror::Error;
use time::UtcOffset;
use tracing::{info, warn};

use crate::domain::fare::JitterMode;
use crate::domain::rate_card::{RateCardError, RateCatalog};
use crate::util::version::version_label;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {key} value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("failed to read rate cards from {path}: {source}")]
    RateCardFile {
        path: String,
        source: std::io::Error,
    },
    #[error("rate cards in {path} are invalid: {source}")]
    RateCards { path: String, source: RateCardError },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
    pub api_version: String,
    pub namma_yatri_enabled: bool,
    pub beckn_gateway_url: String,
    pub bap_uri: String,
    pub bap_id: String,
    pub beckn_city_code: String,
    pub beckn_callback_timeout: Duration,
    pub nominatim_url: String,
    pub photon_url: String,
    pub geocoder_timeout: Duration,
    pub location_cache_ttl: Duration,
    pub compare_cache_ttl: Duration,
    pub fare_jitter: JitterMode,
    pub local_offset: UtcOffset,
    pub rate_cards_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            frontend_url: "http://localhost:5173".to_string(),
            api_version: version_label(),
            namma_yatri_enabled: false,
            beckn_gateway_url: "https://gateway.beckn.nsdl.co.in".to_string(),
            bap_uri: "http://localhost:8000/api/beckn".to_string(),
            bap_id: "cabsync.app".to_string(),
            beckn_city_code: "std:080".to_string(),
            beckn_callback_timeout: Duration::from_millis(5000),
            nominatim_url: "https://nominatim.openstreetmap.org/".to_string(),
            photon_url: "https://photon.komoot.io/".to_string(),
            geocoder_timeout: Duration::from_millis(4000),
            location_cache_ttl: Duration::from_secs(600),
            compare_cache_ttl: Duration::from_secs(60),
            fare_jitter: JitterMode::Seeded,
            local_offset: UtcOffset::from_whole_seconds(330 * 60).unwrap_or(UtcOffset::UTC),
            rate_cards_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let jitter_default = defaults.fare_jitter_label();
        let offset_minutes: i32 = try_load("LOCAL_UTC_OFFSET_MINUTES", 330)?;
        let local_offset = UtcOffset::from_whole_seconds(offset_minutes.saturating_mul(60))
            .map_err(|e| invalid("LOCAL_UTC_OFFSET_MINUTES", offset_minutes, e))?;

        Ok(Self {
            host: try_load("HOST", defaults.host)?,
            port: try_load("PORT", defaults.port)?,
            frontend_url: try_load("FRONTEND_URL", defaults.frontend_url)?,
            api_version: try_load("CABSYNC_API_VERSION", defaults.api_version)?,
            namma_yatri_enabled: load_flag("NAMMA_YATRI_ENABLED"),
            beckn_gateway_url: try_load("BECKN_GATEWAY_URL", defaults.beckn_gateway_url)?,
            bap_uri: try_load("BAP_URI", defaults.bap_uri)?,
            bap_id: try_load("BAP_ID", defaults.bap_id)?,
            beckn_city_code: try_load("BECKN_CITY_CODE", defaults.beckn_city_code)?,
            beckn_callback_timeout: Duration::from_millis(try_load(
                "BECKN_CALLBACK_TIMEOUT_MS",
                5000u64,
            )?),
            nominatim_url: try_load("NOMINATIM_URL", defaults.nominatim_url)?,
            photon_url: try_load("PHOTON_URL", defaults.photon_url)?,
            geocoder_timeout: Duration::from_millis(try_load("GEOCODER_TIMEOUT_MS", 4000u64)?),
            location_cache_ttl: Duration::from_secs(try_load("LOCATION_CACHE_TTL_SECS", 600u64)?),
            compare_cache_ttl: Duration::from_secs(try_load("COMPARE_CACHE_TTL_SECS", 60u64)?),
            fare_jitter: try_load("FARE_JITTER", jitter_default)?,
            local_offset,
            rate_cards_path: env::var("CABSYNC_RATE_CARDS")
                .ok()
                .filter(|p| !p.trim().is_empty()),
        })
    }

    fn fare_jitter_label(&self) -> &'static str {
        match self.fare_jitter {
            JitterMode::Seeded => "seeded",
            JitterMode::Random => "random",
            JitterMode::Disabled => "off",
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Built-in catalog unless `CABSYNC_RATE_CARDS` names a JSON file.
    pub fn rate_catalog(&self) -> Result<RateCatalog, ConfigError> {
        let Some(path) = &self.rate_cards_path else {
            return Ok(RateCatalog::default());
        };
        let raw = read_to_string(path).map_err(|source| ConfigError::RateCardFile {
            path: path.clone(),
            source,
        })?;
        let catalog = RateCatalog::from_json(&raw).map_err(|source| ConfigError::RateCards {
            path: path.clone(),
            source,
        })?;
        info!("Loaded rate cards from {path}");
        Ok(catalog)
    }
}

fn invalid(key: &'static str, value: impl Display, reason: impl Display) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn try_load<T>(key: &'static str, default: impl Display) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.trim().parse().map_err(|e| {
        warn!("Invalid {key} value: {e}");
        invalid(key, &raw, e)
    })
}

fn load_flag(key: &str) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}
