use std::env;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PROTOCOLS_URL: &str = "https://api.llama.fi/protocols";
pub const DEFAULT_CHAINS_URL: &str = "https://api.llama.fi/chains";
pub const DEFAULT_STABLECOINS_URL: &str = "https://stablecoins.llama.fi/stablecoins";
pub const DEFAULT_YIELDS_URL: &str = "https://yields.llama.fi/pools";
pub const DEFAULT_PRICES_URL: &str = "https://api.coingecko.com/api/v3/simple/price";

fn get_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn get_env_bool(key: &str, default: bool) -> bool {
    match get_env(key) {
        None => default,
        Some(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "y" | "on"),
    }
}

fn get_env_f64(key: &str, default: f64) -> Result<f64> {
    match get_env(key) {
        None => Ok(default),
        Some(v) => Ok(v
            .parse::<f64>()
            .map_err(|e| anyhow!("{key} invalid float: {e}"))?),
    }
}

fn get_env_u64(key: &str, default: u64) -> Result<u64> {
    match get_env(key) {
        None => Ok(default),
        Some(v) => Ok(v
            .parse::<u64>()
            .map_err(|e| anyhow!("{key} invalid int: {e}"))?),
    }
}

fn get_env_string(key: &str, default: &str) -> String {
    get_env(key).unwrap_or_else(|| default.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // Dashboard
    pub dashboard_host: String,
    pub dashboard_port: u16,
    pub dashboard_open_browser: bool,
    pub default_min_apy: f64,

    // Network
    pub http_timeout_secs: u64,
    pub cache_ttl_secs: u64,
    pub user_agent: String,

    // Endpoints
    pub protocols_url: String,
    pub chains_url: String,
    pub stablecoins_url: String,
    pub yields_url: String,
    pub prices_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dashboard_host: "127.0.0.1".to_string(),
            dashboard_port: 8000,
            dashboard_open_browser: false,
            default_min_apy: 10.0,
            http_timeout_secs: 10,
            cache_ttl_secs: 60,
            user_agent: default_user_agent(),
            protocols_url: DEFAULT_PROTOCOLS_URL.to_string(),
            chains_url: DEFAULT_CHAINS_URL.to_string(),
            stablecoins_url: DEFAULT_STABLECOINS_URL.to_string(),
            yields_url: DEFAULT_YIELDS_URL.to_string(),
            prices_url: DEFAULT_PRICES_URL.to_string(),
        }
    }
}

fn default_user_agent() -> String {
    format!("defidash/{}", env!("CARGO_PKG_VERSION"))
}

impl Settings {
    pub fn load() -> Result<Self> {
        let port = get_env_u64("DASHBOARD_PORT", 8000)?;
        let dashboard_port =
            u16::try_from(port).map_err(|_| anyhow!("DASHBOARD_PORT out of range (got {port})"))?;

        let s = Self {
            dashboard_host: get_env_string("DASHBOARD_HOST", "127.0.0.1"),
            dashboard_port,
            dashboard_open_browser: get_env_bool("DASHBOARD_OPEN_BROWSER", false),
            default_min_apy: get_env_f64("DEFAULT_MIN_APY", 10.0)?,
            http_timeout_secs: get_env_u64("HTTP_TIMEOUT_SECS", 10)?,
            cache_ttl_secs: get_env_u64("CACHE_TTL_SECS", 60)?,
            user_agent: get_env_string("USER_AGENT", &default_user_agent()),
            protocols_url: get_env_string("PROTOCOLS_URL", DEFAULT_PROTOCOLS_URL),
            chains_url: get_env_string("CHAINS_URL", DEFAULT_CHAINS_URL),
            stablecoins_url: get_env_string("STABLECOINS_URL", DEFAULT_STABLECOINS_URL),
            yields_url: get_env_string("YIELDS_URL", DEFAULT_YIELDS_URL),
            prices_url: get_env_string("PRICES_URL", DEFAULT_PRICES_URL),
        };

        s.validate()?;
        Ok(s)
    }

    pub fn validate(&self) -> Result<()> {
        if self.http_timeout_secs < 1 {
            return Err(anyhow!(
                "HTTP_TIMEOUT_SECS must be >= 1 (got {})",
                self.http_timeout_secs
            ));
        }
        if self.cache_ttl_secs < 1 {
            return Err(anyhow!(
                "CACHE_TTL_SECS must be >= 1 (got {})",
                self.cache_ttl_secs
            ));
        }
        if !self.default_min_apy.is_finite() || !(0.0..=100.0).contains(&self.default_min_apy) {
            return Err(anyhow!(
                "DEFAULT_MIN_APY must be within 0..=100 (got {})",
                self.default_min_apy
            ));
        }
        for (key, url) in [
            ("PROTOCOLS_URL", &self.protocols_url),
            ("CHAINS_URL", &self.chains_url),
            ("STABLECOINS_URL", &self.stablecoins_url),
            ("YIELDS_URL", &self.yields_url),
            ("PRICES_URL", &self.prices_url),
        ] {
            if url.trim().is_empty() {
                return Err(anyhow!("{key} is empty"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        let s = Settings::default();
        assert!(s.validate().is_ok());
        assert_eq!(s.http_timeout_secs, 10);
        assert_eq!(s.cache_ttl_secs, 60);
        assert_eq!(s.default_min_apy, 10.0);
        assert_eq!(s.prices_url, DEFAULT_PRICES_URL);
    }

    #[test]
    fn rejects_zero_ttl() {
        let s = Settings {
            cache_ttl_secs: 0,
            ..Settings::default()
        };
        let err = s.validate().unwrap_err().to_string();
        assert!(err.contains("CACHE_TTL_SECS"));
    }

    #[test]
    fn rejects_min_apy_out_of_range() {
        let s = Settings {
            default_min_apy: 150.0,
            ..Settings::default()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn rejects_empty_endpoint() {
        let s = Settings {
            yields_url: "  ".to_string(),
            ..Settings::default()
        };
        let err = s.validate().unwrap_err().to_string();
        assert!(err.contains("YIELDS_URL"));
    }
}
