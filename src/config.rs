use anyhow::{Context, Result, anyhow};
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::models::PageRange;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub backend: BackendConfig,
    pub max_upload_bytes: usize,
    pub default_range: PageRange,
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub chapter_map_path: String,
    pub text_correction_path: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            chapter_map_path: "/map-chapters/".to_string(),
            text_correction_path: "/process-pdf/".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            backend: BackendConfig::default(),
            max_upload_bytes: 100 * 1024 * 1024,
            default_range: PageRange::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let backend = BackendConfig {
            base_url: lookup("BACKEND_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.backend.base_url),
            chapter_map_path: lookup("CHAPTER_MAP_PATH").unwrap_or(defaults.backend.chapter_map_path),
            text_correction_path: lookup("TEXT_CORRECTION_PATH")
                .unwrap_or(defaults.backend.text_correction_path),
        };

        let max_upload_mb: usize = parse_var(&lookup, "MAX_UPLOAD_MB")?.unwrap_or(100);
        let max_upload_bytes = max_upload_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| anyhow!("invalid value for MAX_UPLOAD_MB: {max_upload_mb} is too large"))?;

        let default_range = PageRange::new(
            parse_var(&lookup, "DEFAULT_START")?.unwrap_or(defaults.default_range.start),
            parse_var(&lookup, "DEFAULT_END")?.unwrap_or(defaults.default_range.end),
        );

        Ok(Config {
            bind_addr: parse_var(&lookup, "BIND_ADDR")?.unwrap_or(defaults.bind_addr),
            backend,
            max_upload_bytes,
            default_range,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("invalid value for {key}: {raw:?}"))
        })
        .transpose()
}
