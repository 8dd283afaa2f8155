use anyhow::{anyhow, Context, Result};
use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::tvdb::{ENGLISH, TVDB_BASE};

const DEFAULT_PORT: u16 = 3147;

#[derive(Debug, Clone)]
pub struct Config {
    pub tvdb_api_key: String,
    pub tvdb_pin: Option<String>,
    pub tvdb_base_url: String,
    /// Upstream `Accept-Language`, an ISO 639-2 code such as `eng`.
    pub tvdb_language: String,
    pub bind_addr: IpAddr,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let tvdb_api_key = get("TVDB_API_KEY")
            .ok_or_else(|| anyhow!("Missing required environment variable: TVDB_API_KEY"))?;
        let bind_addr = match get("BIND_ADDR") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("BIND_ADDR is not an IP address: {raw}"))?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };
        let port = match get("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("PORT is not a valid port: {raw}"))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            tvdb_api_key,
            tvdb_pin: get("TVDB_PIN"),
            tvdb_base_url: get("TVDB_BASE_URL").unwrap_or_else(|| TVDB_BASE.to_string()),
            tvdb_language: get("TVDB_LANGUAGE")
                .map(|l| l.trim().to_ascii_lowercase())
                .unwrap_or_else(|| ENGLISH.to_string()),
            bind_addr,
            port,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn requires_api_key() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("TVDB_API_KEY"));
        assert!(Config::from_lookup(lookup(&[("TVDB_API_KEY", " ")])).is_err());
    }

    #[test]
    fn applies_defaults() {
        let config = Config::from_lookup(lookup(&[("TVDB_API_KEY", "key")])).unwrap();
        assert_eq!(config.tvdb_base_url, TVDB_BASE);
        assert_eq!(config.tvdb_language, "eng");
        assert_eq!(config.tvdb_pin, None);
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:3147");
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("TVDB_API_KEY", "key"),
            ("TVDB_PIN", "1234"),
            ("TVDB_LANGUAGE", "FRA"),
            ("BIND_ADDR", "127.0.0.1"),
            ("PORT", "8080"),
        ]))
        .unwrap();
        assert_eq!(config.tvdb_pin.as_deref(), Some("1234"));
        assert_eq!(config.tvdb_language, "fra");
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn rejects_bad_port() {
        assert!(Config::from_lookup(lookup(&[("TVDB_API_KEY", "key"), ("PORT", "http")])).is_err());
    }
}
