//! Connection profiles stored in `~/.quiver/config.toml`
//!
//! ```toml
//! [default]
//! endpoint = "http://127.0.0.1:9000"
//! access_key = "minio"
//! secret_key = "minio123"
//!
//! [aws]
//! endpoint = "s3.amazonaws.com"
//! access_key = "AKIAEXAMPLE"
//! secret_key = "wJalrEXAMPLEKEY"
//! region = "eu-central-1"
//! virtual_host_style = true
//! part_size = 67108864
//! ```

use anyhow::{Context, Result};
use quiver_client::ClientConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use url::Url;

pub const DEFAULT_PROFILE: &str = "default";

/// One connection profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Endpoint URL; the scheme selects TLS, https when omitted
    pub endpoint: Option<String>,

    pub access_key: Option<String>,

    pub secret_key: Option<String>,

    pub session_token: Option<String>,

    /// Fixed region; discovered per bucket when unset
    pub region: Option<String>,

    /// Virtual-hosted-style addressing instead of path style
    #[serde(default)]
    pub virtual_host_style: bool,

    /// Multipart part size in bytes
    pub part_size: Option<u64>,

    /// Request timeout in seconds
    pub timeout: Option<u64>,
}

/// Configuration file with multiple profiles
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(flatten)]
    pub profiles: BTreeMap<String, Config>,
}

impl ConfigFile {
    fn read() -> Result<Self> {
        let config_path = Config::config_path()?;
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")
    }

    fn write(&self) -> Result<()> {
        let config_path = Config::config_path()?;
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))
    }
}

fn env_override(target: &mut Option<String>, names: &[&str]) {
    for name in names {
        if let Ok(value) = std::env::var(name) {
            *target = Some(value);
        }
    }
}

impl Config {
    pub fn config_dir() -> Result<PathBuf> {
        let home = directories::BaseDirs::new()
            .context("Could not determine home directory")?
            .home_dir()
            .to_path_buf();

        Ok(home.join(".quiver"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load a profile and apply environment overrides
    pub fn load(profile: Option<&str>) -> Result<Self> {
        let mut config = Self::load_stored(profile)?;
        config.apply_env();
        Ok(config)
    }

    /// Load a profile exactly as written in the config file
    pub fn load_stored(profile: Option<&str>) -> Result<Self> {
        let profile_name = profile.unwrap_or(DEFAULT_PROFILE);

        Ok(ConfigFile::read()?
            .profiles
            .remove(profile_name)
            .unwrap_or_default())
    }

    /// `AWS_*` variables are applied after `QUIVER_*` ones and win
    fn apply_env(&mut self) {
        env_override(&mut self.endpoint, &["QUIVER_ENDPOINT", "AWS_ENDPOINT_URL"]);
        env_override(&mut self.access_key, &["QUIVER_ACCESS_KEY", "AWS_ACCESS_KEY_ID"]);
        env_override(
            &mut self.secret_key,
            &["QUIVER_SECRET_KEY", "AWS_SECRET_ACCESS_KEY"],
        );
        env_override(
            &mut self.session_token,
            &["QUIVER_SESSION_TOKEN", "AWS_SESSION_TOKEN"],
        );
        env_override(&mut self.region, &["QUIVER_REGION", "AWS_REGION"]);
    }

    /// Save configuration to a profile
    pub fn save(&self, profile: Option<&str>) -> Result<()> {
        let profile_name = profile.unwrap_or(DEFAULT_PROFILE);

        // An unreadable file is replaced rather than blocking the save
        let mut config_file = ConfigFile::read().unwrap_or_default();
        config_file
            .profiles
            .insert(profile_name.to_string(), self.clone());
        config_file.write()
    }

    pub fn list_profiles() -> Result<Vec<String>> {
        Ok(ConfigFile::read()?.profiles.into_keys().collect())
    }

    pub fn delete_profile(profile: &str) -> Result<()> {
        let mut config_file = ConfigFile::read()?;
        if config_file.profiles.remove(profile).is_some() {
            config_file.write()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_none() {
            anyhow::bail!("Endpoint not configured. Set QUIVER_ENDPOINT or use 'quiver configure'");
        }

        if self.access_key.is_some() != self.secret_key.is_some() {
            anyhow::bail!(
                "Access key and secret key must be set together. Use 'quiver configure'"
            );
        }

        Ok(())
    }

    /// Client configuration for this profile
    pub fn client_config(&self) -> Result<ClientConfig> {
        self.validate()?;

        let endpoint = self.endpoint.as_deref().unwrap_or_default();
        let url = if endpoint.contains("://") {
            Url::parse(endpoint)
        } else {
            Url::parse(&format!("https://{}", endpoint))
        }
        .with_context(|| format!("Invalid endpoint URL: {}", endpoint))?;

        let host = url
            .host_str()
            .with_context(|| format!("Endpoint has no host: {}", endpoint))?;
        let use_ssl = match url.scheme() {
            "https" => true,
            "http" => false,
            other => anyhow::bail!("Unsupported endpoint scheme: {}", other),
        };

        let mut config = ClientConfig::new(host)
            .with_ssl(use_ssl)
            .with_port(url.port().unwrap_or(0))
            .with_virtual_host_style(self.virtual_host_style);

        if let (Some(access_key), Some(secret_key)) = (&self.access_key, &self.secret_key) {
            config = config.with_credentials(access_key.as_str(), secret_key.as_str());
        }
        if let Some(token) = &self.session_token {
            config = config.with_session_token(token.as_str());
        }
        if let Some(region) = &self.region {
            config = config.with_region(region.as_str());
        }
        if let Some(part_size) = self.part_size {
            config = config.with_part_size(part_size);
        }
        if let Some(timeout) = self.timeout {
            config.transport.timeout_secs = timeout;
        }

        Ok(config)
    }

    /// Get a config value by key name
    pub fn get_value(&self, key: &str) -> Option<String> {
        match key {
            "endpoint" => self.endpoint.clone(),
            "access_key" => self.access_key.clone(),
            "secret_key" => self.secret_key.as_ref().map(|_| "***".to_string()),
            "session_token" => self.session_token.as_ref().map(|_| "***".to_string()),
            "region" => self.region.clone(),
            "virtual_host_style" => Some(self.virtual_host_style.to_string()),
            "part_size" => self.part_size.map(|s| s.to_string()),
            "timeout" => self.timeout.map(|t| t.to_string()),
            _ => None,
        }
    }

    /// Set a config value by key name
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "endpoint" => self.endpoint = Some(value.to_string()),
            "access_key" => self.access_key = Some(value.to_string()),
            "secret_key" => self.secret_key = Some(value.to_string()),
            "session_token" => self.session_token = Some(value.to_string()),
            "region" => self.region = Some(value.to_string()),
            "virtual_host_style" => self.virtual_host_style = value.parse()?,
            "part_size" => self.part_size = Some(value.parse()?),
            "timeout" => self.timeout = Some(value.parse()?),
            _ => anyhow::bail!("Unknown config key: {}", key),
        }
        Ok(())
    }

    pub fn keys() -> &'static [&'static str] {
        &[
            "endpoint",
            "access_key",
            "secret_key",
            "session_token",
            "region",
            "virtual_host_style",
            "part_size",
            "timeout",
        ]
    }
}
