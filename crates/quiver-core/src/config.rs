//! Configuration for Quiver clients

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::utils::validate_endpoint;
use crate::{Error, Result};

/// Endpoint, credentials and transfer settings for one client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Host name or IP address, without scheme or port
    pub endpoint: String,
    /// TCP port; 0 selects the scheme default
    pub port: u16,
    pub use_ssl: bool,
    /// Fixed region; disables region discovery when set
    pub region: Option<String>,
    pub access_key: String,
    pub secret_key: String,
    pub session_token: Option<String>,
    /// Explicit part size; when set it is used verbatim for multipart uploads
    pub part_size: Option<u64>,
    pub virtual_host_style: bool,
    /// Region used to sign the first location lookup for a bucket
    pub bootstrap_region: String,
    pub app_name: Option<String>,
    pub app_version: Option<String>,
    pub transport: TransportSettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            port: 0,
            use_ssl: true,
            region: None,
            access_key: String::new(),
            secret_key: String::new(),
            session_token: None,
            part_size: None,
            virtual_host_style: false,
            bootstrap_region: crate::DEFAULT_REGION.to_string(),
            app_name: None,
            app_version: None,
            transport: TransportSettings::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_ssl(mut self, use_ssl: bool) -> Self {
        self.use_ssl = use_ssl;
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = access_key.into();
        self.secret_key = secret_key.into();
        self
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    pub fn with_part_size(mut self, part_size: u64) -> Self {
        self.part_size = Some(part_size);
        self
    }

    pub fn with_virtual_host_style(mut self, enabled: bool) -> Self {
        self.virtual_host_style = enabled;
        self
    }

    pub fn with_bootstrap_region(mut self, region: impl Into<String>) -> Self {
        self.bootstrap_region = region.into();
        self
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&content)
            .map_err(|e| Error::InvalidArgument(format!("Failed to parse config: {}", e)))
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(endpoint) = std::env::var("QUIVER_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Ok(port) = std::env::var("QUIVER_PORT") {
            if let Ok(p) = port.parse() {
                config.port = p;
            }
        }
        if let Ok(ssl) = std::env::var("QUIVER_USE_SSL") {
            config.use_ssl = !matches!(ssl.as_str(), "false" | "0" | "no");
        }
        if let Ok(region) = std::env::var("QUIVER_REGION") {
            config.region = Some(region);
        }
        if let Ok(key) = std::env::var("QUIVER_ACCESS_KEY") {
            config.access_key = key;
        }
        if let Ok(secret) = std::env::var("QUIVER_SECRET_KEY") {
            config.secret_key = secret;
        }
        if let Ok(token) = std::env::var("QUIVER_SESSION_TOKEN") {
            config.session_token = Some(token);
        }
        if let Ok(size) = std::env::var("QUIVER_PART_SIZE") {
            if let Ok(s) = size.parse() {
                config.part_size = Some(s);
            }
        }
        if std::env::var("QUIVER_VIRTUAL_HOST_STYLE")
            .map(|v| v == "true")
            .unwrap_or(false)
        {
            config.virtual_host_style = true;
        }

        config
    }

    pub fn validate(&self) -> Result<()> {
        validate_endpoint(&self.endpoint)?;

        if let Some(size) = self.part_size {
            if !(crate::MIN_PART_SIZE..=crate::MAX_PART_SIZE).contains(&size) {
                return Err(Error::InvalidArgument(format!(
                    "part size {} must be between {} and {} bytes",
                    size,
                    crate::MIN_PART_SIZE,
                    crate::MAX_PART_SIZE
                )));
            }
        }
        if self.app_name.is_some() != self.app_version.is_some() {
            return Err(Error::InvalidArgument(
                "application name and version must be set together".into(),
            ));
        }
        if self.bootstrap_region.is_empty() {
            return Err(Error::InvalidArgument("bootstrap region cannot be empty".into()));
        }

        Ok(())
    }

    pub fn is_anonymous(&self) -> bool {
        self.access_key.is_empty() || self.secret_key.is_empty()
    }

    pub fn scheme(&self) -> &'static str {
        if self.use_ssl {
            "https"
        } else {
            "http"
        }
    }

    pub fn default_port(&self) -> u16 {
        if self.use_ssl {
            443
        } else {
            80
        }
    }

    pub fn effective_port(&self) -> u16 {
        if self.port == 0 {
            self.default_port()
        } else {
            self.port
        }
    }

    pub fn part_size(&self) -> u64 {
        self.part_size.unwrap_or(crate::DEFAULT_PART_SIZE)
    }

    pub fn part_size_overridden(&self) -> bool {
        self.part_size.is_some()
    }

    /// Payload hashing is skipped when TLS already protects the body
    pub fn enable_sha256(&self) -> bool {
        !self.is_anonymous() && !self.use_ssl
    }
}

/// HTTP transport tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub pool_idle_per_host: usize,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 3600,
            connect_timeout_secs: 30,
            pool_idle_per_host: 16,
        }
    }
}
