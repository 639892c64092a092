// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Connection settings
//!
//! A [`ConnectionConfig`] is read once, from YAML, and snapshotted by the
//! client when its session is first established.
//!
//! ```yaml
//! account_name: myaccount
//! access_key: c2VjcmV0
//! container: reports        # optional; omit to address containers by path
//! proxy_address: proxy.lan  # optional
//! proxy_port: 3128
//! headers:
//!   - { enabled: true, header: x-ms-client-request-id, value: blobfs }
//! root: /var/lib/blobfs     # local store used by the command-line tool
//! ```

use crate::cache::ConnectionKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required setting '{0}'")]
    Missing(&'static str),

    #[error("invalid setting '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

/// One row of the custom request header table
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HeaderRow {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub header: String,
    #[serde(default)]
    pub value: String,
}

fn enabled_by_default() -> bool {
    true
}

fn default_endpoint_suffix() -> String {
    DEFAULT_ENDPOINT_SUFFIX.to_string()
}

#[derive(Serialize, Deserialize, Clone, PartialEq)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub account_name: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default = "default_endpoint_suffix")]
    pub endpoint_suffix: String,
    #[serde(default)]
    pub container: Option<String>,
    #[serde(default)]
    pub proxy_address: Option<String>,
    #[serde(default)]
    pub proxy_port: Option<u16>,
    #[serde(default)]
    pub headers: Vec<HeaderRow>,
    #[serde(default)]
    pub root: Option<PathBuf>,
}

// The access key never appears in debug output.
impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("account_name", &self.account_name)
            .field("access_key", &"***")
            .field("endpoint_suffix", &self.endpoint_suffix)
            .field("container", &self.container)
            .field("proxy", &self.proxy())
            .field("headers", &self.headers)
            .field("root", &self.root)
            .finish()
    }
}

impl ConnectionConfig {
    pub fn new<A: Into<String>, K: Into<String>>(account_name: A, access_key: K) -> Self {
        Self {
            account_name: account_name.into(),
            access_key: access_key.into(),
            endpoint_suffix: default_endpoint_suffix(),
            container: None,
            proxy_address: None,
            proxy_port: None,
            headers: Vec::new(),
            root: None,
        }
    }

    /// Bind the connection to `container`; an empty name unbinds it
    pub fn with_container<S: Into<String>>(mut self, container: S) -> Self {
        self.container = Some(container.into());
        self
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: ConnectionConfig = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.account_name.trim().is_empty() {
            return Err(ConfigError::Missing("account_name"));
        }
        if self.access_key.trim().is_empty() {
            return Err(ConfigError::Missing("access_key"));
        }
        if self.endpoint_suffix.trim().is_empty() {
            return Err(ConfigError::Missing("endpoint_suffix"));
        }
        if self.proxy_port.is_some() && self.proxy_host().is_none() {
            return Err(ConfigError::Invalid {
                field: "proxy_port",
                reason: "set without proxy_address".to_string(),
            });
        }
        Ok(())
    }

    /// The bound container, if any. An empty name means unbound.
    pub fn bound_container(&self) -> Option<&str> {
        self.container
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    fn proxy_host(&self) -> Option<&str> {
        self.proxy_address
            .as_deref()
            .map(str::trim)
            .filter(|address| !address.is_empty())
    }

    pub fn connection_string(&self) -> String {
        self.render_connection_string(&self.access_key)
    }

    /// [`Self::connection_string`] with the key masked, for logs
    pub fn redacted_connection_string(&self) -> String {
        self.render_connection_string("***")
    }

    fn render_connection_string(&self, key: &str) -> String {
        format!(
            "DefaultEndpointsProtocol=https;AccountName={};AccountKey={};EndpointSuffix={};",
            self.account_name, key, self.endpoint_suffix
        )
    }

    /// HTTP proxy URL, when a proxy address is configured
    pub fn proxy(&self) -> Option<String> {
        let host = self.proxy_host()?;
        Some(match self.proxy_port {
            Some(port) => format!("http://{host}:{port}"),
            None => format!("http://{host}"),
        })
    }

    /// Enabled custom headers; a later row replaces an earlier one of the same name
    pub fn header_map(&self) -> BTreeMap<String, String> {
        self.headers
            .iter()
            .filter(|row| row.enabled && !row.header.trim().is_empty())
            .map(|row| (row.header.trim().to_string(), row.value.clone()))
            .collect()
    }

    /// Identity used to partition the attribute cache
    pub fn connection_key(&self) -> ConnectionKey {
        ConnectionKey::new(format!(
            "{}@{}/{}",
            self.account_name,
            self.endpoint_suffix,
            self.bound_container().unwrap_or("")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
account_name: acct
access_key: s3cret
container: reports
proxy_address: proxy.lan
proxy_port: 3128
headers:
  - { enabled: true, header: x-one, value: "1" }
  - { enabled: false, header: x-two, value: "2" }
  - { header: x-one, value: "override" }
"#;

    #[test]
    fn test_parse_and_derive() {
        let config = ConnectionConfig::from_yaml_str(SAMPLE).expect("parses");
        assert_eq!(config.endpoint_suffix, DEFAULT_ENDPOINT_SUFFIX);
        assert_eq!(config.bound_container(), Some("reports"));
        assert_eq!(config.proxy().as_deref(), Some("http://proxy.lan:3128"));
        assert_eq!(
            config.connection_string(),
            "DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=s3cret;EndpointSuffix=core.windows.net;"
        );
        assert!(!config.redacted_connection_string().contains("s3cret"));
        assert!(!format!("{config:?}").contains("s3cret"));

        let headers = config.header_map();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("x-one").map(String::as_str), Some("override"));

        assert_eq!(
            config.connection_key().as_str(),
            "acct@core.windows.net/reports"
        );
    }

    #[test]
    fn test_missing_settings() {
        let err = ConnectionConfig::from_yaml_str("access_key: k\n").expect_err("no account");
        assert!(matches!(err, ConfigError::Missing("account_name")));

        let err = ConnectionConfig::from_yaml_str("account_name: a\n").expect_err("no key");
        assert!(matches!(err, ConfigError::Missing("access_key")));

        let err = ConnectionConfig::from_yaml_str("account_name: a\naccess_key: k\nproxy_port: 1\n")
            .expect_err("port without address");
        assert!(matches!(err, ConfigError::Invalid { field: "proxy_port", .. }));

        let err = ConnectionConfig::from_yaml_str("account_name: [").expect_err("bad yaml");
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn test_empty_container_is_unbound() {
        let config = ConnectionConfig::new("a", "k").with_container("  ");
        assert_eq!(config.bound_container(), None);
        assert_eq!(config.connection_key().as_str(), "a@core.windows.net/");
        assert_eq!(config.proxy(), None);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("blobfs.yaml");
        std::fs::write(&path, SAMPLE).expect("writes");
        let config = ConnectionConfig::load(&path).expect("loads");
        assert_eq!(config.account_name, "acct");

        let err = ConnectionConfig::load(dir.path().join("missing.yaml")).expect_err("no file");
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
