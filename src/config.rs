//! Configuration loading and types for ShelfStore.
//!
//! Configuration is read from a YAML file and deserialized into the
//! [`Config`] struct.  Every section is optional; a missing file is
//! equivalent to the defaults.

use serde::Deserialize;
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Object storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Static-website serving settings.
    #[serde(default)]
    pub website: WebsiteConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind host address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Object storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory for buckets and objects.
    #[serde(default = "default_storage_root")]
    pub root_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: default_storage_root(),
        }
    }
}

/// Static-website serving configuration.
///
/// When `index_document` is set, bucket roots serve that key and object
/// misses fall back through the index/error-document chain instead of
/// returning S3 XML errors.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebsiteConfig {
    /// Key served for bucket roots and retried for missing objects.
    #[serde(default)]
    pub index_document: Option<String>,

    /// Key served with status 404 when the index fallback also misses.
    #[serde(default)]
    pub error_document: Option<String>,

    /// Redirect issued when a GET misses.
    #[serde(default)]
    pub routing_rule: Option<RoutingRule>,
}

/// A single website routing rule.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingRule {
    pub redirect: Redirect,
}

/// Redirect target description.
#[derive(Debug, Clone, Deserialize)]
pub struct Redirect {
    /// Redirect host; the request Host header is used when unset.  May
    /// carry an explicit port (`example.com:443`).
    #[serde(default)]
    pub host_name: Option<String>,

    /// Redirect scheme.
    #[serde(default = "default_protocol")]
    pub protocol: String,

    /// Prefix prepended to the requested key in the Location target.
    #[serde(default)]
    pub replace_key_prefix_with: String,

    /// HTTP status code of the redirect response.
    #[serde(default = "default_redirect_code")]
    pub http_redirect_code: u16,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Suppress all log output.
    #[serde(default)]
    pub silent: bool,

    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            silent: false,
            level: default_log_level(),
        }
    }
}

// ── Defaults ────────────────────────────────────────────────────────

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    4578
}

fn default_storage_root() -> String {
    "./data/objects".to_string()
}

fn default_protocol() -> String {
    "http".to_string()
}

fn default_redirect_code() -> u16 {
    301
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Loader ──────────────────────────────────────────────────────────

/// Load and parse configuration from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let config: Config = serde_yaml::from_str(&contents)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.server.port, 4578);
        assert_eq!(config.storage.root_dir, "./data/objects");
        assert!(config.website.index_document.is_none());
        assert!(!config.logging.silent);
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
server:
  host: 0.0.0.0
  port: 9000
storage:
  root_dir: /tmp/objects
website:
  index_document: index.html
  error_document: 404.html
  routing_rule:
    redirect:
      host_name: example.com:443
      protocol: https
      replace_key_prefix_with: new/
      http_redirect_code: 301
logging:
  silent: true
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.website.index_document.as_deref(), Some("index.html"));
        let rule = config.website.routing_rule.unwrap();
        assert_eq!(rule.redirect.protocol, "https");
        assert_eq!(rule.redirect.host_name.as_deref(), Some("example.com:443"));
        assert_eq!(rule.redirect.replace_key_prefix_with, "new/");
        assert_eq!(rule.redirect.http_redirect_code, 301);
        assert!(config.logging.silent);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let yaml = "server:\n  port: 8080\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.storage.root_dir, "./data/objects");
    }
}
