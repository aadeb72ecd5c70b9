//! # Configuration Management
//!
//! Server-wide configuration consumed by the license builder, the command
//! endpoint and the status notifier.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()` / `from_toml()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()` (`LCP_*` variables)
//!
//! ## Security Considerations
//! - The command endpoint is meant for a private network only: it carries no
//!   transport encryption and must not be bound to a public interface.
//! - Protocol and notification credentials are compared as plain strings.

use crate::error::{LcpError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::Level;

/// Default address of the command protocol listener
pub const DEFAULT_COMMAND_ADDRESS: &str = "127.0.0.1:10000";

/// Default address of the companion status server's command listener
pub const DEFAULT_STATUS_ADDRESS: &str = "127.0.0.1:9000";

/// Encryption profile identifier for the basic profile
pub const BASIC_PROFILE: &str = "http://readium.org/lcp/basic-profile";

/// Encryption profile identifier for the 1.0 profile
pub const V1_PROFILE: &str = "http://readium.org/lcp/profile-1.0";

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LcpConfig {
    /// Encryption profile selector: `basic` or `1.0`
    #[serde(default = "default_profile")]
    pub profile: String,

    /// Base URL under which stored publications are published
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Provider URI written into every license
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Command endpoint configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Companion status server configuration
    #[serde(default)]
    pub status: StatusConfig,

    /// License content defaults
    #[serde(default)]
    pub license: LicenseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_profile() -> String {
    String::from("basic")
}

fn default_public_base_url() -> String {
    String::from("http://localhost:8989")
}

fn default_provider() -> String {
    String::from("http://localhost:8989")
}

impl Default for LcpConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            public_base_url: default_public_base_url(),
            provider: default_provider(),
            server: ServerConfig::default(),
            status: StatusConfig::default(),
            license: LicenseConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl LcpConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| LcpError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| LcpError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| LcpError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        Ok(config)
    }

    /// Override fields from `LCP_*` environment variables
    pub fn apply_env(&mut self) {
        if let Ok(profile) = std::env::var("LCP_PROFILE") {
            self.profile = profile;
        }

        if let Ok(url) = std::env::var("LCP_PUBLIC_BASE_URL") {
            self.public_base_url = url;
        }

        if let Ok(addr) = std::env::var("LCP_COMMAND_ADDRESS") {
            self.server.address = addr;
        }

        if let Ok(readonly) = std::env::var("LCP_READONLY") {
            self.server.read_only = !readonly.is_empty();
        }

        if let Ok(addr) = std::env::var("LCP_STATUS_ADDRESS") {
            self.status.address = addr;
        }

        if let Ok(user) = std::env::var("LCP_NOTIFY_USERNAME") {
            self.status.notify_auth.username = user;
        }

        if let Ok(password) = std::env::var("LCP_NOTIFY_PASSWORD") {
            self.status.notify_auth.password = password;
        }
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Resolve the configured profile selector to its profile identifier.
    /// Anything other than `1.0` selects the basic profile.
    pub fn profile_uri(&self) -> &'static str {
        if self.profile == "1.0" {
            V1_PROFILE
        } else {
            BASIC_PROFILE
        }
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.profile != "basic" && self.profile != "1.0" {
            errors.push(format!(
                "Unknown encryption profile: '{}' (expected 'basic' or '1.0')",
                self.profile
            ));
        }

        if self.public_base_url.is_empty() {
            errors.push("Public base URL cannot be empty".to_string());
        }

        errors.extend(self.server.validate());
        errors.extend(self.status.validate());
        errors.extend(self.logging.validate());

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(LcpError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Username/password pair used on the command protocol
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Plain equality check of both fields.
    // TODO: switch to a constant-time comparison once peers are migrated to hashed secrets
    pub fn matches(&self, username: &str, password: &str) -> bool {
        !self.username.is_empty() && self.username == username && self.password == password
    }

    pub fn is_configured(&self) -> bool {
        !self.username.is_empty()
    }
}

/// Command endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Command protocol listen address (e.g., "127.0.0.1:10000")
    pub address: String,

    /// Reject every mutating operation when set
    #[serde(default)]
    pub read_only: bool,

    /// Credentials trusted peers must present on the command protocol
    #[serde(default)]
    pub auth: Credentials,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: String::from(DEFAULT_COMMAND_ADDRESS),
            read_only: false,
            auth: Credentials::default(),
        }
    }
}

impl ServerConfig {
    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Command endpoint address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid command endpoint address format: '{}' (expected format: '127.0.0.1:10000')",
                self.address
            ));
        }

        if !self.auth.is_configured() {
            errors.push(
                "WARNING: No command protocol credentials - every command will be rejected"
                    .to_string(),
            );
        }

        errors
    }
}

/// Companion status server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatusConfig {
    /// Address of the companion server's command listener
    pub address: String,

    /// Public base URL of the status documents, used for the license status link
    #[serde(default = "default_status_base_url")]
    pub public_base_url: String,

    /// Credentials presented when notifying the companion server
    #[serde(default)]
    pub notify_auth: Credentials,
}

fn default_status_base_url() -> String {
    String::from("http://localhost:8990")
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            address: String::from(DEFAULT_STATUS_ADDRESS),
            public_base_url: default_status_base_url(),
            notify_auth: Credentials::default(),
        }
    }
}

impl StatusConfig {
    /// Validate status server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Status server address cannot be empty".to_string());
        }

        if self.public_base_url.is_empty() {
            errors.push("Status public base URL cannot be empty".to_string());
        }

        errors
    }
}

/// Defaults written into every issued license
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LicenseConfig {
    /// Optional passphrase hint page, added as a `hint` link
    #[serde(default)]
    pub hint_link: Option<String>,

    /// Default number of printable pages when the draft does not set one
    #[serde(default)]
    pub print: Option<u32>,

    /// Default number of copyable characters when the draft does not set one
    #[serde(default)]
    pub copy: Option<u32>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("lcp-core"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
