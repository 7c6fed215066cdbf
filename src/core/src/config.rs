//! Harness configuration loading and validation

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::{Credential, ServerAddress};

/// Environment variable naming a TOML configuration file
pub const CONFIG_ENV: &str = "RBACPROBE_CONFIG";
/// Environment variable overriding `server.binary`
pub const MONGOD_ENV: &str = "RBACPROBE_MONGOD";
/// Environment variable overriding `server.port`
pub const PORT_ENV: &str = "RBACPROBE_PORT";

/// Complete harness configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub session: SessionSection,

    #[serde(default)]
    pub fixtures: FixturesSection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSection {
    #[serde(default = "default_binary")]
    pub binary: PathBuf,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub auth: bool,
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_ms: u64,
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_ms: u64,
    #[serde(default = "default_probe_interval")]
    pub probe_interval_ms: u64,
    /// Version prefix the binary must report. An empty string skips the check.
    #[serde(default = "default_expected_version")]
    pub expected_version: Option<String>,
    #[serde(default)]
    pub extra_args: Vec<String>,
    /// Server output lines kept for startup diagnostics
    #[serde(default = "default_output_lines")]
    pub output_lines: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionSection {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_selection_timeout")]
    pub server_selection_timeout_ms: u64,
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

/// Names used to provision server state
#[derive(Clone, Deserialize, Serialize)]
pub struct FixturesSection {
    #[serde(default = "default_admin_user")]
    pub admin_user: String,
    #[serde(default = "default_admin_password")]
    pub admin_password: String,
    #[serde(default = "default_admin_database")]
    pub admin_database: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_user_password")]
    pub user_password: String,
    #[serde(default = "default_target_database")]
    pub target_database: String,
    #[serde(default = "default_target_collection")]
    pub target_collection: String,
    #[serde(default = "default_foreign_collection")]
    pub foreign_collection: String,
    #[serde(default = "default_custom_role")]
    pub custom_role: String,
}

impl std::fmt::Debug for FixturesSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixturesSection")
            .field("admin_user", &self.admin_user)
            .field("admin_database", &self.admin_database)
            .field("user", &self.user)
            .field("target_database", &self.target_database)
            .field("target_collection", &self.target_collection)
            .field("foreign_collection", &self.foreign_collection)
            .field("custom_role", &self.custom_role)
            .finish_non_exhaustive()
    }
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            host: default_host(),
            port: default_port(),
            auth: true,
            startup_timeout_ms: default_startup_timeout(),
            shutdown_grace_ms: default_shutdown_grace(),
            probe_interval_ms: default_probe_interval(),
            expected_version: default_expected_version(),
            extra_args: Vec::new(),
            output_lines: default_output_lines(),
        }
    }
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout(),
            server_selection_timeout_ms: default_selection_timeout(),
            app_name: default_app_name(),
        }
    }
}

impl Default for FixturesSection {
    fn default() -> Self {
        Self {
            admin_user: default_admin_user(),
            admin_password: default_admin_password(),
            admin_database: default_admin_database(),
            user: default_user(),
            user_password: default_user_password(),
            target_database: default_target_database(),
            target_collection: default_target_collection(),
            foreign_collection: default_foreign_collection(),
            custom_role: default_custom_role(),
        }
    }
}

// Default value functions
fn default_true() -> bool { true }
fn default_binary() -> PathBuf { PathBuf::from("mongod") }
fn default_host() -> String { "localhost".to_string() }
fn default_port() -> u16 { 27018 }
fn default_startup_timeout() -> u64 { 30_000 }
fn default_shutdown_grace() -> u64 { 5_000 }
fn default_probe_interval() -> u64 { 100 }
fn default_expected_version() -> Option<String> { Some("4.4".to_string()) }
fn default_output_lines() -> usize { 50 }
fn default_connect_timeout() -> u64 { 5_000 }
fn default_selection_timeout() -> u64 { 5_000 }
fn default_app_name() -> String { "rbacprobe".to_string() }
fn default_admin_user() -> String { "admin-user".to_string() }
fn default_admin_password() -> String { "admin-password".to_string() }
fn default_admin_database() -> String { "admin".to_string() }
fn default_user() -> String { "test-db-user".to_string() }
fn default_user_password() -> String { "test-db-user-password".to_string() }
fn default_target_database() -> String { "test-db".to_string() }
fn default_target_collection() -> String { "test-coll".to_string() }
fn default_foreign_collection() -> String { "other-coll".to_string() }
fn default_custom_role() -> String { "listColls".to_string() }

impl HarnessConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read configuration file {:?}", path.as_ref()))?;

        let config: HarnessConfig =
            toml::from_str(&contents).context("Failed to parse configuration file")?;

        tracing::debug!("Loaded configuration from {:?}", path.as_ref());
        Ok(config)
    }

    /// Defaults, or the file named by `RBACPROBE_CONFIG`, with
    /// `RBACPROBE_MONGOD` / `RBACPROBE_PORT` applied on top
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(PathBuf::from(path))?,
            None => Self::default(),
        };

        if let Some(binary) = std::env::var_os(MONGOD_ENV) {
            config.server.binary = PathBuf::from(binary);
        }
        if let Ok(port) = std::env::var(PORT_ENV) {
            config.server.port = port
                .parse()
                .with_context(|| format!("{} is not a port number: {:?}", PORT_ENV, port))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("server.port must be a fixed, non-zero port");
        }

        if self.server.host.is_empty() {
            anyhow::bail!("server.host must not be empty");
        }

        if self.server.startup_timeout_ms == 0 {
            anyhow::bail!("server.startup_timeout_ms must be positive");
        }

        if self.server.probe_interval_ms == 0
            || self.server.probe_interval_ms > self.server.startup_timeout_ms
        {
            anyhow::bail!("server.probe_interval_ms must be within (0, startup_timeout_ms]");
        }

        let fixtures = &self.fixtures;
        if fixtures.target_collection == fixtures.foreign_collection {
            anyhow::bail!("fixtures.foreign_collection must differ from target_collection");
        }

        for (field, value) in [
            ("admin_user", &fixtures.admin_user),
            ("admin_database", &fixtures.admin_database),
            ("user", &fixtures.user),
            ("target_database", &fixtures.target_database),
            ("target_collection", &fixtures.target_collection),
            ("custom_role", &fixtures.custom_role),
        ] {
            if value.is_empty() {
                anyhow::bail!("fixtures.{} must not be empty", field);
            }
        }

        Ok(())
    }
}

impl ServerSection {
    pub fn address(&self) -> ServerAddress {
        ServerAddress::new(self.host.clone(), self.port)
    }

    /// Version prefix to enforce, if any
    pub fn version_requirement(&self) -> Option<&str> {
        self.expected_version
            .as_deref()
            .map(str::trim)
            .filter(|version| !version.is_empty())
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }
}

impl SessionSection {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn server_selection_timeout(&self) -> Duration {
        Duration::from_millis(self.server_selection_timeout_ms)
    }
}

impl FixturesSection {
    pub fn admin_credential(&self) -> Credential {
        Credential::new(&self.admin_user, &self.admin_password, &self.admin_database)
    }

    /// Restricted user's credential, defined on `source`
    pub fn user_credential(&self, source: &str) -> Credential {
        Credential::new(&self.user, &self.user_password, source)
    }
}
