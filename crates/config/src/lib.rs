//! Configuration loading and validation for modwatch.
//!
//! Settings are merged from up to three layers, later layers winning:
//!
//! 1. Built-in defaults (30-second scan period, no registries),
//! 2. a configuration file (TOML, YAML or JSON, chosen by extension) -
//!    either an explicit path or the per-user default location,
//! 3. `MODWATCH_`-prefixed environment variables.
//!
//! What a "registry" is beyond a name, an endpoint and an opaque credential
//! blob is the registry adapter's business; this crate only carries the
//! values through and rejects configurations that could never work (empty
//! or duplicate names, a zero scan period).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Toml, Yaml};
use serde::Deserialize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fallback scan period, in seconds, when no layer specifies one.
const DEFAULT_SCAN_PERIOD_SECONDS: u64 = 30;

/// One registry to watch.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct RegistrySettings {
    /// Stable identifier; becomes the first component of every cache key.
    pub name: String,
    /// Where the registry lives. Interpretation is the adapter's concern.
    pub endpoint: String,
    /// Opaque credential blob handed to the registry adapter as-is.
    #[serde(default)]
    pub auth: Option<String>,
}

/// Validated watcher configuration.
///
/// # Examples
///
/// ```
/// use modwatch_config::Settings;
///
/// let settings = Settings::default();
/// assert_eq!(settings.scan_period().as_secs(), 30);
/// assert!(settings.registries.is_empty());
/// ```
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Settings {
    /// Seconds between scans. Kept as a plain integer so every provider
    /// (TOML, YAML, JSON, env) can express it the same way.
    #[serde(default = "default_scan_period_seconds")]
    pub scan_period_seconds: u64,
    #[serde(default)]
    pub registries: Vec<RegistrySettings>,
}

fn default_scan_period_seconds() -> u64 {
    DEFAULT_SCAN_PERIOD_SECONDS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scan_period_seconds: default_scan_period_seconds(),
            registries: Vec::new(),
        }
    }
}

impl Settings {
    /// The scan period as a [`Duration`].
    pub fn scan_period(&self) -> Duration {
        Duration::from_secs(self.scan_period_seconds)
    }

    fn validate(&self) -> Result<()> {
        if self.scan_period_seconds == 0 {
            exn::bail!(ErrorKind::Invalid("scan period must be non-zero".to_string()));
        }
        let mut seen = Vec::with_capacity(self.registries.len());
        for registry in &self.registries {
            if registry.name.is_empty() {
                exn::bail!(ErrorKind::Invalid("registry name must not be empty".to_string()));
            }
            if registry.endpoint.is_empty() {
                exn::bail!(ErrorKind::Invalid(format!(
                    "registry `{}` has an empty endpoint",
                    registry.name
                )));
            }
            if seen.contains(&registry.name.as_str()) {
                exn::bail!(ErrorKind::Invalid(format!(
                    "duplicate registry name: {}",
                    registry.name
                )));
            }
            seen.push(registry.name.as_str());
        }
        Ok(())
    }
}

/// Load and validate settings.
///
/// With an explicit `path` the file must exist; without one, the per-user
/// default location is used if present and silently skipped otherwise.
/// Environment variables win over the file either way.
pub fn load(path: Option<&Path>) -> Result<Settings> {
    let mut figment = Figment::new();
    match path {
        Some(path) => {
            if !path.exists() {
                exn::bail!(ErrorKind::Read(path.to_path_buf()));
            }
            figment = merge_file(figment, path)?;
        },
        None => {
            if let Some(default) = default_config_file()
                && default.exists()
            {
                tracing::debug!(path = %default.display(), "Loading default configuration file");
                figment = merge_file(figment, &default)?;
            }
        },
    }
    let settings: Settings = figment
        .merge(Env::prefixed("MODWATCH_"))
        .extract()
        .or_raise(|| ErrorKind::Parse)?;
    settings.validate()?;
    tracing::debug!(
        registries = settings.registries.len(),
        period_seconds = settings.scan_period_seconds,
        "Configuration loaded"
    );
    Ok(settings)
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    match path.extension().and_then(OsStr::to_str) {
        Some("toml") => Ok(figment.merge(Toml::file(path))),
        Some("yaml") | Some("yml") => Ok(figment.merge(Yaml::file(path))),
        Some("json") => Ok(figment.merge(Json::file(path))),
        _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
    }
}

fn default_config_file() -> Option<PathBuf> {
    ProjectDirs::from("", "", "modwatch").map(|dirs| dirs.config_dir().join("config.toml"))
}
