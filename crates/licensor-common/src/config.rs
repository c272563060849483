//! ---
//! lic_section: "02-ambient-runtime"
//! lic_subsection: "module"
//! lic_type: "source"
//! lic_scope: "code"
//! lic_description: "TOML configuration for licensor binaries."
//! lic_version: "v0.1.0"
//! lic_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use licensor_core::SignatureScheme;
use serde::{Deserialize, Serialize};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::logging::LogFormat;

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

/// Default locations inspected when no configuration path is given.
pub const DEFAULT_CONFIG_CANDIDATES: [&str; 2] = ["licensor.toml", "/etc/licensor/licensor.toml"];

/// Primary configuration object for licensor tooling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LicensorConfig {
    #[serde(default)]
    pub signing: SigningConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Configuration together with the file it came from, if any.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: LicensorConfig,
    pub source: Option<PathBuf>,
}

impl LicensorConfig {
    pub const ENV_CONFIG_PATH: &'static str = "LICENSOR_CONFIG";

    /// Resolve configuration: explicit path, then `LICENSOR_CONFIG`, then the
    /// first existing candidate, then built-in defaults.
    pub fn load_with_source<P: AsRef<Path>>(
        explicit: Option<&Path>,
        candidates: &[P],
    ) -> Result<LoadedConfig> {
        if let Some(path) = explicit {
            return Self::loaded_from(path.to_path_buf());
        }

        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                return Self::loaded_from(PathBuf::from(env_path));
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                return Self::loaded_from(candidate.as_ref().to_path_buf());
            }
        }

        debug!("no configuration file found; using defaults");
        Ok(LoadedConfig {
            config: Self::default(),
            source: None,
        })
    }

    fn loaded_from(path: PathBuf) -> Result<LoadedConfig> {
        let config = Self::from_path(&path)?;
        Ok(LoadedConfig {
            config,
            source: Some(path),
        })
    }

    /// Read and validate a configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        contents
            .parse::<LicensorConfig>()
            .with_context(|| format!("failed to load config file {}", path.display()))
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.signing.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for LicensorConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: LicensorConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Signing defaults applied when CLI flags are absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SigningConfig {
    #[serde(default)]
    pub scheme: SignatureScheme,
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
    #[serde(default)]
    pub public_key_path: Option<PathBuf>,
}

impl SigningConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, path) in [
            ("private_key_path", &self.private_key_path),
            ("public_key_path", &self.public_key_path),
        ] {
            if matches!(path, Some(path) if path.as_os_str().is_empty()) {
                return Err(anyhow!("signing.{name} must not be empty"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    /// Directory for daily-rolling JSON log files; stderr only when unset.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            directory: None,
            file_prefix: None,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<()> {
        EnvFilter::try_new(&self.level)
            .map(|_| ())
            .map_err(|err| anyhow!("invalid logging.level '{}': {err}", self.level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_apply_to_empty_document() {
        let config: LicensorConfig = "".parse().expect("empty config is valid");
        assert_eq!(config.signing.scheme, SignatureScheme::Ed25519Sha256);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.logging.level, "info");
        assert!(config.signing.private_key_path.is_none());
    }

    #[test]
    fn parses_full_document() {
        let config: LicensorConfig = r#"
            [signing]
            scheme = "ed25519"
            private_key_path = "keys/private.key"
            public_key_path = "keys/public.key"

            [logging]
            level = "debug,licensor_core=trace"
            format = "structured-json"
            directory = "target/logs"
        "#
        .parse()
        .expect("valid config");
        assert_eq!(config.signing.scheme, SignatureScheme::Ed25519);
        assert_eq!(
            config.signing.public_key_path.as_deref(),
            Some(Path::new("keys/public.key"))
        );
        assert_eq!(config.logging.format, LogFormat::StructuredJson);
        assert_eq!(config.logging.directory, Some(PathBuf::from("target/logs")));
    }

    #[test]
    fn rejects_unknown_keys_and_schemes() {
        assert!("[signing]\nschema = \"ed25519\"".parse::<LicensorConfig>().is_err());
        assert!("[signing]\nscheme = \"rsa\"".parse::<LicensorConfig>().is_err());
        assert!("[signing]\nprivate_key_path = \"\"".parse::<LicensorConfig>().is_err());
    }

    #[test]
    fn explicit_path_wins_and_missing_candidates_fall_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("licensor.toml");
        fs::write(&path, "[logging]\nformat = \"structured-json\"\n").unwrap();

        let loaded =
            LicensorConfig::load_with_source(Some(&path), &[dir.path().join("absent.toml")])
                .unwrap();
        assert_eq!(loaded.source.as_deref(), Some(path.as_path()));
        assert_eq!(loaded.config.logging.format, LogFormat::StructuredJson);

        let missing = LicensorConfig::from_path(&dir.path().join("absent.toml"));
        assert!(missing.is_err());
    }

    #[test]
    fn first_existing_candidate_is_used() {
        let dir = tempdir().unwrap();
        let present = dir.path().join("present.toml");
        fs::write(&present, "[signing]\nscheme = \"ed25519\"\n").unwrap();
        let candidates = [dir.path().join("absent.toml"), present.clone()];
        if std::env::var(LicensorConfig::ENV_CONFIG_PATH).is_ok() {
            return;
        }
        let loaded = LicensorConfig::load_with_source(None, &candidates).unwrap();
        assert_eq!(loaded.source, Some(present));
        assert_eq!(loaded.config.signing.scheme, SignatureScheme::Ed25519);
    }
}
