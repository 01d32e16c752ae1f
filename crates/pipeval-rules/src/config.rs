//! Engine configuration: column overrides, per-field toggles and rule settings.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use pipeval_core::Scope;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_TIME_ZONE: &str = "America/Sao_Paulo";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("unknown time zone {0:?}")]
    TimeZone(String),
}

/// scope -> field -> enabled. Missing entries are enabled; unknown entries are inert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationToggles(BTreeMap<String, BTreeMap<String, bool>>);

impl ValidationToggles {
    pub fn is_enabled(&self, scope: Scope, field: &str) -> bool {
        self.0
            .get(scope.as_str())
            .and_then(|fields| fields.get(field))
            .copied()
            .unwrap_or(true)
    }

    pub fn set(&mut self, scope: Scope, field: &str, enabled: bool) {
        self.0
            .entry(scope.as_str().to_string())
            .or_default()
            .insert(field.to_string(), enabled);
    }

    /// Field-level merge where entries from `other` win.
    pub fn merged_with(&self, other: &ValidationToggles) -> ValidationToggles {
        let mut merged = self.0.clone();
        for (scope, fields) in &other.0 {
            let slot = merged.entry(scope.clone()).or_default();
            for (field, enabled) in fields {
                slot.insert(field.clone(), *enabled);
            }
        }
        ValidationToggles(merged)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSettings {
    /// Accepted requester names, compared case- and accent-insensitively. Empty accepts anyone.
    pub requesters: Vec<String>,
    pub deprecated_email_domain: String,
    pub current_email_domain: String,
    /// Substrings identifying internal document hosts for proposal and contract links.
    pub document_hosts: Vec<String>,
    pub time_zone: String,
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self {
            requesters: [
                "Ana Souza",
                "Bruno Carvalho",
                "Carla Mendes",
                "Diego Martins",
                "Fernanda Lima",
                "João Pereira",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            deprecated_email_domain: "old-domain.example".to_string(),
            current_email_domain: "new-domain.example".to_string(),
            document_hosts: ["docs.google.com", "drive.google.com", "sharepoint.com"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            time_zone: DEFAULT_TIME_ZONE.to_string(),
        }
    }
}

impl RuleSettings {
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.time_zone
            .parse::<Tz>()
            .map_err(|_| ConfigError::TimeZone(self.time_zone.clone()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Raw or normalized header -> canonical key.
    pub column_overrides: BTreeMap<String, String>,
    pub validation: ValidationToggles,
    pub settings: RuleSettings,
}

impl EngineConfig {
    pub fn from_yaml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text, path)
    }

    /// `PIPEVAL_CONFIG` names an optional YAML file; `PIPEVAL_TZ` overrides its time zone.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("PIPEVAL_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_yaml_file(path.trim())?,
            _ => Self::default(),
        };
        if let Ok(tz) = std::env::var("PIPEVAL_TZ") {
            if !tz.trim().is_empty() {
                config.settings.time_zone = tz.trim().to_string();
            }
        }
        config.settings.tz()?;
        Ok(config)
    }
}
