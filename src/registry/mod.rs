//! Versioned, file-backed model registry.

pub mod artifact;
pub mod store;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use artifact::{DatasetSummary, ModelArtifact, ModelSignature, TrainingParams};
pub use store::ModelRegistry;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no version of model '{name}' matches selector '{selector}'")]
    NotFound { name: String, selector: String },
    #[error("invalid selector '{0}': expected 'latest', a version number or a stage name")]
    InvalidSelector(String),
    #[error("invalid model name '{0}'")]
    InvalidName(String),
    #[error("artifact for {name} v{version} is corrupt: expected sha256 {expected}, found {actual}")]
    Corrupt {
        name: String,
        version: u64,
        expected: String,
        actual: String,
    },
    #[error("could not claim a version for model '{name}' after {attempts} attempts")]
    VersionConflict { name: String, attempts: u32 },
    #[error("registry I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("registry serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RegistryError {
    pub fn not_found(name: &str, selector: impl fmt::Display) -> Self {
        Self::NotFound {
            name: name.to_string(),
            selector: selector.to_string(),
        }
    }
}

/// Deployment label of a version. Reassignable without creating a version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    None,
    Staging,
    Production,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::None => "none",
            Stage::Staging => "staging",
            Stage::Production => "production",
        };
        f.write_str(s)
    }
}

impl FromStr for Stage {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Stage::None),
            "staging" => Ok(Stage::Staging),
            "production" => Ok(Stage::Production),
            _ => Err(RegistryError::InvalidSelector(s.to_string())),
        }
    }
}

/// Which version of a model to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// Highest version, whatever its stage
    Latest,
    Version(u64),
    /// Highest version currently holding the stage
    Stage(Stage),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Latest => f.write_str("latest"),
            Selector::Version(v) => write!(f, "{}", v),
            Selector::Stage(stage) => write!(f, "{}", stage),
        }
    }
}

impl FromStr for Selector {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("latest") {
            return Ok(Selector::Latest);
        }
        if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return trimmed
                .parse()
                .map(Selector::Version)
                .map_err(|_| RegistryError::InvalidSelector(s.to_string()));
        }
        trimmed
            .parse::<Stage>()
            .map(Selector::Stage)
            .map_err(|_| RegistryError::InvalidSelector(s.to_string()))
    }
}

/// A published version as seen by readers.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    pub name: String,
    pub version: u64,
    pub stage: Stage,
    pub artifact: ModelArtifact,
    /// When the version was published
    pub created_at: DateTime<Utc>,
    /// Hex SHA-256 of the stored artifact bytes
    pub checksum: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selector() {
        assert_eq!("latest".parse::<Selector>().unwrap(), Selector::Latest);
        assert_eq!(" LATEST ".parse::<Selector>().unwrap(), Selector::Latest);
        assert_eq!("7".parse::<Selector>().unwrap(), Selector::Version(7));
        assert_eq!(
            "Production".parse::<Selector>().unwrap(),
            Selector::Stage(Stage::Production)
        );
        assert_eq!("staging".parse::<Selector>().unwrap(), Selector::Stage(Stage::Staging));
    }

    #[test]
    fn test_parse_selector_rejects_garbage() {
        for bad in ["", "v1", "-1", "prod", "1.0"] {
            assert!(
                matches!(bad.parse::<Selector>(), Err(RegistryError::InvalidSelector(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_selector_display_roundtrip() {
        for selector in [
            Selector::Latest,
            Selector::Version(12),
            Selector::Stage(Stage::None),
            Selector::Stage(Stage::Production),
        ] {
            assert_eq!(selector.to_string().parse::<Selector>().unwrap(), selector);
        }
    }

    #[test]
    fn test_stage_serde() {
        assert_eq!(serde_json::to_string(&Stage::Production).unwrap(), "\"production\"");
        let stage: Stage = serde_json::from_str("\"staging\"").unwrap();
        assert_eq!(stage, Stage::Staging);
    }
}
