//! Upgrade defaults loaded from the operator's YAML configuration
//!
//! The file keeps the `pgo.yaml` layout (`Cluster`, `PrimaryStorage` sections
//! with PascalCase keys). A missing file yields built-in defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crd::PgStorageSpec;

/// Environment variable that overrides the default target image tag
pub const IMAGE_TAG_ENV: &str = "PGO_CCP_IMAGE_TAG";

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "PGUPGRADE_CONFIG";

/// Configuration file used when no path is given
pub const DEFAULT_CONFIG_PATH: &str = "/pgconf/pgo.yaml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Process-wide upgrade defaults, passed explicitly to the validator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpgradeConfig {
    #[serde(default)]
    pub cluster: ClusterDefaults,

    #[serde(default)]
    pub primary_storage: StorageDefaults,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterDefaults {
    /// Default target image tag
    #[serde(rename = "CCPImageTag", default)]
    pub ccp_image_tag: String,

    #[serde(rename = "CCPImagePrefix", default = "default_image_prefix")]
    pub ccp_image_prefix: String,
}

impl Default for ClusterDefaults {
    fn default() -> Self {
        Self {
            ccp_image_tag: String::new(),
            ccp_image_prefix: default_image_prefix(),
        }
    }
}

fn default_image_prefix() -> String {
    "crunchydata".to_string()
}

/// Storage parameters for volumes provisioned by major upgrades
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StorageDefaults {
    #[serde(default)]
    pub name: String,

    #[serde(default = "default_access_mode")]
    pub access_mode: String,

    #[serde(default = "default_size")]
    pub size: String,

    #[serde(default)]
    pub storage_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
}

impl Default for StorageDefaults {
    fn default() -> Self {
        Self {
            name: String::new(),
            access_mode: default_access_mode(),
            size: default_size(),
            storage_type: String::new(),
            storage_class: None,
        }
    }
}

fn default_access_mode() -> String {
    "ReadWriteOnce".to_string()
}

fn default_size() -> String {
    "1G".to_string()
}

impl UpgradeConfig {
    /// Parse configuration from YAML text
    pub fn from_yaml(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load configuration from a file, falling back to defaults when it does not exist
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(path, &contents)?;
        tracing::debug!(path = %path.display(), "loaded upgrade config");
        Ok(config)
    }

    /// Load configuration and apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(|| {
            std::env::var(CONFIG_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
        });
        let config = Self::load_from_file(&path)?;
        Ok(config.with_image_tag_override(std::env::var(IMAGE_TAG_ENV).ok()))
    }

    /// Replace the default image tag when an override is set and non-empty
    pub fn with_image_tag_override(mut self, tag: Option<String>) -> Self {
        if let Some(tag) = tag.filter(|t| !t.is_empty()) {
            self.cluster.ccp_image_tag = tag;
        }
        self
    }

    /// Default image tag
    pub fn default_image_tag(&self) -> &str {
        &self.cluster.ccp_image_tag
    }

    /// Storage parameters recorded on a new upgrade intent
    pub fn storage_spec(&self) -> PgStorageSpec {
        PgStorageSpec {
            name: String::new(),
            access_mode: self.primary_storage.access_mode.clone(),
            size: self.primary_storage.size.clone(),
            storage_type: String::new(),
            storage_class: self.primary_storage.storage_class.clone(),
        }
    }
}
