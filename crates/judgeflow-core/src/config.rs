//! Judgeflow configuration.
//!
//! Loaded from an optional TOML file, then overridden from the
//! environment, then validated:
//!
//! ```toml
//! [capacity]
//! default_max_judges = 3
//!
//! [retry]
//! max_attempts = 3
//! base_delay_ms = 50
//! max_delay_ms = 1000
//!
//! [files]
//! root = "./uploads"
//! route_prefix = "/api/admin/files"
//!
//! [database]
//! url = "surrealkv://.judgeflow/db"
//!
//! [access.tokens]
//! "admin-token" = "admin"
//! "sara-token" = "judge:sara"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use judgeflow_state::{CapacityPolicy, ConnectionSettings, DEFAULT_MAX_JUDGES};
use serde::{Deserialize, Serialize};

use crate::domain::{Result, ReviewError};
use crate::retry::RetryPolicy;

/// Overrides `[capacity] default_max_judges`.
pub const ENV_DEFAULT_MAX_JUDGES: &str = "JUDGEFLOW_DEFAULT_MAX_JUDGES";
/// Overrides `[files] root`.
pub const ENV_FILES_ROOT: &str = "JUDGEFLOW_FILES_ROOT";

/// `[capacity]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityConfig {
    pub default_max_judges: u32,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            default_max_judges: DEFAULT_MAX_JUDGES,
        }
    }
}

/// `[files]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Directory holding `<owner>/<name>` documents.
    pub root: PathBuf,
    pub route_prefix: String,
    /// When set, documents are served by redirecting to this origin
    /// instead of reading `root`.
    pub base_url: Option<String>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./uploads"),
            route_prefix: "/api/admin/files".to_string(),
            base_url: None,
        }
    }
}

/// `[access]` section: session token to identity (`admin` or `judge:<id>`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    pub tokens: BTreeMap<String, String>,
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeflowConfig {
    pub capacity: CapacityConfig,
    pub retry: RetryPolicy,
    pub files: FilesConfig,
    pub database: ConnectionSettings,
    pub access: AccessConfig,
}

impl JudgeflowConfig {
    /// Load from `path` (defaults when `None`), apply environment overrides
    /// and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|e| {
                    ReviewError::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                Self::from_toml(&content)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ReviewError::Config(e.to_string()))
    }

    /// Apply overrides from `lookup` (the process environment in `load`).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(raw) = lookup(ENV_DEFAULT_MAX_JUDGES) {
            self.capacity.default_max_judges = raw.trim().parse().map_err(|_| {
                ReviewError::Config(format!("{ENV_DEFAULT_MAX_JUDGES} is not a number: {raw}"))
            })?;
        }
        if let Some(root) = lookup(ENV_FILES_ROOT) {
            self.files.root = PathBuf::from(root);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity.default_max_judges == 0 {
            return Err(ReviewError::Config(
                "capacity.default_max_judges must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ReviewError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ReviewError::Config(
                "retry.base_delay_ms must not exceed retry.max_delay_ms".to_string(),
            ));
        }
        Ok(())
    }

    pub fn capacity_policy(&self) -> CapacityPolicy {
        CapacityPolicy::new(self.capacity.default_max_judges)
    }
}
