//! Validator configuration, loadable from TOML
//!
//! ```toml
//! seed_policy = "forward"
//! ignored_roles = ["platform", "stop"]
//! platform_role = "platform"
//! ```

use ptassist_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// How the traversal picks a direction for a way it (re)starts on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedPolicy {
    /// Face the next resolved path way, falling back to forward
    #[default]
    LookAhead,
    /// Always start forward
    Forward,
}

impl fmt::Display for SeedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SeedPolicy::LookAhead => "look_ahead",
            SeedPolicy::Forward => "forward",
        })
    }
}

impl FromStr for SeedPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "look_ahead" | "lookahead" => Ok(SeedPolicy::LookAhead),
            "forward" => Ok(SeedPolicy::Forward),
            other => Err(Error::Config(format!(
                "unknown seed policy '{other}', expected 'look_ahead' or 'forward'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub seed_policy: SeedPolicy,
    /// Member roles that are not part of the travelled path
    pub ignored_roles: Vec<String>,
    /// Role given to platforms by the replacement tools
    pub platform_role: String,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            seed_policy: SeedPolicy::default(),
            ignored_roles: [
                "platform",
                "platform_entry_only",
                "platform_exit_only",
                "stop",
                "stop_entry_only",
                "stop_exit_only",
            ]
            .iter()
            .map(|r| r.to_string())
            .collect(),
            platform_role: "platform".to_string(),
        }
    }
}

impl ValidatorConfig {
    /// Load from a TOML file; absent keys keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {e}", path.display())))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))
    }

    /// Whether a way member with this role belongs to the travelled path
    pub fn is_path_role(&self, role: &str) -> bool {
        !self.ignored_roles.iter().any(|ignored| ignored == role)
    }
}
