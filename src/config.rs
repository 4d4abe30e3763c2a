//! Run configuration.
//!
//! Everything a run needs besides its oracle, store and source handles.
//! Loadable from JSON; every field has a default.

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::model::{PRIMARY_FIELD, SECONDARY_FIELD};
use crate::{Error, Result};

/// Identifier attribute names probed at run start, in priority order.
pub const DEFAULT_ID_CANDIDATES: &[&str] = &["OBJECTID", "OID"];

/// What to do with a node that has no neighbors, whose secondary
/// adjacency is therefore undefined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolatedPolicy {
    /// Write no secondary value; the field keeps whatever it held.
    #[default]
    Skip,
    /// Write 0.
    Zero,
    /// Write the given marker value.
    Sentinel(i16),
    /// Fail the node with `Error::EmptyNeighborhood`.
    Error,
}

impl std::str::FromStr for IsolatedPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "skip" => Ok(IsolatedPolicy::Skip),
            "zero" => Ok(IsolatedPolicy::Zero),
            "error" => Ok(IsolatedPolicy::Error),
            _ => match s.strip_prefix("sentinel:") {
                Some(raw) => raw
                    .parse::<i16>()
                    .map(IsolatedPolicy::Sentinel)
                    .map_err(|_| Error::Config(format!("invalid sentinel value '{raw}'"))),
                None => Err(Error::Config(format!(
                    "unknown isolated policy '{s}' (expected skip, zero, error or sentinel:N)"
                ))),
            },
        }
    }
}

/// How a run reacts to a node that fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the first failing node and return its error.
    #[default]
    Abort,
    /// Record the failure in the report and move on.
    Continue,
}

/// Configuration for one metric run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Target dataset identifier, for logging.
    pub dataset: Option<String>,
    /// Working storage location owned by the caller.
    pub working_storage: Option<PathBuf>,
    /// Scratch storage location owned by the caller.
    pub scratch_storage: Option<PathBuf>,
    /// Identifier field names to probe, first match wins.
    pub id_field_candidates: Vec<String>,
    pub primary_field: String,
    pub secondary_field: String,
    /// Fail on any asymmetric adjacency the oracle reports.
    pub strict_symmetry: bool,
    pub isolated_policy: IsolatedPolicy,
    pub failure_policy: FailurePolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            dataset: None,
            working_storage: None,
            scratch_storage: None,
            id_field_candidates: DEFAULT_ID_CANDIDATES.iter().map(|s| s.to_string()).collect(),
            primary_field: PRIMARY_FIELD.to_string(),
            secondary_field: SECONDARY_FIELD.to_string(),
            strict_symmetry: false,
            isolated_policy: IsolatedPolicy::default(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl RunConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: RunConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn with_strict_symmetry(mut self, strict: bool) -> Self {
        self.strict_symmetry = strict;
        self
    }

    pub fn with_isolated_policy(mut self, policy: IsolatedPolicy) -> Self {
        self.isolated_policy = policy;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Reject configurations no run could use.
    pub fn validate(&self) -> Result<()> {
        if self.id_field_candidates.is_empty() {
            return Err(Error::Config("id_field_candidates must not be empty".into()));
        }
        if self.primary_field.is_empty() || self.secondary_field.is_empty() {
            return Err(Error::Config("metric field names must not be empty".into()));
        }
        if self.primary_field == self.secondary_field {
            return Err(Error::Config(format!(
                "primary and secondary fields must differ (both '{}')",
                self.primary_field
            )));
        }
        Ok(())
    }
}
