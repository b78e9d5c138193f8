use serde::{Deserialize, Serialize};

use crate::error::{AssignmentError, Result};

/// Assignment engine configuration
///
/// # Configuration Sections
///
/// - [`assignment`]: claim retry/timeout tuning and expertise level bounds
/// - [`database`]: persistent storage settings
///
/// # Examples
///
/// ```
/// use appealflow_assignment_engine::EngineConfig;
///
/// let mut config = EngineConfig::default();
/// config.assignment.claim_timeout_ms = 250;
/// config.validate().expect("configuration should be valid");
/// ```
///
/// [`assignment`]: AssignmentConfig
/// [`database`]: DatabaseConfig
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Claim behavior and expertise bounds
    pub assignment: AssignmentConfig,

    /// Database configuration for persistent storage
    pub database: DatabaseConfig,
}

/// Claim and ranking tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentConfig {
    /// Retries of a claim against the *same* candidate after a transient
    /// store error. A lost compare-and-set is never retried; the coordinator
    /// moves to the next ranked candidate instead.
    pub max_claim_retries: u32,

    /// Per-attempt claim timeout in milliseconds. A timed-out attempt is
    /// treated as a claim failure, not a fatal error.
    pub claim_timeout_ms: u64,

    /// Retries of the candidate snapshot read before degrading to
    /// `NoCandidateAvailable`.
    pub max_snapshot_retries: u32,

    /// Experience level given to a lazily created expertise row
    pub baseline_experience_level: u8,

    /// Upper bound accepted for experience levels
    pub max_experience_level: u8,
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            max_claim_retries: 2,
            claim_timeout_ms: 500,
            max_snapshot_retries: 2,
            baseline_experience_level: 1,
            max_experience_level: 5,
        }
    }
}

/// Database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx connection URL, e.g. `sqlite:appealflow.db`
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:appealflow.db".to_string(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            assignment: AssignmentConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Validate the configuration
    ///
    /// Returns a [`AssignmentError::Configuration`] describing the first
    /// problem found.
    pub fn validate(&self) -> Result<()> {
        if self.assignment.claim_timeout_ms == 0 {
            return Err(AssignmentError::configuration(
                "claim_timeout_ms must be greater than zero",
            ));
        }
        if self.assignment.baseline_experience_level == 0 {
            return Err(AssignmentError::configuration(
                "baseline_experience_level must be at least 1",
            ));
        }
        if self.assignment.baseline_experience_level > self.assignment.max_experience_level {
            return Err(AssignmentError::configuration(format!(
                "baseline_experience_level {} exceeds max_experience_level {}",
                self.assignment.baseline_experience_level, self.assignment.max_experience_level
            )));
        }
        if self.database.url.is_empty() {
            return Err(AssignmentError::configuration("database url must be set"));
        }
        Ok(())
    }
}
