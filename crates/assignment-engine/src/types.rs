//! Core types for appeal assignment

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Administrator identifier type for strongly-typed admin references
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AdminId(pub String);

impl From<String> for AdminId {
    fn from(s: String) -> Self {
        AdminId(s)
    }
}

impl From<&str> for AdminId {
    fn from(s: &str) -> Self {
        AdminId(s.to_string())
    }
}

impl fmt::Display for AdminId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for AdminId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Appeal (support ticket) identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppealId(pub String);

impl From<String> for AppealId {
    fn from(s: String) -> Self {
        AppealId(s)
    }
}

impl From<&str> for AppealId {
    fn from(s: &str) -> Self {
        AppealId(s.to_string())
    }
}

impl fmt::Display for AppealId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Appeal category enumeration
///
/// The domain taxonomy appeals are filed under. Expertise rows are keyed by
/// category, so the set here must stay in sync with what the ticket workflow
/// accepts at intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppealCategory {
    /// Coursework, grading, and academic standing appeals
    Academic,

    /// Tuition, fees, stipends, and refund appeals
    Financial,

    /// Dormitory and housing allocation appeals
    Housing,

    /// Accounts, access, and platform problems
    Technical,

    /// Anything that does not fit a specific category
    General,
}

impl AppealCategory {
    /// Stable uppercase string used in database rows
    pub fn as_str(&self) -> &'static str {
        match self {
            AppealCategory::Academic => "ACADEMIC",
            AppealCategory::Financial => "FINANCIAL",
            AppealCategory::Housing => "HOUSING",
            AppealCategory::Technical => "TECHNICAL",
            AppealCategory::General => "GENERAL",
        }
    }
}

impl std::str::FromStr for AppealCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ACADEMIC" => Ok(AppealCategory::Academic),
            "FINANCIAL" => Ok(AppealCategory::Financial),
            "HOUSING" => Ok(AppealCategory::Housing),
            "TECHNICAL" => Ok(AppealCategory::Technical),
            "GENERAL" => Ok(AppealCategory::General),
            _ => Err(format!("Unknown appeal category: {}", s)),
        }
    }
}

impl fmt::Display for AppealCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str().to_ascii_lowercase())
    }
}

/// Outcome recorded when an appeal is closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionOutcome {
    /// The appeal was resolved to the requester's satisfaction
    Successful,

    /// The appeal was closed without a satisfactory resolution
    Unsuccessful,
}

impl ResolutionOutcome {
    pub fn is_successful(&self) -> bool {
        matches!(self, ResolutionOutcome::Successful)
    }
}

/// Result of an assignment decision
///
/// `NoCandidateAvailable` is a normal business outcome, not an error: the
/// appeal stays in the unassigned pool for manual pickup and ticket intake
/// proceeds regardless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentResult {
    /// The appeal was claimed by the given administrator
    Assigned(AdminId),

    /// No eligible administrator could be claimed
    NoCandidateAvailable,
}

impl AssignmentResult {
    /// The assigned administrator, if any
    pub fn admin_id(&self) -> Option<&AdminId> {
        match self {
            AssignmentResult::Assigned(id) => Some(id),
            AssignmentResult::NoCandidateAvailable => None,
        }
    }
}

/// Per-administrator workload record
///
/// A cached mirror of the ticket store's assigned-and-open count, kept
/// consistent transactionally at claim and release time. Rows are never
/// deleted; departed administrators are marked unavailable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminWorkload {
    /// Administrator this row belongs to
    pub admin_id: AdminId,

    /// Number of currently open appeals assigned to this admin
    pub active_appeals: u32,

    /// Lifetime assignment count; never decremented
    pub total_appeals: u64,

    /// Whether this admin may be selected as a candidate
    pub is_available: bool,

    /// Most recent assignment or resolution touch; fairness tie-breaker
    pub last_activity_at: DateTime<Utc>,
}

/// Per-(administrator, category) expertise record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminCategoryExpertise {
    pub admin_id: AdminId,
    pub category: AppealCategory,

    /// Small positive level (1..=5 by default config); higher ranks first
    pub experience_level: u8,

    pub successful_resolutions: u64,
    pub total_resolutions: u64,
}

impl AdminCategoryExpertise {
    /// Derived success ratio; never stored
    pub fn success_ratio(&self) -> f64 {
        self.successful_resolutions as f64 / (self.total_resolutions.max(1)) as f64
    }
}

/// Transient per-decision candidate tuple
///
/// Assembled fresh for every assignment from a join of the workload and
/// expertise tables, scoped to available administrators. An admin without an
/// expertise row for the requested category appears with level 0 and ratio 0.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentCandidate {
    pub admin_id: AdminId,
    pub active_appeals: u32,
    pub experience_level: u8,
    pub success_ratio: f64,
    pub last_activity_at: DateTime<Utc>,
}

/// Appeal lifecycle events the engine reacts to
///
/// Emitted by the ticket workflow; `Created` drives assignment, the rest drive
/// workload bookkeeping after the fact.
#[derive(Debug, Clone)]
pub enum AppealEvent {
    Created {
        appeal_id: AppealId,
        category: AppealCategory,
    },
    Closed {
        appeal_id: AppealId,
        admin_id: AdminId,
        category: AppealCategory,
        outcome: ResolutionOutcome,
    },
    Unassigned {
        appeal_id: AppealId,
        admin_id: AdminId,
    },
    ManuallyReassigned {
        appeal_id: AppealId,
        from_admin_id: AdminId,
        to_admin_id: AdminId,
    },
}
