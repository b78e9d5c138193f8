use thiserror::Error;

/// Error types for assignment engine operations
///
/// Business outcomes (no candidate, degraded store) are never expressed here —
/// they travel as [`crate::types::AssignmentResult`] values. This enum covers
/// contract violations and infrastructure failures only.
///
/// # Examples
///
/// ```
/// use appealflow_assignment_engine::{AssignmentError, Result};
///
/// fn release(admin_id: &str) -> Result<()> {
///     Err(AssignmentError::unknown_admin(admin_id))
/// }
///
/// match release("ghost-admin") {
///     Err(AssignmentError::UnknownAdmin(id)) => println!("caller bug: {}", id),
///     other => println!("{:?}", other),
/// }
/// ```
#[derive(Error, Debug)]
pub enum AssignmentError {
    /// Database operation errors
    ///
    /// Connection failures, SQL errors, and transaction problems from the
    /// SQLite store. Transient cases are retried inside the coordinator and
    /// only surface here when a maintenance operation cannot complete.
    #[error("Database error: {0}")]
    Database(String),

    /// A caller referenced an administrator the engine has never been told
    /// about. This is a programmer error in the calling workflow, surfaced
    /// loudly instead of being silently swallowed.
    #[error("Unknown admin: {0}")]
    UnknownAdmin(String),

    /// Manual reassignment targeted an administrator who is marked
    /// unavailable and therefore cannot take a claim.
    #[error("Admin unavailable: {0}")]
    AdminUnavailable(String),

    /// An assignment for this appeal is already in flight; duplicate event
    /// deliveries must not double-claim.
    #[error("Already in progress: {0}")]
    AlreadyInProgress(String),

    /// Caller-provided input failed validation, e.g. an experience level
    /// outside the configured bounds.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration validation errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unexpected internal errors that indicate bugs rather than expected
    /// runtime conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AssignmentError {
    fn from(err: anyhow::Error) -> Self {
        // anyhow errors come from the database layer; anything that escapes
        // its retry envelope is unexpected.
        Self::Internal(err.to_string())
    }
}

impl AssignmentError {
    /// Create a new Database error with the provided message
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    /// Create a new UnknownAdmin error with the provided admin id
    pub fn unknown_admin<S: Into<String>>(admin_id: S) -> Self {
        Self::UnknownAdmin(admin_id.into())
    }

    /// Create a new AdminUnavailable error with the provided admin id
    pub fn admin_unavailable<S: Into<String>>(admin_id: S) -> Self {
        Self::AdminUnavailable(admin_id.into())
    }

    /// Create a new InvalidInput error with the provided message
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Configuration error with the provided message
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new Internal error with the provided message
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type for assignment engine operations
pub type Result<T> = std::result::Result<T, AssignmentError>;
