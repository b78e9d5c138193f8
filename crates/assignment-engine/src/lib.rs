//! # Appeal Assignment Engine
//!
//! Automatic routing of student appeals to administrator accounts, balancing
//! category expertise against current workload. The engine owns two durable
//! keyed stores (per-admin workload, per-(admin, category) expertise), a pure
//! ranking policy, and an optimistic claim protocol that keeps concurrent
//! assignment decisions correct without global locks.
//!
//! ## Architecture
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │    AssignmentEngine     │
//!                    │  (facade + lifecycle)   │
//!                    └─────┬──────────────┬────┘
//!                          │              │
//!              ┌───────────▼───┐   ┌──────▼─────────────┐
//!              │ Assignment    │   │ Workload           │
//!              │ Coordinator   │   │ Maintainer         │
//!              │ (snapshot,    │   │ (close, unassign,  │
//!              │  rank, claim) │   │  manual reassign)  │
//!              └───────┬───────┘   └──────┬─────────────┘
//!                      │                  │
//!            ┌─────────▼─────┐            │
//!            │ Assignment    │            │
//!            │ Policy (pure) │            │
//!            └─────────┬─────┘            │
//!                      │                  │
//!              ┌───────▼──────────────────▼───────┐
//!              │        DatabaseManager           │
//!              │  (sqlx/SQLite, CAS increments)   │
//!              └──────────────────────────────────┘
//! ```
//!
//! ## Assignment flow
//!
//! 1. An appeal is created (or reopened) and [`AssignmentEngine::assign_appeal`]
//!    is called with its id and category.
//! 2. The coordinator reads a fresh candidate snapshot of available admins
//!    joined with their expertise in that category.
//! 3. The policy ranks the snapshot lexicographically: experience level, then
//!    current load, then success ratio, then longest idle, then admin id.
//! 4. The coordinator walks the ranked list attempting a compare-and-set
//!    claim; the first claim that lands wins, lost races fall through to the
//!    next candidate.
//! 5. Exhaustion or store degradation yields
//!    [`AssignmentResult::NoCandidateAvailable`] — a business outcome, never
//!    an error, so ticket intake never fails on assignment problems.
//!
//! ## Quick Start
//!
//! ```
//! use appealflow_assignment_engine::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let engine = AssignmentEngine::new(EngineConfig::default(), Some(":memory:".to_string())).await?;
//!
//! engine.promote_admin(&AdminId::from("admin-001")).await?;
//! engine
//!     .set_experience_level(&AdminId::from("admin-001"), AppealCategory::Academic, 3)
//!     .await?;
//!
//! match engine
//!     .assign_appeal(&AppealId::from("appeal-1"), AppealCategory::Academic)
//!     .await?
//! {
//!     AssignmentResult::Assigned(admin) => println!("assigned to {}", admin),
//!     AssignmentResult::NoCandidateAvailable => println!("left unassigned"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coordinator;
pub mod database;
pub mod engine;
pub mod error;
pub mod maintainer;
pub mod policy;
pub mod types;

pub use config::{AssignmentConfig, DatabaseConfig, EngineConfig};
pub use coordinator::AssignmentCoordinator;
pub use database::DatabaseManager;
pub use engine::{AppealLifecycleHandler, AssignmentEngine, EngineStats};
pub use error::{AssignmentError, Result};
pub use maintainer::WorkloadMaintainer;
pub use policy::AssignmentPolicy;
pub use types::{
    AdminCategoryExpertise, AdminId, AdminWorkload, AppealCategory, AppealEvent, AppealId,
    AssignmentCandidate, AssignmentResult, ResolutionOutcome,
};

/// Commonly used types for working with the assignment engine
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::engine::{AppealLifecycleHandler, AssignmentEngine};
    pub use crate::error::{AssignmentError, Result};
    pub use crate::types::{
        AdminId, AppealCategory, AppealEvent, AppealId, AssignmentResult, ResolutionOutcome,
    };
}
