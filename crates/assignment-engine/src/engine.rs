//! # Assignment Engine
//!
//! The facade the rest of the appeal backend talks to. Wires configuration,
//! the SQLite-backed stores, the [`AssignmentCoordinator`] and the
//! [`WorkloadMaintainer`] together, dispatches appeal lifecycle events, takes
//! administrator-directory updates, and serves read-only workload snapshots
//! for dashboards.
//!
//! ## Quick Start
//!
//! ```
//! use appealflow_assignment_engine::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let config = EngineConfig::default();
//! let engine = AssignmentEngine::new(config, Some(":memory:".to_string())).await?;
//!
//! engine.promote_admin(&AdminId::from("admin-001")).await?;
//!
//! let result = engine
//!     .assign_appeal(&AppealId::from("appeal-42"), AppealCategory::Financial)
//!     .await?;
//! assert_eq!(result, AssignmentResult::Assigned(AdminId::from("admin-001")));
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashSet;
use tracing::info;

use crate::config::EngineConfig;
use crate::coordinator::AssignmentCoordinator;
use crate::database::DatabaseManager;
use crate::error::{AssignmentError, Result};
use crate::maintainer::WorkloadMaintainer;
use crate::types::{
    AdminCategoryExpertise, AdminId, AdminWorkload, AppealCategory, AppealEvent, AppealId,
    AssignmentResult, ResolutionOutcome,
};

/// Narrow contract the ticket workflow calls through
///
/// The engine implements this; callers can hold a `dyn AppealLifecycleHandler`
/// and stay decoupled from the engine's construction.
#[async_trait]
pub trait AppealLifecycleHandler: Send + Sync {
    /// A new or reopened appeal needs an owner
    async fn on_appeal_created(
        &self,
        appeal_id: &AppealId,
        category: AppealCategory,
    ) -> Result<AssignmentResult>;

    /// An assigned appeal was closed
    async fn on_appeal_closed(
        &self,
        admin_id: &AdminId,
        category: AppealCategory,
        outcome: ResolutionOutcome,
    ) -> Result<()>;

    /// An assigned appeal returned to the unassigned pool
    async fn on_appeal_unassigned(&self, admin_id: &AdminId) -> Result<()>;

    /// A human moved an appeal between administrators
    async fn on_appeal_reassigned(&self, from_admin: &AdminId, to_admin: &AdminId) -> Result<()>;
}

/// Aggregate engine statistics for dashboards
#[derive(Debug, Clone)]
pub struct EngineStats {
    /// Number of administrators with a workload row
    pub total_admins: u64,

    /// Number currently marked available
    pub available_admins: u64,

    /// Open appeals across all administrators
    pub active_appeals: u64,

    /// Lifetime assignments across all administrators
    pub total_appeals: u64,
}

/// Central assignment engine
pub struct AssignmentEngine {
    config: EngineConfig,
    db: DatabaseManager,
    coordinator: AssignmentCoordinator,
    maintainer: WorkloadMaintainer,

    /// Appeals with an assignment currently in flight; duplicate deliveries
    /// of the same creation event must not double-claim.
    in_flight: DashSet<AppealId>,
}

/// Removes the in-flight marker even if the assign future is dropped
struct InFlightGuard<'a> {
    set: &'a DashSet<AppealId>,
    appeal_id: AppealId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.appeal_id);
    }
}

impl AssignmentEngine {
    /// Create the engine
    ///
    /// `db_url` overrides the configured database URL; pass
    /// `Some(":memory:")` for an in-memory database in tests.
    pub async fn new(config: EngineConfig, db_url: Option<String>) -> Result<Arc<Self>> {
        config.validate()?;

        let url = db_url.unwrap_or_else(|| config.database.url.clone());
        let db = if url == ":memory:" || url == "sqlite::memory:" {
            DatabaseManager::new_in_memory().await
        } else {
            DatabaseManager::new(&url).await
        }
        .map_err(|e| AssignmentError::database(format!("Failed to open database: {}", e)))?;

        let coordinator = AssignmentCoordinator::new(db.clone(), config.assignment.clone());
        let maintainer = WorkloadMaintainer::new(db.clone(), config.assignment.clone());

        info!("🚀 Assignment engine ready");
        Ok(Arc::new(Self {
            config,
            db,
            coordinator,
            maintainer,
            in_flight: DashSet::new(),
        }))
    }

    /// Get the engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get the underlying database manager
    pub fn database_manager(&self) -> &DatabaseManager {
        &self.db
    }

    /// Assign an appeal to an administrator
    ///
    /// Guarded per appeal id: a second call while the first is still in
    /// flight returns [`AssignmentError::AlreadyInProgress`] instead of
    /// racing it.
    pub async fn assign_appeal(
        &self,
        appeal_id: &AppealId,
        category: AppealCategory,
    ) -> Result<AssignmentResult> {
        if !self.in_flight.insert(appeal_id.clone()) {
            return Err(AssignmentError::AlreadyInProgress(format!(
                "assignment already in flight for appeal {}",
                appeal_id
            )));
        }
        let _guard = InFlightGuard {
            set: &self.in_flight,
            appeal_id: appeal_id.clone(),
        };

        self.coordinator.assign(appeal_id, category).await
    }

    /// Dispatch one appeal lifecycle event
    ///
    /// Returns the assignment result for `Created` events, `None` for the
    /// bookkeeping events.
    pub async fn handle_event(&self, event: AppealEvent) -> Result<Option<AssignmentResult>> {
        match event {
            AppealEvent::Created {
                appeal_id,
                category,
            } => {
                let result = self.assign_appeal(&appeal_id, category).await?;
                Ok(Some(result))
            }
            AppealEvent::Closed {
                admin_id,
                category,
                outcome,
                ..
            } => {
                self.maintainer.on_closed(&admin_id, category, outcome).await?;
                Ok(None)
            }
            AppealEvent::Unassigned { admin_id, .. } => {
                self.maintainer.on_unassigned(&admin_id).await?;
                Ok(None)
            }
            AppealEvent::ManuallyReassigned {
                from_admin_id,
                to_admin_id,
                ..
            } => {
                self.maintainer
                    .on_manual_reassign(&from_admin_id, &to_admin_id)
                    .await?;
                Ok(None)
            }
        }
    }

    /// Access to the workload maintainer for direct lifecycle calls
    pub fn maintainer(&self) -> &WorkloadMaintainer {
        &self.maintainer
    }
}

// Administrator directory intake
impl AssignmentEngine {
    /// An account was promoted to the administrator role
    ///
    /// Creates the workload row with defaults (zero counters, available).
    /// Idempotent for already-known admins.
    pub async fn promote_admin(&self, admin_id: &AdminId) -> Result<()> {
        self.db
            .upsert_admin(admin_id.as_ref())
            .await
            .map_err(|e| AssignmentError::database(format!("Failed to create workload row: {}", e)))?;
        info!("👤 Admin {} registered with the assignment engine", admin_id);
        Ok(())
    }

    /// Flip an administrator's availability
    ///
    /// Unavailable admins are never selected as candidates; their row and
    /// history are kept.
    pub async fn set_admin_availability(&self, admin_id: &AdminId, available: bool) -> Result<()> {
        let found = self
            .db
            .set_availability(admin_id.as_ref(), available)
            .await
            .map_err(|e| AssignmentError::database(format!("Failed to set availability: {}", e)))?;

        if !found {
            return Err(AssignmentError::unknown_admin(admin_id.as_ref()));
        }
        Ok(())
    }

    /// Manually adjust an admin's experience level for a category
    ///
    /// Creates the expertise row lazily when absent. The level must sit in
    /// `1..=max_experience_level`.
    pub async fn set_experience_level(
        &self,
        admin_id: &AdminId,
        category: AppealCategory,
        level: u8,
    ) -> Result<()> {
        let max = self.config.assignment.max_experience_level;
        if level == 0 || level > max {
            return Err(AssignmentError::invalid_input(format!(
                "experience level {} outside 1..={}",
                level, max
            )));
        }

        if self.db.get_workload(admin_id.as_ref()).await?.is_none() {
            return Err(AssignmentError::unknown_admin(admin_id.as_ref()));
        }

        self.db
            .ensure_expertise_row(admin_id.as_ref(), category, level)
            .await?;
        self.db
            .set_experience_level(admin_id.as_ref(), category, level)
            .await?;
        Ok(())
    }
}

// Read-only queries for dashboards
impl AssignmentEngine {
    /// Get one admin's current workload
    pub async fn workload_snapshot(&self, admin_id: &AdminId) -> Result<AdminWorkload> {
        let row = self
            .db
            .get_workload(admin_id.as_ref())
            .await
            .map_err(|e| AssignmentError::database(format!("Failed workload lookup: {}", e)))?;

        match row {
            Some(row) => Ok(row.to_workload()),
            None => Err(AssignmentError::unknown_admin(admin_id.as_ref())),
        }
    }

    /// Get all available admins, least recently active first
    pub async fn available_admins(&self) -> Result<Vec<AdminWorkload>> {
        let rows = self
            .db
            .list_available_admins()
            .await
            .map_err(|e| AssignmentError::database(format!("Failed admin listing: {}", e)))?;
        Ok(rows.iter().map(|row| row.to_workload()).collect())
    }

    /// Get one admin's expertise record for a category, if any
    pub async fn expertise(
        &self,
        admin_id: &AdminId,
        category: AppealCategory,
    ) -> Result<Option<AdminCategoryExpertise>> {
        let row = self
            .db
            .get_expertise(admin_id.as_ref(), category)
            .await
            .map_err(|e| AssignmentError::database(format!("Failed expertise lookup: {}", e)))?;

        match row {
            Some(row) => Ok(Some(row.to_expertise()?)),
            None => Ok(None),
        }
    }

    /// Get aggregate statistics
    pub async fn stats(&self) -> Result<EngineStats> {
        let stats = self
            .db
            .get_workload_stats()
            .await
            .map_err(|e| AssignmentError::database(format!("Failed stats query: {}", e)))?;

        Ok(EngineStats {
            total_admins: stats.total_admins.try_into().unwrap_or(0),
            available_admins: stats.available_admins.try_into().unwrap_or(0),
            active_appeals: stats.active_appeals.try_into().unwrap_or(0),
            total_appeals: stats.total_appeals.try_into().unwrap_or(0),
        })
    }
}

#[async_trait]
impl AppealLifecycleHandler for AssignmentEngine {
    async fn on_appeal_created(
        &self,
        appeal_id: &AppealId,
        category: AppealCategory,
    ) -> Result<AssignmentResult> {
        self.assign_appeal(appeal_id, category).await
    }

    async fn on_appeal_closed(
        &self,
        admin_id: &AdminId,
        category: AppealCategory,
        outcome: ResolutionOutcome,
    ) -> Result<()> {
        self.maintainer.on_closed(admin_id, category, outcome).await
    }

    async fn on_appeal_unassigned(&self, admin_id: &AdminId) -> Result<()> {
        self.maintainer.on_unassigned(admin_id).await
    }

    async fn on_appeal_reassigned(&self, from_admin: &AdminId, to_admin: &AdminId) -> Result<()> {
        self.maintainer.on_manual_reassign(from_admin, to_admin).await
    }
}
