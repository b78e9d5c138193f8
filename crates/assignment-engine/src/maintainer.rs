//! # Workload Maintainer
//!
//! Keeps the workload and expertise stores consistent with appeal lifecycle
//! events that happen after assignment: closure, unassignment, and manual
//! reassignment. The accounting invariant this module protects is symmetry —
//! no decrement without a prior increment. When the store disagrees (a
//! decrement that would go negative), the counter is clamped at zero and the
//! inconsistency is logged loudly instead of failing the caller.

use tracing::{error, info};

use crate::config::AssignmentConfig;
use crate::database::{DatabaseManager, ReleaseOutcome};
use crate::error::{AssignmentError, Result};
use crate::types::{AdminId, AppealCategory, ResolutionOutcome};

/// Reacts to post-assignment lifecycle events
#[derive(Clone)]
pub struct WorkloadMaintainer {
    db: DatabaseManager,
    config: AssignmentConfig,
}

impl WorkloadMaintainer {
    /// Create a maintainer over the given store
    pub fn new(db: DatabaseManager, config: AssignmentConfig) -> Self {
        Self { db, config }
    }

    /// An appeal assigned to `admin_id` was closed
    ///
    /// Decrements the admin's active count (clamped at zero), records the
    /// resolution against their expertise row for the appeal's category, and
    /// touches their activity timestamp.
    pub async fn on_closed(
        &self,
        admin_id: &AdminId,
        category: AppealCategory,
        outcome: ResolutionOutcome,
    ) -> Result<()> {
        self.release(admin_id, "close").await?;

        self.db
            .record_resolution(
                admin_id.as_ref(),
                category,
                outcome.is_successful(),
                self.config.baseline_experience_level,
            )
            .await
            .map_err(|e| AssignmentError::database(format!("Failed to record resolution: {}", e)))?;

        info!(
            "📁 Appeal closed by admin {} in {} (successful: {})",
            admin_id,
            category,
            outcome.is_successful()
        );
        Ok(())
    }

    /// An appeal was returned to the unassigned pool
    ///
    /// Workload only; nothing was resolved, so expertise is untouched.
    pub async fn on_unassigned(&self, admin_id: &AdminId) -> Result<()> {
        self.release(admin_id, "unassign").await?;
        info!("↩️ Appeal unassigned from admin {}", admin_id);
        Ok(())
    }

    /// A human moved an appeal from one admin to another
    ///
    /// Unassigns the source, then claims the explicitly chosen destination
    /// directly (no ranking, availability still enforced, no lifetime-count
    /// bump — a reassignment is not a new assignment). If the destination
    /// cannot take the claim the appeal is left in the unassigned pool and a
    /// typed error tells the caller why.
    pub async fn on_manual_reassign(&self, from_admin: &AdminId, to_admin: &AdminId) -> Result<()> {
        self.release(from_admin, "reassign").await?;

        let claimed = self
            .db
            .claim_direct(to_admin.as_ref())
            .await
            .map_err(|e| AssignmentError::database(format!("Failed direct claim: {}", e)))?;

        if !claimed {
            let exists = self
                .db
                .get_workload(to_admin.as_ref())
                .await
                .map_err(|e| AssignmentError::database(format!("Failed workload lookup: {}", e)))?
                .is_some();

            return if exists {
                Err(AssignmentError::admin_unavailable(to_admin.as_ref()))
            } else {
                Err(AssignmentError::unknown_admin(to_admin.as_ref()))
            };
        }

        info!("🔁 Appeal reassigned from admin {} to admin {}", from_admin, to_admin);
        Ok(())
    }

    /// Decrement one active appeal, clamping at zero
    ///
    /// A clamped decrement indicates a bookkeeping bug elsewhere; it is
    /// logged as a data-integrity signal and processing continues. A missing
    /// row is a caller bug and fails fast.
    async fn release(&self, admin_id: &AdminId, operation: &str) -> Result<()> {
        let outcome = self
            .db
            .release_one(admin_id.as_ref())
            .await
            .map_err(|e| AssignmentError::database(format!("Failed to release workload: {}", e)))?;

        match outcome {
            ReleaseOutcome::Released => Ok(()),
            ReleaseOutcome::Clamped => {
                error!(
                    "🚨 Accounting inconsistency: {} for admin {} would make active count negative; clamped at 0",
                    operation, admin_id
                );
                Ok(())
            }
            ReleaseOutcome::Missing => Err(AssignmentError::unknown_admin(admin_id.as_ref())),
        }
    }
}
