//! # Assignment Coordinator
//!
//! Turns the pure ranking of [`AssignmentPolicy`] into a safe, concurrency
//! correct side-effecting operation. Each [`assign`](AssignmentCoordinator::assign)
//! call reads a fresh candidate snapshot, ranks it, and walks the ranked list
//! attempting an optimistic per-admin claim (a compare-and-set increment in
//! the workload store). Losing a claim race simply moves to the next ranked
//! candidate, so retries are bounded by the list length and unrelated admins
//! never serialize behind a shared lock.
//!
//! Failure semantics follow the store-degradation policy: transient store
//! errors are retried a small fixed number of times against the same
//! candidate, a timed-out attempt counts as a lost claim, and full exhaustion
//! collapses to [`AssignmentResult::NoCandidateAvailable`] rather than
//! surfacing a storage error to ticket intake.

use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::AssignmentConfig;
use crate::database::DatabaseManager;
use crate::error::Result;
use crate::policy::AssignmentPolicy;
use crate::types::{AppealCategory, AppealId, AssignmentCandidate, AssignmentResult};

/// Outcome of the claim attempts against a single candidate
enum ClaimOutcome {
    /// The compare-and-set landed; the admin now owns the appeal
    Claimed,

    /// Lost the race (or timed out); fall through to the next candidate
    Lost,
}

/// Coordinates assignment decisions against the workload store
#[derive(Clone)]
pub struct AssignmentCoordinator {
    db: DatabaseManager,
    policy: AssignmentPolicy,
    config: AssignmentConfig,
}

impl AssignmentCoordinator {
    /// Create a coordinator over the given store
    pub fn new(db: DatabaseManager, config: AssignmentConfig) -> Self {
        Self {
            db,
            policy: AssignmentPolicy::new(),
            config,
        }
    }

    /// Decide which administrator owns a new or reopened appeal
    ///
    /// Never fails on store degradation: every degraded path returns
    /// `NoCandidateAvailable`, leaving the appeal in the unassigned pool —
    /// a valid business state — instead of failing ticket creation. Exactly
    /// one workload row is mutated on success; none on `NoCandidateAvailable`.
    ///
    /// Cancellation-safe: the claim is a single atomic statement, so dropping
    /// this future never leaves a partial claim behind.
    pub async fn assign(
        &self,
        appeal_id: &AppealId,
        category: AppealCategory,
    ) -> Result<AssignmentResult> {
        let candidates = match self.read_snapshot(category).await {
            Some(candidates) => candidates,
            None => {
                warn!(
                    "⚠️ Snapshot read degraded for appeal {}; leaving unassigned",
                    appeal_id
                );
                return Ok(AssignmentResult::NoCandidateAvailable);
            }
        };

        if candidates.is_empty() {
            info!("📭 No available admins for appeal {} ({})", appeal_id, category);
            return Ok(AssignmentResult::NoCandidateAvailable);
        }

        let ranked = self.policy.rank(category, candidates);

        for candidate in ranked {
            match self.try_claim_candidate(&candidate).await {
                ClaimOutcome::Claimed => {
                    // Lazily create the expertise row on first assignment in
                    // this category; failure here must not undo the claim.
                    if let Err(e) = self
                        .db
                        .ensure_expertise_row(
                            candidate.admin_id.as_ref(),
                            category,
                            self.config.baseline_experience_level,
                        )
                        .await
                    {
                        warn!(
                            "Failed to ensure expertise row for {} in {}: {}",
                            candidate.admin_id, category, e
                        );
                    }

                    info!(
                        "✅ Appeal {} ({}) assigned to admin {}",
                        appeal_id, category, candidate.admin_id
                    );
                    return Ok(AssignmentResult::Assigned(candidate.admin_id));
                }
                ClaimOutcome::Lost => continue,
            }
        }

        info!(
            "📭 Claim walk exhausted for appeal {} ({}); leaving unassigned",
            appeal_id, category
        );
        Ok(AssignmentResult::NoCandidateAvailable)
    }

    /// Read the candidate snapshot, retrying transient failures
    ///
    /// `None` means the store stayed degraded through every retry.
    async fn read_snapshot(&self, category: AppealCategory) -> Option<Vec<AssignmentCandidate>> {
        let attempts = self.config.max_snapshot_retries.saturating_add(1);
        for attempt in 1..=attempts {
            match self.db.candidate_snapshot(category).await {
                Ok(rows) => {
                    return Some(rows.iter().map(|row| row.to_candidate()).collect());
                }
                Err(e) => {
                    warn!(
                        "Snapshot read failed (attempt {}/{}): {}",
                        attempt, attempts, e
                    );
                }
            }
        }
        None
    }

    /// Attempt to claim one candidate, with bounded retries on transient
    /// store errors and a per-attempt timeout
    ///
    /// The compare-and-set uses the active count the snapshot observed; a
    /// mismatch means a concurrent assignment won the row, which is not
    /// retried — the next ranked candidate is the correct fallback.
    async fn try_claim_candidate(&self, candidate: &AssignmentCandidate) -> ClaimOutcome {
        let claim_timeout = Duration::from_millis(self.config.claim_timeout_ms);
        let attempts = self.config.max_claim_retries.saturating_add(1);

        for attempt in 1..=attempts {
            let claim = self
                .db
                .try_claim(candidate.admin_id.as_ref(), candidate.active_appeals);

            match timeout(claim_timeout, claim).await {
                Ok(Ok(true)) => return ClaimOutcome::Claimed,
                Ok(Ok(false)) => {
                    debug!(
                        "Lost claim race for admin {}; moving to next candidate",
                        candidate.admin_id
                    );
                    return ClaimOutcome::Lost;
                }
                Ok(Err(e)) => {
                    warn!(
                        "Transient claim failure for admin {} (attempt {}/{}): {}",
                        candidate.admin_id, attempt, attempts, e
                    );
                }
                Err(_) => {
                    warn!(
                        "Claim attempt for admin {} timed out after {:?}; treating as lost",
                        candidate.admin_id, claim_timeout
                    );
                    return ClaimOutcome::Lost;
                }
            }
        }

        debug!(
            "Claim retries exhausted for admin {}; moving to next candidate",
            candidate.admin_id
        );
        ClaimOutcome::Lost
    }
}
