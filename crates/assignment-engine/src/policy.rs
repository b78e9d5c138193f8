//! # Assignment Policy
//!
//! Pure candidate ranking for appeal assignment. Given an appeal's category
//! and the snapshot of available administrators, [`AssignmentPolicy::rank`]
//! produces a deterministic total order over the candidates; the coordinator
//! walks that order attempting claims.
//!
//! The ranking is a lexicographic tie-break chain rather than a single scalar
//! score:
//!
//! 1. Higher `experience_level` in the requested category (admins with no
//!    expertise row rank as level 0)
//! 2. Lower `active_appeals` — prefer the least-busy admin
//! 3. Higher success ratio
//! 4. Older `last_activity_at` — rotate work toward the longest-idle admin
//! 5. Lowest `admin_id` — total determinism for reproducible behavior
//!
//! Each tier can be exercised in isolation, and there is no numeric weighting
//! formula to tune or regress. An empty candidate list is valid input and
//! yields an empty ranking, never an error.

use std::cmp::Ordering;

use tracing::debug;

use crate::types::{AppealCategory, AssignmentCandidate};

/// Pure, stateless ranking policy
///
/// Thread-safe by construction: no shared mutable state, no I/O. The same
/// snapshot always ranks the same way.
#[derive(Debug, Clone, Default)]
pub struct AssignmentPolicy;

impl AssignmentPolicy {
    /// Create a new assignment policy
    pub fn new() -> Self {
        Self
    }

    /// Rank candidates for an appeal in the given category
    ///
    /// Returns the full ordered list, best candidate first, so the caller can
    /// fall through to the next candidate when a claim is lost.
    pub fn rank(
        &self,
        category: AppealCategory,
        mut candidates: Vec<AssignmentCandidate>,
    ) -> Vec<AssignmentCandidate> {
        candidates.sort_by(compare_candidates);

        if let Some(best) = candidates.first() {
            debug!(
                "Ranked {} candidates for {}; best is {} (level {}, active {})",
                candidates.len(),
                category,
                best.admin_id,
                best.experience_level,
                best.active_appeals
            );
        }

        candidates
    }
}

fn compare_candidates(a: &AssignmentCandidate, b: &AssignmentCandidate) -> Ordering {
    b.experience_level
        .cmp(&a.experience_level)
        .then_with(|| a.active_appeals.cmp(&b.active_appeals))
        .then_with(|| b.success_ratio.total_cmp(&a.success_ratio))
        .then_with(|| a.last_activity_at.cmp(&b.last_activity_at))
        .then_with(|| a.admin_id.cmp(&b.admin_id))
}
