//! # Async Database Management Module (sqlx + SQLite)
//!
//! Durable backing for the two keyed stores the assignment engine owns: the
//! per-administrator workload table and the per-(administrator, category)
//! expertise table. Built on sqlx so every operation is naturally async and
//! Send-safe, with connection pooling and embedded migrations.
//!
//! The one primitive everything else leans on is the conditional single-row
//! `UPDATE` whose `rows_affected` tells the caller whether it won: claims are
//! compare-and-set increments, releases are decrement-if-positive. There are
//! no long-held locks and no ORM change-tracking session; two concurrent
//! assigners only ever contend on the row of the admin they both ranked first.
//!
//! ## Quick Start
//!
//! ```
//! use appealflow_assignment_engine::database::DatabaseManager;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let db = DatabaseManager::new_in_memory().await?;
//!
//! db.upsert_admin("admin-001").await?;
//! let claimed = db.try_claim("admin-001", 0).await?;
//! assert!(claimed);
//! # Ok(())
//! # }
//! ```

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::types::{
    AdminCategoryExpertise, AdminId, AdminWorkload, AppealCategory, AssignmentCandidate,
};

/// Main database manager using sqlx for async operations
#[derive(Clone)]
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// Create a new database manager with automatic migrations
    pub async fn new(database_url: &str) -> Result<Self> {
        info!("🗄️ Initializing assignment database: {}", database_url);
        use std::str::FromStr;

        let options = sqlx::sqlite::SqliteConnectOptions::from_str(database_url)?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| anyhow!("Failed to run migrations: {}", e))?;

        info!("✅ Assignment database initialized (WAL mode enabled)");
        Ok(Self { pool })
    }

    /// Create an in-memory database for testing
    pub async fn new_in_memory() -> Result<Self> {
        use std::str::FromStr;

        // A SQLite :memory: database exists per connection, so the pool must
        // hold exactly one connection for every user to see the same tables.
        let options = sqlx::sqlite::SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| anyhow!("Failed to open in-memory database: {}", e))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| anyhow!("Failed to run migrations: {}", e))?;

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Outcome of a workload decrement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The active count was decremented by one
    Released,

    /// The active count was already zero; nothing was decremented. This is
    /// an accounting inconsistency signal for the caller to log.
    Clamped,

    /// No workload row exists for the admin
    Missing,
}

/// Workload record from database
#[derive(Debug, Clone)]
pub struct DbAdminWorkload {
    pub admin_id: String,
    pub active_appeals: i64,
    pub total_appeals: i64,
    pub is_available: bool,
    pub last_activity_at: DateTime<Utc>,
}

impl DbAdminWorkload {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self> {
        Ok(DbAdminWorkload {
            admin_id: row.try_get("admin_id")?,
            active_appeals: row.try_get("active_appeals")?,
            total_appeals: row.try_get("total_appeals")?,
            is_available: row.try_get("is_available")?,
            last_activity_at: row.try_get("last_activity_at")?,
        })
    }

    /// Convert to the public model type
    pub fn to_workload(&self) -> AdminWorkload {
        AdminWorkload {
            admin_id: AdminId(self.admin_id.clone()),
            active_appeals: self.active_appeals.try_into().unwrap_or(0),
            total_appeals: self.total_appeals.try_into().unwrap_or(0),
            is_available: self.is_available,
            last_activity_at: self.last_activity_at,
        }
    }
}

/// Expertise record from database
#[derive(Debug, Clone)]
pub struct DbAdminExpertise {
    pub admin_id: String,
    pub category: String,
    pub experience_level: i64,
    pub successful_resolutions: i64,
    pub total_resolutions: i64,
}

impl DbAdminExpertise {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self> {
        Ok(DbAdminExpertise {
            admin_id: row.try_get("admin_id")?,
            category: row.try_get("category")?,
            experience_level: row.try_get("experience_level")?,
            successful_resolutions: row.try_get("successful_resolutions")?,
            total_resolutions: row.try_get("total_resolutions")?,
        })
    }

    /// Convert to the public model type; fails on an unknown category string
    pub fn to_expertise(&self) -> Result<AdminCategoryExpertise> {
        let category = self
            .category
            .parse::<AppealCategory>()
            .map_err(|e| anyhow!(e))?;
        Ok(AdminCategoryExpertise {
            admin_id: AdminId(self.admin_id.clone()),
            category,
            experience_level: self.experience_level.try_into().unwrap_or(0),
            successful_resolutions: self.successful_resolutions.try_into().unwrap_or(0),
            total_resolutions: self.total_resolutions.try_into().unwrap_or(0),
        })
    }
}

/// Joined row backing one assignment candidate
#[derive(Debug, Clone)]
pub struct DbCandidate {
    pub admin_id: String,
    pub active_appeals: i64,
    pub experience_level: i64,
    pub successful_resolutions: i64,
    pub total_resolutions: i64,
    pub last_activity_at: DateTime<Utc>,
}

impl DbCandidate {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self> {
        Ok(DbCandidate {
            admin_id: row.try_get("admin_id")?,
            active_appeals: row.try_get("active_appeals")?,
            experience_level: row.try_get("experience_level")?,
            successful_resolutions: row.try_get("successful_resolutions")?,
            total_resolutions: row.try_get("total_resolutions")?,
            last_activity_at: row.try_get("last_activity_at")?,
        })
    }

    /// Convert to the transient candidate tuple the policy ranks
    pub fn to_candidate(&self) -> AssignmentCandidate {
        let total = self.total_resolutions.max(1) as f64;
        AssignmentCandidate {
            admin_id: AdminId(self.admin_id.clone()),
            active_appeals: self.active_appeals.try_into().unwrap_or(0),
            experience_level: self.experience_level.try_into().unwrap_or(0),
            success_ratio: self.successful_resolutions as f64 / total,
            last_activity_at: self.last_activity_at,
        }
    }
}

/// Aggregate workload statistics
#[derive(Debug, Clone)]
pub struct WorkloadStats {
    pub total_admins: i64,
    pub available_admins: i64,
    pub active_appeals: i64,
    pub total_appeals: i64,
}

// Workload operations implementation
impl DatabaseManager {
    /// Create the workload row for a newly promoted administrator
    ///
    /// Idempotent: re-promoting an existing admin leaves their counters and
    /// availability untouched.
    pub async fn upsert_admin(&self, admin_id: &str) -> Result<()> {
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO admin_workloads (admin_id, active_appeals, total_appeals, is_available, last_activity_at)
             VALUES (?, 0, 0, 1, ?)
             ON CONFLICT(admin_id) DO NOTHING",
        )
        .bind(admin_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!("Admin {} workload row ensured", admin_id);
        Ok(())
    }

    /// Flip an admin's availability flag
    ///
    /// Returns `false` when no workload row exists for the admin. Rows are
    /// never deleted; deactivation is always a flag flip.
    pub async fn set_availability(&self, admin_id: &str, available: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE admin_workloads SET is_available = ? WHERE admin_id = ?")
            .bind(available)
            .bind(admin_id)
            .execute(&self.pool)
            .await?;

        let found = result.rows_affected() > 0;
        if found {
            info!(
                "🔄 Admin {} availability set to {}",
                admin_id,
                if available { "available" } else { "unavailable" }
            );
        }
        Ok(found)
    }

    /// Get a single admin's workload row
    pub async fn get_workload(&self, admin_id: &str) -> Result<Option<DbAdminWorkload>> {
        let row = sqlx::query(
            "SELECT admin_id, active_appeals, total_appeals, is_available, last_activity_at
             FROM admin_workloads WHERE admin_id = ?",
        )
        .bind(admin_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(DbAdminWorkload::from_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Get available admins, least recently active first
    pub async fn list_available_admins(&self) -> Result<Vec<DbAdminWorkload>> {
        let rows = sqlx::query(
            "SELECT admin_id, active_appeals, total_appeals, is_available, last_activity_at
             FROM admin_workloads
             WHERE is_available = 1
             ORDER BY last_activity_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut admins = Vec::new();
        for row in rows {
            admins.push(DbAdminWorkload::from_row(&row)?);
        }

        debug!("Found {} available admins", admins.len());
        Ok(admins)
    }

    /// Attempt the optimistic claim of an administrator
    ///
    /// Compare-and-set: the increment only lands if the admin is still
    /// available and their active count equals what the snapshot read.
    /// Returns `true` on success; `false` means a concurrent claim won the
    /// row or the admin went unavailable, and the caller should fall through
    /// to its next candidate.
    pub async fn try_claim(&self, admin_id: &str, expected_active: u32) -> Result<bool> {
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE admin_workloads
             SET active_appeals = active_appeals + 1,
                 total_appeals = total_appeals + 1,
                 last_activity_at = ?
             WHERE admin_id = ? AND is_available = 1 AND active_appeals = ?",
        )
        .bind(now)
        .bind(admin_id)
        .bind(expected_active as i64)
        .execute(&self.pool)
        .await?;

        let success = result.rows_affected() > 0;
        if success {
            debug!("Admin {} claimed (active was {})", admin_id, expected_active);
        } else {
            debug!("Claim lost for admin {} (expected active {})", admin_id, expected_active);
        }
        Ok(success)
    }

    /// Claim an explicitly chosen administrator, bypassing ranking
    ///
    /// Used for manual reassignment: availability is still enforced but the
    /// active count is not compared, and `total_appeals` is untouched since a
    /// reassignment is not a new lifetime assignment.
    pub async fn claim_direct(&self, admin_id: &str) -> Result<bool> {
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE admin_workloads
             SET active_appeals = active_appeals + 1,
                 last_activity_at = ?
             WHERE admin_id = ? AND is_available = 1",
        )
        .bind(now)
        .bind(admin_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Decrement an admin's active count, clamping at zero
    ///
    /// The decrement is conditional on `active_appeals > 0`; when it does not
    /// apply, the row's activity timestamp is still touched and the caller is
    /// told whether the count was clamped or the row is missing entirely.
    pub async fn release_one(&self, admin_id: &str) -> Result<ReleaseOutcome> {
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE admin_workloads
             SET active_appeals = active_appeals - 1,
                 last_activity_at = ?
             WHERE admin_id = ? AND active_appeals > 0",
        )
        .bind(now)
        .bind(admin_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(ReleaseOutcome::Released);
        }

        let touched = sqlx::query(
            "UPDATE admin_workloads SET last_activity_at = ? WHERE admin_id = ?",
        )
        .bind(now)
        .bind(admin_id)
        .execute(&self.pool)
        .await?;

        if touched.rows_affected() > 0 {
            Ok(ReleaseOutcome::Clamped)
        } else {
            Ok(ReleaseOutcome::Missing)
        }
    }
}

// Expertise operations implementation
impl DatabaseManager {
    /// Ensure an expertise row exists for (admin, category)
    ///
    /// Called on first assignment of an admin to a category; zero counters,
    /// baseline level. Existing rows are left alone.
    pub async fn ensure_expertise_row(
        &self,
        admin_id: &str,
        category: AppealCategory,
        baseline_level: u8,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO admin_expertise (admin_id, category, experience_level, successful_resolutions, total_resolutions)
             VALUES (?, ?, ?, 0, 0)
             ON CONFLICT(admin_id, category) DO NOTHING",
        )
        .bind(admin_id)
        .bind(category.as_str())
        .bind(baseline_level as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Record a resolution against an expertise row
    ///
    /// Creates the row lazily if the admin resolved an appeal in a category
    /// they were never formally assigned in (manual reassignments make this
    /// possible).
    pub async fn record_resolution(
        &self,
        admin_id: &str,
        category: AppealCategory,
        successful: bool,
        baseline_level: u8,
    ) -> Result<()> {
        let success_increment: i64 = if successful { 1 } else { 0 };

        sqlx::query(
            "INSERT INTO admin_expertise (admin_id, category, experience_level, successful_resolutions, total_resolutions)
             VALUES (?, ?, ?, ?, 1)
             ON CONFLICT(admin_id, category) DO UPDATE SET
                successful_resolutions = successful_resolutions + excluded.successful_resolutions,
                total_resolutions = total_resolutions + 1",
        )
        .bind(admin_id)
        .bind(category.as_str())
        .bind(baseline_level as i64)
        .bind(success_increment)
        .execute(&self.pool)
        .await?;

        debug!(
            "Resolution recorded for admin {} in {} (successful: {})",
            admin_id, category, successful
        );
        Ok(())
    }

    /// Get a single expertise row
    pub async fn get_expertise(
        &self,
        admin_id: &str,
        category: AppealCategory,
    ) -> Result<Option<DbAdminExpertise>> {
        let row = sqlx::query(
            "SELECT admin_id, category, experience_level, successful_resolutions, total_resolutions
             FROM admin_expertise WHERE admin_id = ? AND category = ?",
        )
        .bind(admin_id)
        .bind(category.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(DbAdminExpertise::from_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Set an expertise level manually
    ///
    /// Returns `false` when no expertise row exists yet; callers create one
    /// first via [`ensure_expertise_row`](Self::ensure_expertise_row).
    pub async fn set_experience_level(
        &self,
        admin_id: &str,
        category: AppealCategory,
        level: u8,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE admin_expertise SET experience_level = ? WHERE admin_id = ? AND category = ?",
        )
        .bind(level as i64)
        .bind(admin_id)
        .bind(category.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

// Snapshot and statistics implementation
impl DatabaseManager {
    /// Read the candidate snapshot for one assignment decision
    ///
    /// Available admins joined with their expertise in the requested
    /// category; admins with no expertise row appear with level 0 and zero
    /// counters. Each `assign` invocation re-reads this fresh — no snapshot
    /// is cached across calls.
    pub async fn candidate_snapshot(&self, category: AppealCategory) -> Result<Vec<DbCandidate>> {
        let rows = sqlx::query(
            "SELECT w.admin_id,
                    w.active_appeals,
                    w.last_activity_at,
                    COALESCE(e.experience_level, 0) AS experience_level,
                    COALESCE(e.successful_resolutions, 0) AS successful_resolutions,
                    COALESCE(e.total_resolutions, 0) AS total_resolutions
             FROM admin_workloads w
             LEFT JOIN admin_expertise e
               ON e.admin_id = w.admin_id AND e.category = ?
             WHERE w.is_available = 1",
        )
        .bind(category.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut candidates = Vec::new();
        for row in rows {
            candidates.push(DbCandidate::from_row(&row)?);
        }

        debug!("Snapshot for {}: {} candidates", category, candidates.len());
        Ok(candidates)
    }

    /// Get aggregate workload statistics
    pub async fn get_workload_stats(&self) -> Result<WorkloadStats> {
        let row = sqlx::query(
            "SELECT
                COUNT(*) as total_admins,
                SUM(CASE WHEN is_available = 1 THEN 1 ELSE 0 END) as available_admins,
                SUM(active_appeals) as active_appeals,
                SUM(total_appeals) as total_appeals
             FROM admin_workloads",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(WorkloadStats {
            total_admins: row.try_get("total_admins")?,
            available_admins: row.try_get("available_admins").unwrap_or(0),
            active_appeals: row.try_get("active_appeals").unwrap_or(0),
            total_appeals: row.try_get("total_appeals").unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn claim_requires_existing_row() {
        let db = DatabaseManager::new_in_memory().await.unwrap();

        let claimed = db.try_claim("admin-missing", 0).await.unwrap();
        assert!(!claimed);
    }

    #[tokio::test]
    async fn claim_is_compare_and_set() {
        let db = DatabaseManager::new_in_memory().await.unwrap();
        db.upsert_admin("admin-001").await.unwrap();

        // Stale expectation loses
        assert!(!db.try_claim("admin-001", 3).await.unwrap());
        // Fresh expectation wins exactly once
        assert!(db.try_claim("admin-001", 0).await.unwrap());
        assert!(!db.try_claim("admin-001", 0).await.unwrap());

        let workload = db.get_workload("admin-001").await.unwrap().unwrap();
        assert_eq!(workload.active_appeals, 1);
        assert_eq!(workload.total_appeals, 1);
    }

    #[tokio::test]
    async fn release_clamps_at_zero() {
        let db = DatabaseManager::new_in_memory().await.unwrap();
        db.upsert_admin("admin-001").await.unwrap();

        assert_eq!(db.release_one("admin-001").await.unwrap(), ReleaseOutcome::Clamped);
        assert_eq!(db.release_one("admin-ghost").await.unwrap(), ReleaseOutcome::Missing);

        assert!(db.try_claim("admin-001", 0).await.unwrap());
        assert_eq!(db.release_one("admin-001").await.unwrap(), ReleaseOutcome::Released);

        let workload = db.get_workload("admin-001").await.unwrap().unwrap();
        assert_eq!(workload.active_appeals, 0);
        // Lifetime count survives the release
        assert_eq!(workload.total_appeals, 1);
    }

    #[tokio::test]
    async fn snapshot_includes_admins_without_expertise() {
        let db = DatabaseManager::new_in_memory().await.unwrap();
        db.upsert_admin("admin-novice").await.unwrap();
        db.upsert_admin("admin-expert").await.unwrap();
        db.ensure_expertise_row("admin-expert", AppealCategory::Housing, 3)
            .await
            .unwrap();

        let snapshot = db.candidate_snapshot(AppealCategory::Housing).await.unwrap();
        assert_eq!(snapshot.len(), 2);

        let novice = snapshot.iter().find(|c| c.admin_id == "admin-novice").unwrap();
        assert_eq!(novice.experience_level, 0);
        let expert = snapshot.iter().find(|c| c.admin_id == "admin-expert").unwrap();
        assert_eq!(expert.experience_level, 3);
    }
}
