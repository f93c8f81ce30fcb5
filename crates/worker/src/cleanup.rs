//! Daily retention cleanup.
//!
//! Deletes consumed or expired verification sessions and audit entries
//! older than the configured retention window. Cleanup failures are
//! logged and never block reconciliation cycles.

use std::sync::Arc;

use db::{
    audit_entry, verify_session, sea_query::Condition, ColumnTrait, DbErr, Duration, EntityTrait,
    QueryFilter,
};
use tracing::{error, info};

use crate::Worker;

const CLEANUP_PERIOD: std::time::Duration = std::time::Duration::from_secs(24 * 60 * 60);

/// Spawn the daily cleanup loop.
pub(crate) fn spawn(worker: Arc<Worker>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CLEANUP_PERIOD);

        // The first tick fires immediately, which doubles as a
        // startup cleanup of whatever the previous run left behind.
        loop {
            ticker.tick().await;

            if let Err(error) = worker.run_cleanup().await {
                error!(%error, "retention cleanup failed");
            }
        }
    });
}

impl Worker {
    /// Delete rows past their useful life.
    pub(crate) async fn run_cleanup(&self) -> Result<(), DbErr> {
        let now = db::now();

        let spent = Condition::any()
            .add(verify_session::Column::ExpiresAt.lt(now))
            .add(verify_session::Column::UsedAt.is_not_null());

        let sessions = verify_session::Entity::delete_many()
            .filter(spent)
            .exec(&self.db)
            .await?
            .rows_affected;

        let retention_edge = now - Duration::days(i64::from(self.audit_retention_days));

        let entries = audit_entry::Entity::delete_many()
            .filter(audit_entry::Column::CreatedAt.lt(retention_edge))
            .exec(&self.db)
            .await?
            .rows_affected;

        info!(sessions, entries, "retention cleanup finished");

        Ok(())
    }
}
