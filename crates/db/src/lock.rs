//! Cross-process mutual exclusion for scheduled reconciliation cycles.
//!
//! The lock is a PostgreSQL session-scoped advisory lock keyed by a
//! fixed constant pair, held over a dedicated single-connection handle.
//! A pooled connection would be unsound here: session-scoped locks
//! belong to the connection that acquired them, and release could
//! otherwise run against a different one. Tying the lock to its own
//! connection also guarantees that a crashed holder releases the lock
//! through session teardown.

use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr,
    Statement,
};
use tracing::debug;

/// Advisory lock key pair identifying the scheduled cycle.
const LOCK_KEY: (i32, i32) = (0x524F_4C45, 0x4741_5445);

/// Handle to the cross-process scheduled cycle lock.
pub struct RunLock {
    conn: DatabaseConnection,
}

impl RunLock {
    /// Open a dedicated single-connection handle for lock management.
    pub async fn connect(url: &str) -> Result<Self, DbErr> {
        let mut options = ConnectOptions::new(url.to_owned());
        options.max_connections(1).min_connections(1);

        Ok(Self {
            conn: Database::connect(options).await?,
        })
    }

    /// Wrap an existing connection.
    ///
    /// Intended for tests and non-Postgres backends, where the lock
    /// trivially succeeds and connection affinity does not matter.
    pub fn from_connection(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Attempt to acquire the lock without blocking.
    ///
    /// Non-Postgres backends always acquire: those deployments are
    /// single-process and have no peer scheduler to exclude.
    pub async fn try_acquire(&self) -> Result<bool, DbErr> {
        match self.conn.get_database_backend() {
            DatabaseBackend::Postgres => {
                let row = self
                    .conn
                    .query_one(Statement::from_sql_and_values(
                        DatabaseBackend::Postgres,
                        "SELECT pg_try_advisory_lock($1, $2)",
                        [LOCK_KEY.0.into(), LOCK_KEY.1.into()],
                    ))
                    .await?;

                match row {
                    Some(row) => row.try_get_by_index(0),
                    None => Ok(false),
                }
            }
            backend => {
                debug!(?backend, "advisory locks unsupported, assuming exclusive");

                Ok(true)
            }
        }
    }

    /// Release a previously acquired lock.
    pub async fn release(&self) -> Result<(), DbErr> {
        if self.conn.get_database_backend() == DatabaseBackend::Postgres {
            self.conn
                .execute(Statement::from_sql_and_values(
                    DatabaseBackend::Postgres,
                    "SELECT pg_advisory_unlock($1, $2)",
                    [LOCK_KEY.0.into(), LOCK_KEY.1.into()],
                ))
                .await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;

    use super::RunLock;

    #[tokio::test]
    async fn non_postgres_backend_always_acquires() {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("unable to create test database");

        let lock = RunLock::from_connection(db);

        assert!(lock.try_acquire().await.unwrap());
        assert!(lock.try_acquire().await.unwrap());

        lock.release().await.unwrap();
    }
}
