//! Embedded SQL migrations
//!
//! Each file in `api/migrations/` runs once inside its own transaction and is
//! recorded in `schema_migrations`.

use sea_orm::{
    ConnectionTrait, DatabaseBackend, DatabaseConnection, Statement, TransactionTrait,
};

use crate::error::DomainError;

const MIGRATIONS: &[(&str, &str)] = &[
    (
        "0001_initial_schema",
        include_str!("../../../migrations/0001_initial_schema.sql"),
    ),
    (
        "0002_milestones_and_preferences",
        include_str!("../../../migrations/0002_milestones_and_preferences.sql"),
    ),
];

/// Apply pending migrations; returns how many ran
pub async fn run_migrations(db: &DatabaseConnection) -> Result<usize, DomainError> {
    db.execute_unprepared(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version VARCHAR(255) PRIMARY KEY,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .await
    .map_err(|e| DomainError::Database(e.to_string()))?;

    let rows = db
        .query_all(Statement::from_string(
            DatabaseBackend::Postgres,
            "SELECT version FROM schema_migrations",
        ))
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;

    let applied: Vec<String> = rows
        .iter()
        .filter_map(|row| row.try_get::<String>("", "version").ok())
        .collect();

    let mut count = 0;
    for (version, sql) in MIGRATIONS {
        if applied.iter().any(|v| v == version) {
            continue;
        }

        tracing::info!(version = %version, "Applying migration");
        let txn = db
            .begin()
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        txn.execute_unprepared(sql)
            .await
            .map_err(|e| DomainError::Database(format!("{}: {}", version, e)))?;

        txn.execute(Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            "INSERT INTO schema_migrations (version) VALUES ($1)",
            [(*version).into()],
        ))
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;
        count += 1;
    }

    Ok(count)
}
