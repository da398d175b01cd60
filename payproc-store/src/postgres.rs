//! PostgreSQL storage adapter.
#![allow(clippy::collapsible_if)]

use async_trait::async_trait;
use sqlx::PgPool;

use payproc_types::{
    CardActivity, FraudReport, StoreError, Transaction, TransactionStore, VerdictStore,
};

use crate::types::{DbCardActivity, DbFraudReport};

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL Database
// ─────────────────────────────────────────────────────────────────────────────

/// PostgreSQL-backed transaction and verdict storage.
pub struct PostgresDatabase {
    pool: PgPool,
}

/// Executes SQL statements from a migration file, splitting by semicolons.
async fn execute_migration(pool: &PgPool, sql: &str, name: &str) -> Result<(), anyhow::Error> {
    for statement in sql.split(';') {
        let stmt = statement.trim();
        if !stmt.is_empty() {
            sqlx::query(stmt)
                .execute(pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration {} failed: {}", name, e))?;
        }
    }
    Ok(())
}

/// Runs all database migrations.
async fn run_migrations(pool: &PgPool) -> Result<(), anyhow::Error> {
    execute_migration(
        pool,
        include_str!("../migrations/0001_create_transactions_pg.sql"),
        "0001",
    )
    .await?;

    execute_migration(
        pool,
        include_str!("../migrations/0002_create_fraud_reports_pg.sql"),
        "0002",
    )
    .await?;

    Ok(())
}

impl PostgresDatabase {
    /// Connects and runs migrations.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Port implementations
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl TransactionStore for PostgresDatabase {
    async fn save(&self, tx: &Transaction) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"INSERT INTO transactions (id, status, amount, currency, card_fingerprint, idempotency_key, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               ON CONFLICT (idempotency_key) DO NOTHING"#,
        )
        .bind(tx.id.as_uuid())
        .bind(tx.status.to_string())
        .bind(tx.amount)
        .bind(&tx.currency)
        .bind(&tx.card_fingerprint)
        .bind(tx.idempotency_key)
        .bind(tx.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        // An untouched row means another request already claimed the key.
        if result.rows_affected() == 0 {
            return Err(StoreError::DuplicateIdempotencyKey);
        }

        Ok(())
    }
}

#[async_trait]
impl VerdictStore for PostgresDatabase {
    async fn record(&self, report: &FraudReport) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO fraud_reports (transaction_id, is_fraudulent, reason, card_fingerprint, amount, evaluated_at)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(report.transaction_id.as_uuid())
        .bind(report.is_fraudulent)
        .bind(&report.reason)
        .bind(&report.card_fingerprint)
        .bind(report.amount)
        .bind(report.evaluated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(())
    }

    async fn recent_fraudulent(&self, limit: u32) -> Result<Vec<FraudReport>, StoreError> {
        let rows: Vec<DbFraudReport> = sqlx::query_as(
            r#"SELECT transaction_id, is_fraudulent, reason, card_fingerprint, amount, evaluated_at
               FROM fraud_reports WHERE is_fraudulent = TRUE
               ORDER BY evaluated_at DESC LIMIT $1"#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        rows.into_iter().map(DbFraudReport::into_domain).collect()
    }

    async fn top_card_fingerprints(&self, limit: u32) -> Result<Vec<CardActivity>, StoreError> {
        let rows: Vec<DbCardActivity> = sqlx::query_as(
            r#"SELECT card_fingerprint, COUNT(*) AS transaction_count
               FROM fraud_reports
               GROUP BY card_fingerprint
               ORDER BY transaction_count DESC, card_fingerprint ASC
               LIMIT $1"#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(rows.into_iter().map(DbCardActivity::into_domain).collect())
    }
}
