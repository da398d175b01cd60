//! SQLite storage adapter.
#![allow(clippy::collapsible_if)]

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use std::str::FromStr;

use payproc_types::{
    CardActivity, FraudReport, StoreError, Transaction, TransactionStore, VerdictStore,
};

use crate::types::{DbCardActivity, DbFraudReport};

// ─────────────────────────────────────────────────────────────────────────────
// SQLite Database
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite-backed transaction and verdict storage.
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Connects and runs migrations.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            // Remove query parameters
            let path = path.split('?').next().unwrap_or(path);
            if path != ":memory:" {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;

        let ddl = include_str!("../migrations/0001_create_transactions.sql");
        sqlx::query(ddl).execute(&pool).await?;

        let ddl_reports = include_str!("../migrations/0002_create_fraud_reports.sql");
        sqlx::query(ddl_reports).execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Port implementations
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl TransactionStore for SqliteDatabase {
    async fn save(&self, tx: &Transaction) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"INSERT INTO transactions (id, status, amount, currency, card_fingerprint, idempotency_key, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(idempotency_key) DO NOTHING"#,
        )
        .bind(tx.id.to_string())
        .bind(tx.status.to_string())
        .bind(tx.amount)
        .bind(&tx.currency)
        .bind(&tx.card_fingerprint)
        .bind(tx.idempotency_key.to_string())
        .bind(tx.created_at.to_rfc3339())
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
impl VerdictStore for SqliteDatabase {
    async fn record(&self, report: &FraudReport) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO fraud_reports (transaction_id, is_fraudulent, reason, card_fingerprint, amount, evaluated_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(report.transaction_id.to_string())
        .bind(report.is_fraudulent)
        .bind(&report.reason)
        .bind(&report.card_fingerprint)
        .bind(report.amount)
        .bind(report.evaluated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(())
    }

    async fn recent_fraudulent(&self, limit: u32) -> Result<Vec<FraudReport>, StoreError> {
        let rows: Vec<DbFraudReport> = sqlx::query_as(
            r#"SELECT transaction_id, is_fraudulent, reason, card_fingerprint, amount, evaluated_at
               FROM fraud_reports WHERE is_fraudulent = 1
               ORDER BY evaluated_at DESC LIMIT ?"#,
        )
        .bind(limit)
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
               LIMIT ?"#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(rows.into_iter().map(DbCardActivity::into_domain).collect())
    }
}
