//! Persistence Gateway: the only path from the orchestrator to the database.

use crate::{
    error::{StorageError, StorageResult},
    models::{
        AccessGrant, AccessLogEntry, DailyAccessCount, EnrolledIdentity, EnrollmentRecord,
        Identity,
    },
    transaction,
};
use chrono::{Duration, Local, NaiveDate};
use smartlock_core::{AccessMethod, FaceEncoding};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::{collections::BTreeMap, future::Future};
use tracing::{debug, warn};

/// Storage operations the orchestrator depends on.
///
/// Every write runs in its own transaction and is rolled back on failure.
/// There are no retries. Futures are `Send` so callers can drive them from
/// spawned tasks.
pub trait PersistenceGateway: Send + Sync {
    fn find_identity_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = StorageResult<Option<Identity>>> + Send;

    /// Create an identity. Fails if the name is taken.
    fn create_identity(&self, name: &str) -> impl Future<Output = StorageResult<i64>> + Send;

    fn add_embedding(
        &self,
        identity_id: i64,
        encoding: &FaceEncoding,
        source_path: &str,
    ) -> impl Future<Output = StorageResult<i64>> + Send;

    /// Every identity with at least one embedding, ordered by identity then
    /// embedding insertion.
    fn list_identities_with_embeddings(
        &self,
    ) -> impl Future<Output = StorageResult<Vec<EnrolledIdentity>>> + Send;

    fn append_access_log(
        &self,
        method: AccessMethod,
        identity_id: Option<i64>,
        artifact_path: Option<&str>,
    ) -> impl Future<Output = StorageResult<i64>> + Send;

    /// Resolve the grant's identity by name and append the log entry in one
    /// transaction. Unresolved names are logged without an identity.
    fn record_access(
        &self,
        grant: &AccessGrant,
    ) -> impl Future<Output = StorageResult<i64>> + Send;

    /// Find-or-create the identity and add the embedding in one transaction.
    fn enroll_embedding(
        &self,
        name: &str,
        encoding: &FaceEncoding,
        source_path: &str,
    ) -> impl Future<Output = StorageResult<EnrollmentRecord>> + Send;

    /// Face and remote unlock counts for each of the last `days` calendar
    /// days (local time), oldest first. Days without entries count zero.
    fn daily_access_counts(
        &self,
        days: u32,
    ) -> impl Future<Output = StorageResult<Vec<DailyAccessCount>>> + Send;
}

/// SQLite implementation of [`PersistenceGateway`].
#[derive(Debug, Clone)]
pub struct SqliteGateway {
    pool: SqlitePool,
}

impl SqliteGateway {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Most recent access log entries, newest first.
    pub async fn recent_access_logs(&self, limit: i64) -> StorageResult<Vec<AccessLogEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, accessed_at, method, identity_id, artifact_path
            FROM access_logs
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> StorageResult<AccessLogEntry> {
                let method: String = row.try_get("method")?;
                Ok(AccessLogEntry {
                    id: row.try_get("id")?,
                    accessed_at: row.try_get("accessed_at")?,
                    method: method.parse()?,
                    identity_id: row.try_get("identity_id")?,
                    artifact_path: row.try_get("artifact_path")?,
                })
            })
            .collect()
    }

    /// Commit on success, roll back explicitly on failure.
    async fn finish<T>(tx: Transaction<'_, Sqlite>, result: StorageResult<T>) -> StorageResult<T> {
        match result {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }
}

impl PersistenceGateway for SqliteGateway {
    async fn find_identity_by_name(&self, name: &str) -> StorageResult<Option<Identity>> {
        let identity = sqlx::query_as::<_, Identity>(
            "SELECT id, name, created_at FROM identities WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(identity)
    }

    async fn create_identity(&self, name: &str) -> StorageResult<i64> {
        if name.trim().is_empty() {
            return Err(StorageError::Validation("identity name must not be empty".into()));
        }
        let result = sqlx::query("INSERT INTO identities (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(result.last_insert_rowid())
    }

    async fn add_embedding(
        &self,
        identity_id: i64,
        encoding: &FaceEncoding,
        source_path: &str,
    ) -> StorageResult<i64> {
        let mut tx = self.pool.begin().await?;
        let result = transaction::insert_embedding(&mut tx, identity_id, encoding, source_path).await;
        Self::finish(tx, result).await
    }

    async fn list_identities_with_embeddings(&self) -> StorageResult<Vec<EnrolledIdentity>> {
        let rows = sqlx::query(
            r#"
            SELECT i.id AS identity_id, i.name AS name, e.encoding AS encoding
            FROM identities i
            JOIN embeddings e ON e.identity_id = i.id
            ORDER BY i.id, e.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut identities: Vec<EnrolledIdentity> = Vec::new();
        for row in &rows {
            let id: i64 = row.try_get("identity_id")?;
            let blob: Vec<u8> = row.try_get("encoding")?;
            let encoding = FaceEncoding::from_le_bytes(&blob)?;

            match identities.last_mut() {
                Some(current) if current.id == id => current.encodings.push(encoding),
                _ => identities.push(EnrolledIdentity {
                    id,
                    name: row.try_get("name")?,
                    encodings: vec![encoding],
                }),
            }
        }

        debug!(identities = identities.len(), "Loaded enrolled identities");
        Ok(identities)
    }

    async fn append_access_log(
        &self,
        method: AccessMethod,
        identity_id: Option<i64>,
        artifact_path: Option<&str>,
    ) -> StorageResult<i64> {
        let mut tx = self.pool.begin().await?;
        let result =
            transaction::insert_access_log(&mut tx, method, identity_id, artifact_path).await;
        Self::finish(tx, result).await
    }

    async fn record_access(&self, grant: &AccessGrant) -> StorageResult<i64> {
        let mut tx = self.pool.begin().await?;

        let result = async {
            let identity_id = match grant.identity_name.as_deref() {
                Some(name) => {
                    let id = transaction::find_identity_id_by_name(&mut tx, name).await?;
                    if id.is_none() {
                        warn!(identity = %name, "Identity not found, logging without reference");
                    }
                    id
                }
                None => None,
            };
            transaction::insert_access_log(
                &mut tx,
                grant.method,
                identity_id,
                grant.artifact_path.as_deref(),
            )
            .await
        }
        .await;

        Self::finish(tx, result).await
    }

    async fn enroll_embedding(
        &self,
        name: &str,
        encoding: &FaceEncoding,
        source_path: &str,
    ) -> StorageResult<EnrollmentRecord> {
        if name.trim().is_empty() {
            return Err(StorageError::Validation("identity name must not be empty".into()));
        }

        let mut tx = self.pool.begin().await?;
        let result = async {
            let (identity_id, identity_created) =
                transaction::find_or_create_identity(&mut tx, name).await?;
            let embedding_id =
                transaction::insert_embedding(&mut tx, identity_id, encoding, source_path).await?;
            Ok::<_, StorageError>(EnrollmentRecord {
                identity_id,
                embedding_id,
                identity_created,
            })
        }
        .await;

        Self::finish(tx, result).await
    }

    async fn daily_access_counts(&self, days: u32) -> StorageResult<Vec<DailyAccessCount>> {
        if days == 0 {
            return Ok(Vec::new());
        }
        let today = Local::now().date_naive();
        let start = today - Duration::days(i64::from(days) - 1);

        let rows = sqlx::query(
            r#"
            SELECT date(accessed_at) AS day,
                   SUM(CASE WHEN method = 'face' THEN 1 ELSE 0 END) AS face_count,
                   SUM(CASE WHEN method = 'remote' THEN 1 ELSE 0 END) AS remote_count
            FROM access_logs
            WHERE date(accessed_at) >= ?
            GROUP BY day
            "#,
        )
        .bind(start.format("%Y-%m-%d").to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut by_day: BTreeMap<NaiveDate, (i64, i64)> = BTreeMap::new();
        for row in &rows {
            let day: String = row.try_get("day")?;
            let date = NaiveDate::parse_from_str(&day, "%Y-%m-%d")
                .map_err(|e| StorageError::DateTime(format!("{day}: {e}")))?;
            by_day.insert(date, (row.try_get("face_count")?, row.try_get("remote_count")?));
        }

        Ok(start
            .iter_days()
            .take_while(|date| *date <= today)
            .map(|date| {
                let (face_count, remote_count) = by_day.get(&date).copied().unwrap_or_default();
                DailyAccessCount {
                    date,
                    face_count,
                    remote_count,
                }
            })
            .collect())
    }
}
