//! Transaction-aware operations for atomic multistep writes.
//!
//! These functions accept a SQLite transaction reference so the gateway can
//! group several statements into one unit: enrollment (find-or-create the
//! identity, insert the embedding) and access logging (resolve the identity,
//! insert the entry).
//!
//! # Usage Pattern
//!
//! ```no_run
//! use smartlock_storage::{Database, transaction};
//! use smartlock_core::AccessMethod;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::in_memory().await?;
//!
//! let mut tx = db.pool().begin().await?;
//!
//! let identity_id = transaction::find_identity_id_by_name(&mut tx, "alice").await?;
//! transaction::insert_access_log(&mut tx, AccessMethod::Face, identity_id, Some("videos/x.mp4"))
//!     .await?;
//!
//! tx.commit().await?;
//! # Ok(())
//! # }
//! ```
//!
//! If any operation returns an error, the transaction must be rolled back by
//! calling `rollback()` or by dropping it.

use crate::error::StorageResult;
use smartlock_core::{AccessMethod, FaceEncoding};
use sqlx::{Sqlite, Transaction};

/// Look up an identity id by its unique name.
pub async fn find_identity_id_by_name(
    tx: &mut Transaction<'_, Sqlite>,
    name: &str,
) -> StorageResult<Option<i64>> {
    let id = sqlx::query_scalar::<_, i64>("SELECT id FROM identities WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut **tx)
        .await?;

    Ok(id)
}

/// Insert an identity unless one with the same name exists.
///
/// Returns the identity id and whether a row was created.
pub async fn find_or_create_identity(
    tx: &mut Transaction<'_, Sqlite>,
    name: &str,
) -> StorageResult<(i64, bool)> {
    let inserted = sqlx::query("INSERT INTO identities (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
        .bind(name)
        .execute(&mut **tx)
        .await?
        .rows_affected()
        == 1;

    let id = sqlx::query_scalar::<_, i64>("SELECT id FROM identities WHERE name = ?")
        .bind(name)
        .fetch_one(&mut **tx)
        .await?;

    Ok((id, inserted))
}

/// Insert an embedding for an existing identity.
///
/// # Errors
///
/// Fails with a foreign key violation if `identity_id` does not exist.
pub async fn insert_embedding(
    tx: &mut Transaction<'_, Sqlite>,
    identity_id: i64,
    encoding: &FaceEncoding,
    source_path: &str,
) -> StorageResult<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO embeddings (identity_id, encoding, source_path)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(identity_id)
    .bind(encoding.to_le_bytes())
    .bind(source_path)
    .execute(&mut **tx)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Insert one access log entry; `accessed_at` is defaulted by the database.
pub async fn insert_access_log(
    tx: &mut Transaction<'_, Sqlite>,
    method: AccessMethod,
    identity_id: Option<i64>,
    artifact_path: Option<&str>,
) -> StorageResult<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO access_logs (method, identity_id, artifact_path)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(method.as_str())
    .bind(identity_id)
    .bind(artifact_path)
    .execute(&mut **tx)
    .await?;

    Ok(result.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use smartlock_core::constants::EMBEDDING_DIMENSIONS;

    #[tokio::test]
    async fn test_find_or_create_is_idempotent() {
        let db = Database::in_memory().await.unwrap();
        let mut tx = db.pool().begin().await.unwrap();

        let (first, created) = find_or_create_identity(&mut tx, "alice").await.unwrap();
        assert!(created);
        let (second, created) = find_or_create_identity(&mut tx, "alice").await.unwrap();
        assert!(!created);
        assert_eq!(first, second);

        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let db = Database::in_memory().await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        let (id, _) = find_or_create_identity(&mut tx, "bob").await.unwrap();
        insert_embedding(
            &mut tx,
            id,
            &FaceEncoding::from([0.5; EMBEDDING_DIMENSIONS]),
            "bob.jpg",
        )
        .await
        .unwrap();
        tx.rollback().await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        assert_eq!(find_identity_id_by_name(&mut tx, "bob").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_embedding_requires_identity() {
        let db = Database::in_memory().await.unwrap();
        let mut tx = db.pool().begin().await.unwrap();
        let result = insert_embedding(
            &mut tx,
            999,
            &FaceEncoding::from([0.0; EMBEDDING_DIMENSIONS]),
            "ghost.jpg",
        )
        .await;
        assert!(result.is_err());
    }
}
