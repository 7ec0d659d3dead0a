//! In-memory set of enrolled faces used by the recognition worker.

use smartlock_core::FaceEncoding;
use smartlock_storage::{EnrolledIdentity, PersistenceGateway, StorageResult};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::info;

/// One enrolled encoding and the identity it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct KnownFace {
    pub name: String,
    pub encoding: FaceEncoding,
}

/// Immutable snapshot of every enrolled encoding.
///
/// An identity with several embeddings contributes one entry per embedding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnownFaceSet {
    faces: Vec<KnownFace>,
}

impl KnownFaceSet {
    pub fn new(faces: Vec<KnownFace>) -> Self {
        Self { faces }
    }

    pub fn from_identities(identities: Vec<EnrolledIdentity>) -> Self {
        let faces = identities
            .into_iter()
            .flat_map(|identity| {
                let name = identity.name;
                identity.encodings.into_iter().map(move |encoding| KnownFace {
                    name: name.clone(),
                    encoding,
                })
            })
            .collect();
        Self { faces }
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KnownFace> {
        self.faces.iter()
    }
}

/// Shared holder for the current [`KnownFaceSet`].
///
/// Readers clone the `Arc` and keep using their snapshot; a reload swaps the
/// reference so in-flight recognition never sees a half-updated set.
///
/// Reloads are serialized: a read that started earlier can never overwrite
/// the result of a read that started later.
#[derive(Debug, Default)]
pub struct KnownFaceCache {
    current: RwLock<Arc<KnownFaceSet>>,
    reload: Mutex<()>,
}

impl KnownFaceCache {
    pub fn new(set: KnownFaceSet) -> Self {
        Self {
            current: RwLock::new(Arc::new(set)),
            reload: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Arc<KnownFaceSet> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn replace(&self, set: KnownFaceSet) {
        let set = Arc::new(set);
        match self.current.write() {
            Ok(mut guard) => *guard = set,
            Err(poisoned) => *poisoned.into_inner() = set,
        }
    }

    /// Load every enrolled identity from storage and swap it in.
    pub async fn reload<G: PersistenceGateway>(&self, gateway: &G) -> StorageResult<usize> {
        let _reloading = self.reload.lock().await;
        let set = KnownFaceSet::from_identities(gateway.list_identities_with_embeddings().await?);
        let count = set.len();
        self.replace(set);
        info!(encodings = count, "Known faces loaded");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartlock_core::constants::EMBEDDING_DIMENSIONS;
    use smartlock_core::AccessMethod;
    use smartlock_storage::{
        AccessGrant, DailyAccessCount, Database, EnrollmentRecord, Identity, SqliteGateway,
    };
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    fn encoding(value: f64) -> FaceEncoding {
        FaceEncoding::from([value; EMBEDDING_DIMENSIONS])
    }

    #[test]
    fn test_flattens_identities() {
        let set = KnownFaceSet::from_identities(vec![
            EnrolledIdentity {
                id: 1,
                name: "alice".into(),
                encodings: vec![encoding(0.1), encoding(0.2)],
            },
            EnrolledIdentity {
                id: 2,
                name: "bob".into(),
                encodings: vec![encoding(0.3)],
            },
        ]);
        let names: Vec<_> = set.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["alice", "alice", "bob"]);
    }

    #[test]
    fn test_snapshot_survives_replace() {
        let cache = KnownFaceCache::default();
        let before = cache.snapshot();
        cache.replace(KnownFaceSet::new(vec![KnownFace {
            name: "alice".into(),
            encoding: encoding(0.1),
        }]));
        assert!(before.is_empty());
        assert_eq!(cache.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_reload_from_gateway() {
        let db = Database::in_memory().await.unwrap();
        let gateway = SqliteGateway::new(db.pool().clone());
        gateway
            .enroll_embedding("alice", &encoding(0.1), "alice.jpg")
            .await
            .unwrap();

        let cache = KnownFaceCache::default();
        assert_eq!(cache.reload(&gateway).await.unwrap(), 1);
        assert_eq!(cache.snapshot().iter().next().unwrap().name, "alice");
    }

    /// Gateway whose first listing reads immediately but returns late.
    struct SlowFirstListing {
        inner: SqliteGateway,
        listings: AtomicUsize,
    }

    impl PersistenceGateway for SlowFirstListing {
        async fn find_identity_by_name(&self, name: &str) -> StorageResult<Option<Identity>> {
            self.inner.find_identity_by_name(name).await
        }

        async fn create_identity(&self, name: &str) -> StorageResult<i64> {
            self.inner.create_identity(name).await
        }

        async fn add_embedding(
            &self,
            identity_id: i64,
            encoding: &FaceEncoding,
            source_path: &str,
        ) -> StorageResult<i64> {
            self.inner.add_embedding(identity_id, encoding, source_path).await
        }

        async fn list_identities_with_embeddings(&self) -> StorageResult<Vec<EnrolledIdentity>> {
            let first = self.listings.fetch_add(1, Ordering::SeqCst) == 0;
            let identities = self.inner.list_identities_with_embeddings().await?;
            if first {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            Ok(identities)
        }

        async fn append_access_log(
            &self,
            method: AccessMethod,
            identity_id: Option<i64>,
            artifact_path: Option<&str>,
        ) -> StorageResult<i64> {
            self.inner
                .append_access_log(method, identity_id, artifact_path)
                .await
        }

        async fn record_access(&self, grant: &AccessGrant) -> StorageResult<i64> {
            self.inner.record_access(grant).await
        }

        async fn enroll_embedding(
            &self,
            name: &str,
            encoding: &FaceEncoding,
            source_path: &str,
        ) -> StorageResult<EnrollmentRecord> {
            self.inner.enroll_embedding(name, encoding, source_path).await
        }

        async fn daily_access_counts(&self, days: u32) -> StorageResult<Vec<DailyAccessCount>> {
            self.inner.daily_access_counts(days).await
        }
    }

    #[tokio::test]
    async fn test_overlapping_reloads_keep_newest_set() {
        let db = Database::in_memory().await.unwrap();
        let gateway = SlowFirstListing {
            inner: SqliteGateway::new(db.pool().clone()),
            listings: AtomicUsize::new(0),
        };
        let cache = KnownFaceCache::default();

        let stale = cache.reload(&gateway);
        let fresh = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            gateway
                .enroll_embedding("alice", &encoding(0.1), "alice.jpg")
                .await
                .unwrap();
            cache.reload(&gateway).await
        };
        let (stale, fresh) = tokio::join!(stale, fresh);

        assert_eq!(stale.unwrap(), 0);
        assert_eq!(fresh.unwrap(), 1);
        assert_eq!(cache.snapshot().len(), 1, "older listing overwrote the newer one");
    }
}
