//! Object store the controller reads from and writes to

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteObjectStore;

use crate::core::{NamespacedName, Object, ObjectKey, ObjectMeta, Resource, ResourceKind};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Error types for store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(ObjectKey),

    #[error("{0} already exists")]
    AlreadyExists(ObjectKey),

    #[error("conflict writing {key}: expected resource version {expected}, found {actual}")]
    Conflict {
        key: ObjectKey,
        expected: u64,
        actual: u64,
    },

    #[error("stored object {0} has an unexpected kind")]
    KindMismatch(ObjectKey),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Storage and lookup of objects
///
/// `update` must reject a write whose resource version differs from the
/// stored one. Deleting an object that still has finalizers only marks it
/// with a deletion timestamp; the object goes away once an update leaves it
/// with no finalizers. Removing an object removes everything it owns.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Point lookup; `Ok(None)` if absent
    async fn get(&self, key: &ObjectKey) -> Result<Option<Object>, StoreError>;

    async fn create(&self, object: Object) -> Result<Object, StoreError>;

    async fn update(&self, object: Object) -> Result<Object, StoreError>;

    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError>;

    /// All objects of a kind, optionally within one namespace
    async fn list(&self, kind: ResourceKind, namespace: Option<&str>) -> Result<Vec<Object>, StoreError>;
}

/// Typed point lookup
pub async fn get<R: Resource>(
    store: &dyn ObjectStore,
    key: &NamespacedName,
) -> Result<Option<R>, StoreError> {
    let object_key = ObjectKey::of::<R>(key);
    match store.get(&object_key).await? {
        Some(object) => R::from_object(object)
            .map(Some)
            .ok_or(StoreError::KindMismatch(object_key)),
        None => Ok(None),
    }
}

pub async fn create<R: Resource>(store: &dyn ObjectStore, resource: R) -> Result<R, StoreError> {
    let object = store.create(resource.into_object()).await?;
    let key = object.key();
    R::from_object(object).ok_or(StoreError::KindMismatch(key))
}

pub async fn update<R: Resource>(store: &dyn ObjectStore, resource: R) -> Result<R, StoreError> {
    let object = store.update(resource.into_object()).await?;
    let key = object.key();
    R::from_object(object).ok_or(StoreError::KindMismatch(key))
}

/// Typed list
pub async fn list<R: Resource>(
    store: &dyn ObjectStore,
    namespace: Option<&str>,
) -> Result<Vec<R>, StoreError> {
    Ok(store
        .list(R::KIND, namespace)
        .await?
        .into_iter()
        .filter_map(R::from_object)
        .collect())
}

/// Fill in the fields a store owns on a newly created object
pub(crate) fn prepare_create(meta: &mut ObjectMeta, resource_version: u64) {
    if meta.uid.is_none() {
        meta.uid = Some(Uuid::new_v4());
    }
    meta.resource_version = resource_version;
    meta.generation = meta.generation.max(1);
    meta.creation_timestamp.get_or_insert_with(Utc::now);
    meta.deletion_timestamp = None;
}

/// In-memory store (for tests, demos, or ephemeral use)
pub struct InMemoryStore {
    objects: RwLock<BTreeMap<ObjectKey, Object>>,
    last_version: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            last_version: AtomicU64::new(0),
        }
    }

    fn next_version(&self) -> u64 {
        self.last_version.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Remove `key` and, transitively, everything owned by it
    fn remove_cascading(objects: &mut BTreeMap<ObjectKey, Object>, key: &ObjectKey) {
        let mut pending = vec![key.clone()];
        while let Some(key) = pending.pop() {
            let Some(removed) = objects.remove(&key) else {
                continue;
            };
            debug!("Removed {}", key);
            if let Some(uid) = removed.metadata().uid {
                pending.extend(
                    objects
                        .iter()
                        .filter(|(_, o)| o.metadata().is_owned_by(uid))
                        .map(|(k, _)| k.clone()),
                );
            }
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ObjectStore for InMemoryStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<Object>, StoreError> {
        let objects = self.objects.read().await;
        Ok(objects.get(key).cloned())
    }

    async fn create(&self, mut object: Object) -> Result<Object, StoreError> {
        let key = object.key();
        let mut objects = self.objects.write().await;
        if objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key));
        }
        prepare_create(object.metadata_mut(), self.next_version());
        objects.insert(key, object.clone());
        Ok(object)
    }

    async fn update(&self, mut object: Object) -> Result<Object, StoreError> {
        let key = object.key();
        let mut objects = self.objects.write().await;
        let stored = objects
            .get(&key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;

        let stored_meta = stored.metadata();
        let expected = object.metadata().resource_version;
        if stored_meta.resource_version != expected {
            return Err(StoreError::Conflict {
                key,
                expected,
                actual: stored_meta.resource_version,
            });
        }

        // Store-owned fields cannot be changed by clients
        let (uid, created, deleted) = (
            stored_meta.uid,
            stored_meta.creation_timestamp,
            stored_meta.deletion_timestamp,
        );
        let meta = object.metadata_mut();
        meta.uid = uid;
        meta.creation_timestamp = created;
        meta.deletion_timestamp = deleted;
        meta.resource_version = self.next_version();

        if meta.is_being_deleted() && meta.finalizers.is_empty() {
            Self::remove_cascading(&mut objects, &key);
        } else {
            objects.insert(key, object.clone());
        }
        Ok(object)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError> {
        let mut objects = self.objects.write().await;
        let version = self.next_version();
        let object = objects
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;

        let meta = object.metadata_mut();
        if meta.finalizers.is_empty() {
            Self::remove_cascading(&mut objects, key);
        } else if meta.deletion_timestamp.is_none() {
            meta.deletion_timestamp = Some(Utc::now());
            meta.resource_version = version;
        }
        Ok(())
    }

    async fn list(&self, kind: ResourceKind, namespace: Option<&str>) -> Result<Vec<Object>, StoreError> {
        let objects = self.objects.read().await;
        Ok(objects
            .iter()
            .filter(|(k, _)| k.kind == kind && namespace.map_or(true, |ns| k.namespace == ns))
            .map(|(_, o)| o.clone())
            .collect())
    }
}
