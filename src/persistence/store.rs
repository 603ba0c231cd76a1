//! SQLite-based object store

use crate::core::{Object, ObjectKey, ResourceKind};
use crate::persistence::{prepare_create, ObjectStore, StoreError};
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use tracing::debug;

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// SQLite object store
///
/// Objects are kept as JSON bodies keyed by kind, namespace and name. The
/// resource version column doubles as the compare-and-swap token for updates.
pub struct SqliteObjectStore {
    pool: SqlitePool,
}

impl SqliteObjectStore {
    /// Open (or create) a store at `db_path`; `:memory:` gives a private database
    pub async fn new(db_path: &str) -> Result<Self> {
        let in_memory = db_path == ":memory:";
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path))
            .context("Invalid database path")?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 4 })
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.init().await?;

        Ok(store)
    }

    /// Create store with default path
    pub async fn with_default_path() -> Result<Self> {
        let data_dir = dirs::data_local_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
        let db_dir = data_dir.join("sequencer");
        std::fs::create_dir_all(&db_dir)?;

        let db_path = db_dir.join("objects.db");
        let db_path = db_path
            .to_str()
            .context("Database path is not valid UTF-8")?;
        Self::new(db_path).await
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS objects (
                kind TEXT NOT NULL,
                namespace TEXT NOT NULL,
                name TEXT NOT NULL,
                uid TEXT,
                owner_uid TEXT,
                resource_version INTEGER NOT NULL,
                body TEXT NOT NULL,
                PRIMARY KEY (kind, namespace, name)
            );

            CREATE INDEX IF NOT EXISTS idx_owner_uid ON objects(owner_uid);

            CREATE TABLE IF NOT EXISTS counters (
                name TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to initialize schema")?;

        Ok(())
    }

    async fn next_version(tx: &mut Transaction<'_, Sqlite>) -> Result<u64, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO counters (name, value) VALUES ('resource_version', 1)
            ON CONFLICT(name) DO UPDATE SET value = value + 1
            RETURNING value
            "#,
        )
        .fetch_one(&mut **tx)
        .await
        .map_err(backend)?;
        Ok(row.get::<i64, _>("value") as u64)
    }

    async fn fetch(
        tx: &mut Transaction<'_, Sqlite>,
        key: &ObjectKey,
    ) -> Result<Option<Object>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT body FROM objects
            WHERE kind = ?1 AND namespace = ?2 AND name = ?3
            "#,
        )
        .bind(key.kind.as_str())
        .bind(&key.namespace)
        .bind(&key.name)
        .fetch_optional(&mut **tx)
        .await
        .map_err(backend)?;

        match row {
            Some(row) => Ok(Some(serde_json::from_str(&row.get::<String, _>("body"))?)),
            None => Ok(None),
        }
    }

    async fn write(tx: &mut Transaction<'_, Sqlite>, object: &Object) -> Result<(), StoreError> {
        let meta = object.metadata();
        let owner_uid = meta
            .controller_ref()
            .or_else(|| meta.owner_references.first())
            .map(|o| o.uid.to_string());

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO objects
            (kind, namespace, name, uid, owner_uid, resource_version, body)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(object.kind().as_str())
        .bind(&meta.namespace)
        .bind(&meta.name)
        .bind(meta.uid.map(|u| u.to_string()))
        .bind(owner_uid)
        .bind(meta.resource_version as i64)
        .bind(serde_json::to_string(object)?)
        .execute(&mut **tx)
        .await
        .map_err(backend)?;

        Ok(())
    }

    async fn remove_cascading(
        tx: &mut Transaction<'_, Sqlite>,
        key: &ObjectKey,
    ) -> Result<(), StoreError> {
        let mut pending = vec![key.clone()];
        while let Some(key) = pending.pop() {
            let row = sqlx::query(
                r#"
                DELETE FROM objects
                WHERE kind = ?1 AND namespace = ?2 AND name = ?3
                RETURNING uid
                "#,
            )
            .bind(key.kind.as_str())
            .bind(&key.namespace)
            .bind(&key.name)
            .fetch_optional(&mut **tx)
            .await
            .map_err(backend)?;

            let Some(uid) = row.and_then(|r| r.get::<Option<String>, _>("uid")) else {
                continue;
            };
            debug!("Removed {}", key);

            let owned = sqlx::query("SELECT kind, namespace, name FROM objects WHERE owner_uid = ?1")
                .bind(uid)
                .fetch_all(&mut **tx)
                .await
                .map_err(backend)?;
            for row in owned {
                let kind = ResourceKind::from_str(&row.get::<String, _>("kind"))
                    .map_err(StoreError::Backend)?;
                pending.push(ObjectKey::new(kind, row.get::<String, _>("namespace"), row.get::<String, _>("name")));
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ObjectStore for SqliteObjectStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<Object>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let object = Self::fetch(&mut tx, key).await?;
        tx.commit().await.map_err(backend)?;
        Ok(object)
    }

    async fn create(&self, mut object: Object) -> Result<Object, StoreError> {
        let key = object.key();
        let mut tx = self.pool.begin().await.map_err(backend)?;
        if Self::fetch(&mut tx, &key).await?.is_some() {
            return Err(StoreError::AlreadyExists(key));
        }
        let version = Self::next_version(&mut tx).await?;
        prepare_create(object.metadata_mut(), version);
        Self::write(&mut tx, &object).await?;
        tx.commit().await.map_err(backend)?;
        Ok(object)
    }

    async fn update(&self, mut object: Object) -> Result<Object, StoreError> {
        let key = object.key();
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let stored = Self::fetch(&mut tx, &key)
            .await?
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

        let version = Self::next_version(&mut tx).await?;
        let meta = object.metadata_mut();
        meta.uid = stored_meta.uid;
        meta.creation_timestamp = stored_meta.creation_timestamp;
        meta.deletion_timestamp = stored_meta.deletion_timestamp;
        meta.resource_version = version;

        if meta.is_being_deleted() && meta.finalizers.is_empty() {
            Self::remove_cascading(&mut tx, &key).await?;
        } else {
            Self::write(&mut tx, &object).await?;
        }
        tx.commit().await.map_err(backend)?;
        Ok(object)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let mut object = Self::fetch(&mut tx, key)
            .await?
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;

        if object.metadata().finalizers.is_empty() {
            Self::remove_cascading(&mut tx, key).await?;
        } else if !object.metadata().is_being_deleted() {
            let version = Self::next_version(&mut tx).await?;
            let meta = object.metadata_mut();
            meta.deletion_timestamp = Some(Utc::now());
            meta.resource_version = version;
            Self::write(&mut tx, &object).await?;
        }
        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn list(&self, kind: ResourceKind, namespace: Option<&str>) -> Result<Vec<Object>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT body FROM objects
            WHERE kind = ?1 AND (?2 IS NULL OR namespace = ?2)
            ORDER BY namespace ASC, name ASC
            "#,
        )
        .bind(kind.as_str())
        .bind(namespace)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter()
            .map(|row| Ok(serde_json::from_str(&row.get::<String, _>("body"))?))
            .collect()
    }
}
