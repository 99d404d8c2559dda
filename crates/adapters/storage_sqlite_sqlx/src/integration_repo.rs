//! `SQLite` implementation of [`IntegrationRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use tillguard_app::ports::IntegrationRepository;
use tillguard_domain::error::TillguardError;
use tillguard_domain::id::{IntegrationId, StoreId};
use tillguard_domain::integration::Integration;
use tillguard_domain::provider::Provider;

use crate::codec::{encode_ts, json, opt_ts, parsed, ts};
use crate::error::StorageError;

struct Wrapper(Integration);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let store_id: uuid::Uuid = row.try_get("store_id")?;

        Ok(Self(Integration {
            id: IntegrationId::from_uuid(id),
            store_id: StoreId::from_uuid(store_id),
            provider: parsed(row, "provider")?,
            status: parsed(row, "status")?,
            credentials_encrypted: row.try_get("credentials_encrypted")?,
            config: json(row, "config")?,
            last_synced_at: opt_ts(row, "last_synced_at")?,
            created_at: ts(row, "created_at")?,
            updated_at: ts(row, "updated_at")?,
        }))
    }
}

const SELECT_BY_STORE: &str =
    "SELECT * FROM store_integrations WHERE store_id = ? ORDER BY provider";
const SELECT_ONE: &str = "SELECT * FROM store_integrations WHERE store_id = ? AND provider = ?";

// id and created_at of an existing row win over the incoming ones
const UPSERT: &str = r"
    INSERT INTO store_integrations
        (id, store_id, provider, status, credentials_encrypted, config, last_synced_at, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (store_id, provider) DO UPDATE SET
        status = excluded.status,
        credentials_encrypted = excluded.credentials_encrypted,
        config = excluded.config,
        last_synced_at = excluded.last_synced_at,
        updated_at = excluded.updated_at
    RETURNING *
";

/// `SQLite`-backed integration repository.
pub struct SqliteIntegrationRepository {
    pool: SqlitePool,
}

impl SqliteIntegrationRepository {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl IntegrationRepository for SqliteIntegrationRepository {
    async fn list_for_store(&self, store_id: StoreId) -> Result<Vec<Integration>, TillguardError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_STORE)
            .bind(store_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn get(
        &self,
        store_id: StoreId,
        provider: Provider,
    ) -> Result<Option<Integration>, TillguardError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_ONE)
            .bind(store_id.as_uuid())
            .bind(provider.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(row.map(|w| w.0))
    }

    async fn upsert(&self, integration: Integration) -> Result<Integration, TillguardError> {
        let config = serde_json::to_string(&integration.config).map_err(StorageError::from)?;

        let row: Wrapper = sqlx::query_as(UPSERT)
            .bind(integration.id.as_uuid())
            .bind(integration.store_id.as_uuid())
            .bind(integration.provider.as_str())
            .bind(integration.status.as_str())
            .bind(integration.credentials_encrypted.as_deref())
            .bind(&config)
            .bind(integration.last_synced_at.map(encode_ts))
            .bind(encode_ts(integration.created_at))
            .bind(encode_ts(integration.updated_at))
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(row.0)
    }
}
