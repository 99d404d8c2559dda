//! `SQLite` implementation of [`IntegrationLogRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use tillguard_app::ports::IntegrationLogRepository;
use tillguard_domain::error::TillguardError;
use tillguard_domain::id::{LogId, StoreId};
use tillguard_domain::integration_log::{IntegrationLog, Page};
use tillguard_domain::provider::Provider;

use crate::codec::{encode_ts, json, parsed, ts};
use crate::error::StorageError;

struct Wrapper(IntegrationLog);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let store_id: uuid::Uuid = row.try_get("store_id")?;

        Ok(Self(IntegrationLog {
            id: LogId::from_uuid(id),
            store_id: StoreId::from_uuid(store_id),
            provider: parsed(row, "provider")?,
            timestamp: ts(row, "timestamp")?,
            level: parsed(row, "level")?,
            message: row.try_get("message")?,
            details: json(row, "details")?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO integration_logs (id, store_id, provider, timestamp, level, message, details)
    VALUES (?, ?, ?, ?, ?, ?, ?)
";

const SELECT_PAGE: &str = r"
    SELECT * FROM integration_logs
    WHERE store_id = ? AND (? IS NULL OR provider = ?)
    ORDER BY timestamp DESC, rowid DESC
    LIMIT ? OFFSET ?
";

/// `SQLite`-backed integration log.
pub struct SqliteIntegrationLogRepository {
    pool: SqlitePool,
}

impl SqliteIntegrationLogRepository {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl IntegrationLogRepository for SqliteIntegrationLogRepository {
    async fn append(&self, log: IntegrationLog) -> Result<IntegrationLog, TillguardError> {
        let details = serde_json::to_string(&log.details).map_err(StorageError::from)?;

        sqlx::query(INSERT)
            .bind(log.id.as_uuid())
            .bind(log.store_id.as_uuid())
            .bind(log.provider.as_str())
            .bind(encode_ts(log.timestamp))
            .bind(log.level.as_str())
            .bind(&log.message)
            .bind(&details)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(log)
    }

    async fn list(
        &self,
        store_id: StoreId,
        provider: Option<Provider>,
        page: Page,
    ) -> Result<Vec<IntegrationLog>, TillguardError> {
        let provider = provider.map(Provider::as_str);
        let limit = i64::try_from(page.limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(page.offset).unwrap_or(i64::MAX);

        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_PAGE)
            .bind(store_id.as_uuid())
            .bind(provider)
            .bind(provider)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}
