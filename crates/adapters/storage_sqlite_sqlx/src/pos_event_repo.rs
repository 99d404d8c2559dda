//! `SQLite` implementation of [`PosEventStore`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use tillguard_app::ports::PosEventStore;
use tillguard_domain::error::TillguardError;
use tillguard_domain::id::{PosEventId, StoreId};
use tillguard_domain::pos_event::{EventQuery, PosEvent};
use tillguard_domain::time::Timestamp;

use crate::codec::{decode_err, encode_ts, json, parsed, ts};
use crate::error::StorageError;

struct Wrapper(PosEvent);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let store_id: uuid::Uuid = row.try_get("store_id")?;
        let score: i64 = row.try_get("anomaly_score")?;

        Ok(Self(PosEvent {
            id: PosEventId::from_uuid(id),
            store_id: StoreId::from_uuid(store_id),
            provider: parsed(row, "provider")?,
            external_id: row.try_get("external_id")?,
            event_type: parsed(row, "event_type")?,
            occurred_at: ts(row, "occurred_at")?,
            amount_cents: row.try_get("amount_cents")?,
            employee_id: row.try_get("employee_id")?,
            location_id: row.try_get("location_id")?,
            severity: parsed(row, "severity")?,
            anomaly_score: u8::try_from(score).map_err(decode_err)?,
            flagged: row.try_get("flagged")?,
            reasons: json(row, "reasons")?,
        }))
    }
}

// a re-synced event keeps its first score
const INSERT_IGNORE: &str = r"
    INSERT INTO pos_events
        (id, store_id, provider, external_id, event_type, occurred_at, amount_cents,
         employee_id, location_id, severity, anomaly_score, flagged, reasons)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (store_id, provider, external_id) DO NOTHING
";

const SELECT_SINCE: &str = r"
    SELECT * FROM pos_events
    WHERE store_id = ? AND occurred_at >= ?
    ORDER BY occurred_at
";

const SELECT_PAGE: &str = r"
    SELECT * FROM pos_events
    WHERE store_id = ?
      AND (? IS NULL OR provider = ?)
      AND (? = 0 OR flagged = 1)
    ORDER BY occurred_at DESC, rowid DESC
    LIMIT ? OFFSET ?
";

/// `SQLite`-backed POS event store.
pub struct SqlitePosEventStore {
    pool: SqlitePool,
}

impl SqlitePosEventStore {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl PosEventStore for SqlitePosEventStore {
    async fn store_batch(&self, events: Vec<PosEvent>) -> Result<usize, TillguardError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
        let mut inserted = 0;

        for event in &events {
            let reasons = serde_json::to_string(&event.reasons).map_err(StorageError::from)?;
            let result = sqlx::query(INSERT_IGNORE)
                .bind(event.id.as_uuid())
                .bind(event.store_id.as_uuid())
                .bind(event.provider.as_str())
                .bind(&event.external_id)
                .bind(event.event_type.as_str())
                .bind(encode_ts(event.occurred_at))
                .bind(event.amount_cents)
                .bind(event.employee_id.as_deref())
                .bind(event.location_id.as_deref())
                .bind(event.severity.as_str())
                .bind(i64::from(event.anomaly_score))
                .bind(event.flagged)
                .bind(&reasons)
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;
            if result.rows_affected() > 0 {
                inserted += 1;
            }
        }

        tx.commit().await.map_err(StorageError::from)?;
        Ok(inserted)
    }

    async fn recent_for_store(
        &self,
        store_id: StoreId,
        since: Timestamp,
    ) -> Result<Vec<PosEvent>, TillguardError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_SINCE)
            .bind(store_id.as_uuid())
            .bind(encode_ts(since))
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn list(&self, store_id: StoreId, query: EventQuery) -> Result<Vec<PosEvent>, TillguardError> {
        let provider = query.provider.map(|p| p.as_str());
        let limit = i64::try_from(query.page.limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(query.page.offset).unwrap_or(i64::MAX);

        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_PAGE)
            .bind(store_id.as_uuid())
            .bind(provider)
            .bind(provider)
            .bind(query.flagged_only)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}
