//! SQLite-backed storage engine.
//!
//! The three stores are three tables in one database file, so a single SQLite
//! transaction spans all of them.
//!
//! ## Serialisation
//!
//! The pool holds exactly one connection. `begin()` waits for it, so
//! transactions run one at a time and the allocator's decide-then-insert and
//! the ledger's decrement-if-sufficient cannot interleave. Waiting longer than
//! the acquire timeout surfaces as [`StorageError::Unavailable`].
//!
//! ## Blocking
//!
//! The engine owns a tokio runtime and blocks on it. Call it from a plain
//! thread (or `spawn_blocking`), never from inside an async task.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tokio::runtime::Runtime;

use carestock_core::{ActorId, ExpectedVersion, ItemId, MovementId, RecordId, SubjectId};
use carestock_inventory::{
    ItemDetails, MovementFilter, MovementKind, MovementRecord, NewMovement, QuantityChange,
    StockItem,
};
use carestock_registry::{Allocation, RecordPayload, RegistryRecord, Sex, UpdateOutcome};

use super::r#trait::{Storage, StorageError, StorageResult, StorageTx};
use crate::config::CoreConfig;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS registry_records (
        id          INTEGER PRIMARY KEY,
        given_name  TEXT    NOT NULL,
        family_name TEXT    NOT NULL,
        birth_date  TEXT    NULL,
        sex         TEXT    NULL,
        attributes  TEXT    NOT NULL DEFAULT '{}',
        version     INTEGER NOT NULL DEFAULT 1
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS stock_items (
        id         INTEGER PRIMARY KEY,
        name       TEXT    NOT NULL,
        category   TEXT    NOT NULL,
        quantity   INTEGER NOT NULL DEFAULT 0 CHECK (quantity >= 0),
        expires_on TEXT    NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS stock_movements (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        item_id     INTEGER NOT NULL REFERENCES stock_items(id),
        kind        TEXT    NOT NULL CHECK (kind IN ('RESTOCK', 'ISSUE', 'SERVICE')),
        quantity    INTEGER NOT NULL CHECK (quantity > 0),
        actor_id    INTEGER NOT NULL,
        subject_id  INTEGER NULL,
        occurred_at TEXT    NOT NULL,
        remark      TEXT    NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_stock_movements_item ON stock_movements(item_id)",
    "CREATE INDEX IF NOT EXISTS idx_stock_movements_kind ON stock_movements(kind)",
    "CREATE INDEX IF NOT EXISTS idx_stock_movements_subject ON stock_movements(subject_id)",
];

/// Identifier reuse rule as one statement: `1` if free, else the smallest
/// interior hole, else NULL (append after the maximum).
const CHOOSE_RECORD_ID: &str = r#"
    SELECT CASE
        WHEN NOT EXISTS (SELECT 1 FROM registry_records WHERE id = 1) THEN 1
        ELSE (
            SELECT MIN(r.id + 1)
            FROM registry_records r
            WHERE NOT EXISTS (SELECT 1 FROM registry_records n WHERE n.id = r.id + 1)
              AND r.id + 1 <= (SELECT MAX(id) FROM registry_records)
        )
    END
"#;

const SELECT_RECORD: &str = r#"
    SELECT id, given_name, family_name, birth_date, sex, attributes, version
    FROM registry_records
"#;

const SELECT_ITEM: &str = "SELECT id, name, category, quantity, expires_on FROM stock_items";

const SELECT_MOVEMENT: &str = r#"
    SELECT id, item_id, kind, quantity, actor_id, subject_id, occurred_at, remark
    FROM stock_movements
"#;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite storage engine.
#[derive(Debug)]
pub struct SqliteStorage {
    pool: SqlitePool,
    runtime: Runtime,
}

impl SqliteStorage {
    /// Open (creating if needed) the database named by the configuration.
    pub fn open(config: &CoreConfig) -> StorageResult<Self> {
        Self::connect(&config.database_url, config.acquire_timeout)
    }

    /// Connect and apply the schema. `sqlite::memory:` gives a private
    /// in-memory database that lives as long as this value.
    pub fn connect(url: &str, acquire_timeout: Duration) -> StorageResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("carestock-sqlite")
            .enable_all()
            .build()
            .map_err(|e| StorageError::Unavailable(format!("failed to start runtime: {e}")))?;

        let options = SqliteConnectOptions::from_str(url)
            .map_err(map_sqlx)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(acquire_timeout);

        // One long-lived connection: serialises transactions and keeps an
        // in-memory database alive.
        let pool = runtime
            .block_on(
                SqlitePoolOptions::new()
                    .min_connections(1)
                    .max_connections(1)
                    .acquire_timeout(acquire_timeout)
                    .idle_timeout(None::<Duration>)
                    .max_lifetime(None::<Duration>)
                    .connect_with(options),
            )
            .map_err(map_sqlx)?;

        runtime.block_on(async {
            for statement in SCHEMA {
                sqlx::query(statement).execute(&pool).await?;
            }
            Ok::<_, sqlx::Error>(())
        })
        .map_err(map_sqlx)?;

        tracing::info!(url, "sqlite storage ready");
        Ok(Self { pool, runtime })
    }
}

impl Storage for SqliteStorage {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StorageTx) -> Result<T, E>,
        E: From<StorageError>,
    {
        // Connections dropped during this scope hand themselves back to the
        // pool on this runtime.
        let _context = self.runtime.enter();

        let tx = self
            .runtime
            .block_on(self.pool.begin())
            .map_err(|e| E::from(map_sqlx(e)))?;

        let mut scoped = SqliteTx {
            tx,
            runtime: &self.runtime,
        };

        match work(&mut scoped) {
            Ok(value) => {
                self.runtime
                    .block_on(scoped.tx.commit())
                    .map_err(|e| E::from(map_sqlx(e)))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = self.runtime.block_on(scoped.tx.rollback()) {
                    tracing::error!(error = %rollback, "sqlite rollback failed");
                }
                Err(err)
            }
        }
    }
}

impl Drop for SqliteStorage {
    fn drop(&mut self) {
        self.runtime.block_on(self.pool.close());
    }
}

struct SqliteTx<'r> {
    tx: Transaction<'static, Sqlite>,
    runtime: &'r Runtime,
}

impl StorageTx for SqliteTx<'_> {
    fn record(&mut self, id: RecordId) -> StorageResult<Option<RegistryRecord>> {
        let conn = &mut *self.tx;
        let sql = format!("{SELECT_RECORD} WHERE id = ?1");
        let row = self
            .runtime
            .block_on(async {
                sqlx::query(&sql)
                    .bind(id.get())
                    .fetch_optional(&mut *conn)
                    .await
            })
            .map_err(map_sqlx)?;
        row.as_ref().map(record_from_row).transpose()
    }

    fn records(&mut self) -> StorageResult<Vec<RegistryRecord>> {
        let conn = &mut *self.tx;
        let sql = format!("{SELECT_RECORD} ORDER BY id");
        let rows = self
            .runtime
            .block_on(async { sqlx::query(&sql).fetch_all(&mut *conn).await })
            .map_err(map_sqlx)?;
        rows.iter().map(record_from_row).collect()
    }

    fn choose_record_id(&mut self) -> StorageResult<Allocation> {
        let conn = &mut *self.tx;
        let candidate: Option<i64> = self
            .runtime
            .block_on(async {
                sqlx::query_scalar::<_, Option<i64>>(CHOOSE_RECORD_ID)
                    .fetch_one(&mut *conn)
                    .await
            })
            .map_err(map_sqlx)?;

        Ok(match candidate {
            Some(id) => Allocation::Reuse(RecordId::from_raw(id)),
            None => Allocation::Sequential,
        })
    }

    fn insert_record(
        &mut self,
        id: Option<RecordId>,
        payload: &RecordPayload,
    ) -> StorageResult<RegistryRecord> {
        let attributes = serde_json::to_string(&payload.attributes)
            .map_err(|e| StorageError::Corrupt(format!("attributes: {e}")))?;
        let conn = &mut *self.tx;

        // A NULL id lets SQLite assign max(id) + 1.
        let assigned: i64 = self
            .runtime
            .block_on(async {
                sqlx::query_scalar::<_, i64>(
                    r#"
                    INSERT INTO registry_records
                        (id, given_name, family_name, birth_date, sex, attributes, version)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)
                    RETURNING id
                    "#,
                )
                .bind(id.map(RecordId::get))
                .bind(&payload.given_name)
                .bind(&payload.family_name)
                .bind(payload.birth_date.map(format_date))
                .bind(payload.sex.map(Sex::as_str))
                .bind(&attributes)
                .fetch_one(&mut *conn)
                .await
            })
            .map_err(map_sqlx)?;

        Ok(RegistryRecord::new(RecordId::from_raw(assigned), payload.clone()))
    }

    fn update_record(
        &mut self,
        id: RecordId,
        payload: &RecordPayload,
        expected: ExpectedVersion,
    ) -> StorageResult<UpdateOutcome> {
        let attributes = serde_json::to_string(&payload.attributes)
            .map_err(|e| StorageError::Corrupt(format!("attributes: {e}")))?;
        let conn = &mut *self.tx;

        let outcome = self
            .runtime
            .block_on(async {
                let current: Option<i64> =
                    sqlx::query_scalar("SELECT version FROM registry_records WHERE id = ?1")
                        .bind(id.get())
                        .fetch_optional(&mut *conn)
                        .await?;

                let Some(current) = current else {
                    return Ok(UpdateOutcome::NotFound);
                };
                let current = current as u64;
                if !expected.matches(current) {
                    return Ok(UpdateOutcome::VersionConflict { actual: current });
                }

                sqlx::query(
                    r#"
                    UPDATE registry_records
                    SET given_name = ?2, family_name = ?3, birth_date = ?4, sex = ?5,
                        attributes = ?6, version = version + 1
                    WHERE id = ?1
                    "#,
                )
                .bind(id.get())
                .bind(&payload.given_name)
                .bind(&payload.family_name)
                .bind(payload.birth_date.map(format_date))
                .bind(payload.sex.map(Sex::as_str))
                .bind(&attributes)
                .execute(&mut *conn)
                .await?;

                Ok::<_, sqlx::Error>(UpdateOutcome::Updated(RegistryRecord {
                    id,
                    version: current + 1,
                    payload: payload.clone(),
                }))
            })
            .map_err(map_sqlx)?;

        Ok(outcome)
    }

    fn delete_record(&mut self, id: RecordId) -> StorageResult<bool> {
        let conn = &mut *self.tx;
        let result = self
            .runtime
            .block_on(async {
                sqlx::query("DELETE FROM registry_records WHERE id = ?1")
                    .bind(id.get())
                    .execute(&mut *conn)
                    .await
            })
            .map_err(map_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    fn insert_item(&mut self, details: &ItemDetails) -> StorageResult<StockItem> {
        let conn = &mut *self.tx;
        let assigned: i64 = self
            .runtime
            .block_on(async {
                sqlx::query_scalar::<_, i64>(
                    r#"
                    INSERT INTO stock_items (name, category, quantity, expires_on)
                    VALUES (?1, ?2, 0, ?3)
                    RETURNING id
                    "#,
                )
                .bind(&details.name)
                .bind(&details.category)
                .bind(details.expires_on.map(format_date))
                .fetch_one(&mut *conn)
                .await
            })
            .map_err(map_sqlx)?;

        Ok(StockItem::from_details(ItemId::from_raw(assigned), details.clone()))
    }

    fn item(&mut self, id: ItemId) -> StorageResult<Option<StockItem>> {
        let conn = &mut *self.tx;
        let sql = format!("{SELECT_ITEM} WHERE id = ?1");
        let row = self
            .runtime
            .block_on(async {
                sqlx::query(&sql)
                    .bind(id.get())
                    .fetch_optional(&mut *conn)
                    .await
            })
            .map_err(map_sqlx)?;
        row.as_ref().map(item_from_row).transpose()
    }

    fn items(&mut self) -> StorageResult<Vec<StockItem>> {
        let conn = &mut *self.tx;
        let sql = format!("{SELECT_ITEM} ORDER BY id");
        let rows = self
            .runtime
            .block_on(async { sqlx::query(&sql).fetch_all(&mut *conn).await })
            .map_err(map_sqlx)?;
        rows.iter().map(item_from_row).collect()
    }

    fn update_item_details(&mut self, id: ItemId, details: &ItemDetails) -> StorageResult<bool> {
        let conn = &mut *self.tx;
        let result = self
            .runtime
            .block_on(async {
                sqlx::query(
                    r#"
                    UPDATE stock_items
                    SET name = ?2, category = ?3, expires_on = ?4
                    WHERE id = ?1
                    "#,
                )
                .bind(id.get())
                .bind(&details.name)
                .bind(&details.category)
                .bind(details.expires_on.map(format_date))
                .execute(&mut *conn)
                .await
            })
            .map_err(map_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    fn change_quantity(&mut self, id: ItemId, delta: i64) -> StorageResult<QuantityChange> {
        let conn = &mut *self.tx;
        self.runtime
            .block_on(async {
                // Check and write in one statement against the live row.
                let applied: Option<i64> = sqlx::query_scalar(
                    r#"
                    UPDATE stock_items
                    SET quantity = quantity + ?2
                    WHERE id = ?1
                      AND quantity + ?2 >= 0
                      AND (?2 <= 0 OR quantity <= 9223372036854775807 - ?2)
                    RETURNING quantity
                    "#,
                )
                .bind(id.get())
                .bind(delta)
                .fetch_optional(&mut *conn)
                .await?;

                if let Some(quantity) = applied {
                    return Ok(QuantityChange::Applied { quantity });
                }

                let available: Option<i64> =
                    sqlx::query_scalar("SELECT quantity FROM stock_items WHERE id = ?1")
                        .bind(id.get())
                        .fetch_optional(&mut *conn)
                        .await?;

                Ok::<_, sqlx::Error>(match available {
                    Some(available) if available.checked_add(delta).is_none() => {
                        QuantityChange::Overflow { available }
                    }
                    Some(available) => QuantityChange::Insufficient { available },
                    None => QuantityChange::UnknownItem,
                })
            })
            .map_err(map_sqlx)
    }

    fn append_movement(&mut self, movement: &NewMovement) -> StorageResult<MovementRecord> {
        let conn = &mut *self.tx;
        let assigned: i64 = self
            .runtime
            .block_on(async {
                sqlx::query_scalar::<_, i64>(
                    r#"
                    INSERT INTO stock_movements
                        (item_id, kind, quantity, actor_id, subject_id, occurred_at, remark)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    RETURNING id
                    "#,
                )
                .bind(movement.item_id.get())
                .bind(movement.kind.as_str())
                .bind(movement.quantity)
                .bind(movement.actor_id.get())
                .bind(movement.subject_id.map(SubjectId::get))
                .bind(format_timestamp(movement.occurred_at))
                .bind(movement.remark.as_deref())
                .fetch_one(&mut *conn)
                .await
            })
            .map_err(map_sqlx)?;

        Ok(movement.clone().into_record(MovementId::from_raw(assigned)))
    }

    fn movements(&mut self, filter: MovementFilter) -> StorageResult<Vec<MovementRecord>> {
        let sql = match filter {
            MovementFilter::All => SELECT_MOVEMENT.to_string(),
            MovementFilter::Item(_) => format!("{SELECT_MOVEMENT} WHERE item_id = ?1"),
            MovementFilter::Kind(_) => format!("{SELECT_MOVEMENT} WHERE kind = ?1"),
            MovementFilter::Subject(_) => format!("{SELECT_MOVEMENT} WHERE subject_id = ?1"),
        };

        let query = sqlx::query::<Sqlite>(&sql);
        let query = match filter {
            MovementFilter::All => query,
            MovementFilter::Item(id) => query.bind(id.get()),
            MovementFilter::Kind(kind) => query.bind(kind.as_str()),
            MovementFilter::Subject(id) => query.bind(id.get()),
        };

        let conn = &mut *self.tx;
        let rows = self
            .runtime
            .block_on(async { query.fetch_all(&mut *conn).await })
            .map_err(map_sqlx)?;
        rows.iter().map(movement_from_row).collect()
    }
}

fn map_sqlx(err: sqlx::Error) -> StorageError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StorageError::DuplicateKey(db.message().to_string())
        }
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::Decode(_)
        | sqlx::Error::TypeNotFound { .. } => StorageError::Corrupt(err.to_string()),
        _ => StorageError::Unavailable(err.to_string()),
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(column: &str, raw: Option<String>) -> StorageResult<Option<NaiveDate>> {
    raw.map(|s| {
        NaiveDate::parse_from_str(&s, DATE_FORMAT)
            .map_err(|e| StorageError::Corrupt(format!("{column} '{s}': {e}")))
    })
    .transpose()
}

/// Fixed-width UTC timestamps sort lexically in time order.
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt(format!("occurred_at '{raw}': {e}")))
}

fn record_from_row(row: &SqliteRow) -> StorageResult<RegistryRecord> {
    let attributes: String = row.try_get("attributes").map_err(map_sqlx)?;
    let sex: Option<String> = row.try_get("sex").map_err(map_sqlx)?;
    let version: i64 = row.try_get("version").map_err(map_sqlx)?;

    let payload = RecordPayload {
        given_name: row.try_get("given_name").map_err(map_sqlx)?,
        family_name: row.try_get("family_name").map_err(map_sqlx)?,
        birth_date: parse_date("birth_date", row.try_get("birth_date").map_err(map_sqlx)?)?,
        sex: sex
            .as_deref()
            .map(Sex::parse)
            .transpose()
            .map_err(|e| StorageError::Corrupt(e.to_string()))?,
        attributes: serde_json::from_str(&attributes)
            .map_err(|e| StorageError::Corrupt(format!("attributes: {e}")))?,
    };

    Ok(RegistryRecord {
        id: RecordId::from_raw(row.try_get("id").map_err(map_sqlx)?),
        version: version as u64,
        payload,
    })
}

fn item_from_row(row: &SqliteRow) -> StorageResult<StockItem> {
    Ok(StockItem {
        id: ItemId::from_raw(row.try_get("id").map_err(map_sqlx)?),
        name: row.try_get("name").map_err(map_sqlx)?,
        category: row.try_get("category").map_err(map_sqlx)?,
        quantity: row.try_get("quantity").map_err(map_sqlx)?,
        expires_on: parse_date("expires_on", row.try_get("expires_on").map_err(map_sqlx)?)?,
    })
}

fn movement_from_row(row: &SqliteRow) -> StorageResult<MovementRecord> {
    let kind: String = row.try_get("kind").map_err(map_sqlx)?;
    let occurred_at: String = row.try_get("occurred_at").map_err(map_sqlx)?;
    let subject_id: Option<i64> = row.try_get("subject_id").map_err(map_sqlx)?;

    Ok(MovementRecord {
        id: MovementId::from_raw(row.try_get("id").map_err(map_sqlx)?),
        item_id: ItemId::from_raw(row.try_get("item_id").map_err(map_sqlx)?),
        kind: kind
            .parse::<MovementKind>()
            .map_err(|e| StorageError::Corrupt(e.to_string()))?,
        quantity: row.try_get("quantity").map_err(map_sqlx)?,
        actor_id: ActorId::from_raw(row.try_get("actor_id").map_err(map_sqlx)?),
        subject_id: subject_id.map(SubjectId::from_raw),
        remark: row.try_get("remark").map_err(map_sqlx)?,
        occurred_at: parse_timestamp(&occurred_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> SqliteStorage {
        SqliteStorage::connect("sqlite::memory:", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn choose_record_id_follows_reuse_rule() {
        let store = memory();
        let rid = |v| RecordId::new(v).unwrap();

        let empty = store.transaction(|tx| tx.choose_record_id()).unwrap();
        assert_eq!(empty, Allocation::Reuse(rid(1)));

        store
            .transaction(|tx| {
                for id in [1, 2, 4] {
                    tx.insert_record(Some(rid(id)), &RecordPayload::new("A", "B"))?;
                }
                Ok::<_, StorageError>(())
            })
            .unwrap();
        let hole = store.transaction(|tx| tx.choose_record_id()).unwrap();
        assert_eq!(hole, Allocation::Reuse(rid(3)));

        store
            .transaction(|tx| tx.insert_record(Some(rid(3)), &RecordPayload::new("A", "B")))
            .unwrap();
        let full = store.transaction(|tx| tx.choose_record_id()).unwrap();
        assert_eq!(full, Allocation::Sequential);

        let appended = store
            .transaction(|tx| tx.insert_record(None, &RecordPayload::new("A", "B")))
            .unwrap();
        assert_eq!(appended.id, rid(5));
    }

    #[test]
    fn duplicate_id_maps_to_duplicate_key() {
        let store = memory();
        let id = RecordId::new(1).unwrap();
        store
            .transaction(|tx| tx.insert_record(Some(id), &RecordPayload::new("A", "B")))
            .unwrap();
        let err = store
            .transaction(|tx| tx.insert_record(Some(id), &RecordPayload::new("C", "D")))
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateKey(_)));
    }

    #[test]
    fn records_round_trip_payload_fields() {
        let store = memory();
        let payload = RecordPayload::new("Ada", "Lovelace")
            .with_birth_date(NaiveDate::from_ymd_opt(1940, 12, 10).unwrap())
            .with_sex(Sex::Female)
            .with_attribute("room", "12B");

        let inserted = store
            .transaction(|tx| tx.insert_record(None, &payload))
            .unwrap();
        let loaded = store
            .transaction(|tx| tx.record(inserted.id))
            .unwrap()
            .unwrap();
        assert_eq!(loaded, inserted);
    }

    #[test]
    fn conditional_decrement_reports_available_quantity() {
        let store = memory();
        let item = store
            .transaction(|tx| tx.insert_item(&ItemDetails::new("Gloves", "PPE")))
            .unwrap();

        let change = store
            .transaction(|tx| {
                tx.change_quantity(item.id, 2)?;
                tx.change_quantity(item.id, -3)
            })
            .unwrap();
        assert_eq!(change, QuantityChange::Insufficient { available: 2 });
    }

    #[test]
    fn conditional_increment_refuses_to_overflow() {
        let store = memory();
        let item = store
            .transaction(|tx| tx.insert_item(&ItemDetails::new("Gloves", "PPE")))
            .unwrap();

        let change = store
            .transaction(|tx| {
                tx.change_quantity(item.id, i64::MAX)?;
                tx.change_quantity(item.id, 1)
            })
            .unwrap();
        assert_eq!(change, QuantityChange::Overflow { available: i64::MAX });

        let stored = store.transaction(|tx| tx.item(item.id)).unwrap().unwrap();
        assert_eq!(stored.quantity, i64::MAX);
    }

    #[test]
    fn rollback_discards_all_tables() {
        let store = memory();
        let item = store
            .transaction(|tx| tx.insert_item(&ItemDetails::new("Gloves", "PPE")))
            .unwrap();

        let result: Result<(), StorageError> = store.transaction(|tx| {
            tx.change_quantity(item.id, 5)?;
            tx.insert_record(None, &RecordPayload::new("A", "B"))?;
            Err(StorageError::Unavailable("simulated".to_string()))
        });
        assert!(result.is_err());

        let (stored, records) = store
            .transaction(|tx| Ok::<_, StorageError>((tx.item(item.id)?, tx.records()?)))
            .unwrap();
        assert_eq!(stored.unwrap().quantity, 0);
        assert!(records.is_empty());
    }
}
