use shared::{QualityRecord, SearchCriteria, StoredRecord};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::search;

/// The database URL used when nothing is configured
pub const DEFAULT_DATABASE_URL: &str = "sqlite:color_quality.db";

const SELECT_ALL_COLUMNS: &str = r#"
    SELECT id, color_code, date, tank, batch, tsc, viscosity, dl, da, db,
           strength, disposition, remarks, batch_pigment, adjustments, color_group
    FROM quality_data
"#;

/// DbConnection owns the single connection to the quality database.
///
/// The pool is capped at one connection, so every statement runs on the same
/// connection, one at a time. Each statement commits on its own.
#[derive(Clone)]
pub struct DbConnection {
    pool: Arc<SqlitePool>,
}

impl DbConnection {
    /// Open (creating if missing) the database at `url` and ensure the schema exists
    pub async fn new(url: &str) -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // Keep the one connection alive for the life of the store; an in-memory
        // database disappears with its connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await?;

        Self::setup_schema(&pool).await?;
        info!("Opened quality database at {}", url);

        Ok(Self { pool: Arc::new(pool) })
    }

    /// Initialize a private in-memory database for tests
    #[cfg(test)]
    pub async fn init_test() -> StorageResult<Self> {
        Self::new("sqlite::memory:").await
    }

    /// Create the quality_data table if it doesn't exist
    pub async fn setup_schema(pool: &SqlitePool) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS quality_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                color_code TEXT,
                date TEXT,
                tank TEXT,
                batch TEXT,
                tsc REAL,
                viscosity REAL,
                dl REAL,
                da REAL,
                db REAL,
                strength REAL,
                disposition TEXT,
                remarks TEXT,
                batch_pigment TEXT,
                adjustments TEXT,
                color_group TEXT
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Get the underlying SQLite pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the connection. Further calls on any clone of this handle fail.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Closed quality database");
    }

    /// Store a new record and return the identifier assigned to it
    pub async fn insert_record(&self, record: &QualityRecord) -> StorageResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO quality_data
                (color_code, date, tank, batch, tsc, viscosity, dl, da, db,
                 strength, disposition, remarks, batch_pigment, adjustments, color_group)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.color_code.as_str())
        .bind(&record.date)
        .bind(&record.tank)
        .bind(&record.batch)
        .bind(record.tsc)
        .bind(record.viscosity)
        .bind(record.dl)
        .bind(record.da)
        .bind(record.db)
        .bind(record.strength)
        .bind(record.disposition.as_str())
        .bind(&record.remarks)
        .bind(&record.batch_pigment)
        .bind(&record.adjustments)
        .bind(&record.color_group)
        .execute(&*self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!("Inserted quality record {}", id);
        Ok(id)
    }

    /// Overwrite every field of the record with `id`.
    /// Returns the number of rows changed: 0 when no record has that id.
    pub async fn update_record(&self, id: i64, record: &QualityRecord) -> StorageResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE quality_data SET
                color_code = ?, date = ?, tank = ?, batch = ?, tsc = ?, viscosity = ?,
                dl = ?, da = ?, db = ?, strength = ?, disposition = ?, remarks = ?,
                batch_pigment = ?, adjustments = ?, color_group = ?
            WHERE id = ?
            "#,
        )
        .bind(record.color_code.as_str())
        .bind(&record.date)
        .bind(&record.tank)
        .bind(&record.batch)
        .bind(record.tsc)
        .bind(record.viscosity)
        .bind(record.dl)
        .bind(record.da)
        .bind(record.db)
        .bind(record.strength)
        .bind(record.disposition.as_str())
        .bind(&record.remarks)
        .bind(&record.batch_pigment)
        .bind(&record.adjustments)
        .bind(&record.color_group)
        .bind(id)
        .execute(&*self.pool)
        .await?;

        debug!("Updated quality record {} ({} rows)", id, result.rows_affected());
        Ok(result.rows_affected())
    }

    /// Delete the record with `id`. Returns false if there was none.
    pub async fn delete_record(&self, id: i64) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM quality_data WHERE id = ?")
            .bind(id)
            .execute(&*self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Retrieve a single record by id
    pub async fn get_record(&self, id: i64) -> StorageResult<Option<StoredRecord>> {
        let sql = format!("{} WHERE id = ?", SELECT_ALL_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&*self.pool)
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    /// List every record in id order
    pub async fn list_records(&self) -> StorageResult<Vec<StoredRecord>> {
        let sql = format!("{} ORDER BY id ASC", SELECT_ALL_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&*self.pool).await?;

        rows.iter().map(record_from_row).collect()
    }

    /// List the records matching every condition in `criteria`, in id order
    pub async fn search_records(
        &self,
        criteria: &SearchCriteria,
    ) -> StorageResult<Vec<StoredRecord>> {
        let compiled = search::compile(criteria)?;
        if compiled.is_empty() {
            debug!("Empty search criteria, matching all records");
        }

        let mut builder = QueryBuilder::<Sqlite>::new(SELECT_ALL_COLUMNS);
        compiled.push_where(&mut builder);
        builder.push(" ORDER BY id ASC");

        let rows = builder.build().fetch_all(&*self.pool).await?;
        rows.iter().map(record_from_row).collect()
    }
}

fn record_from_row(row: &SqliteRow) -> StorageResult<StoredRecord> {
    let color_code: String = row.try_get("color_code")?;
    let disposition: String = row.try_get("disposition")?;

    Ok(StoredRecord {
        id: row.try_get("id")?,
        record: QualityRecord {
            color_code: color_code.parse().map_err(|_| StorageError::Decode {
                column: "color_code",
                value: color_code.clone(),
            })?,
            date: row.try_get("date")?,
            tank: row.try_get("tank")?,
            batch: row.try_get("batch")?,
            tsc: row.try_get("tsc")?,
            viscosity: row.try_get("viscosity")?,
            dl: row.try_get("dl")?,
            da: row.try_get("da")?,
            db: row.try_get("db")?,
            strength: row.try_get("strength")?,
            disposition: disposition.parse().map_err(|_| StorageError::Decode {
                column: "disposition",
                value: disposition.clone(),
            })?,
            remarks: row.try_get("remarks")?,
            batch_pigment: row.try_get("batch_pigment")?,
            adjustments: row.try_get("adjustments")?,
            color_group: row.try_get("color_group")?,
        },
    })
}
