//! # Measurement Store
//!
//! Append-only SQLite persistence of accepted samples.
//!
//! This module handles:
//! - One partition (table) per technology, keyed by timestamp
//! - Writing each record inside its own transaction
//! - Row counts per partition for display
//! - Resetting every partition at once
//!
//! A second record with an already-stored timestamp is rejected with
//! [`StoreError::DuplicateTimestamp`]; the stored row is left as it was.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use tracing::{debug, info};

use crate::cell::{CellSample, Technology};
use crate::error::StoreError;
use crate::location::Fix;
use crate::record::MeasurementRecord;

pub mod schema;

/// SQLite row id of an appended record (equal to its timestamp).
pub type RowId = i64;

/// How long a writer waits on a database locked by another connection
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Persistence of accepted measurements.
#[cfg_attr(test, mockall::automock)]
pub trait MeasurementStore: Send + Sync {
    /// Write `record` into its technology's partition, all or nothing.
    fn append(&self, record: &MeasurementRecord) -> std::result::Result<RowId, StoreError>;

    /// Row count of every partition.
    fn count_all(&self) -> std::result::Result<BTreeMap<Technology, u64>, StoreError>;

    /// Drop and recreate every partition, in a single transaction.
    fn clear_all(&self) -> std::result::Result<(), StoreError>;
}

/// [`MeasurementStore`] on a single SQLite connection.
///
/// Share it between loops behind an `Arc`; the connection mutex serializes
/// writers within the process and each append is its own transaction.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) the database file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> std::result::Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        info!("Opened measurement database at {}", path.as_ref().display());
        Self::with_connection(conn)
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory() -> std::result::Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(mut conn: Connection) -> std::result::Result<Self, StoreError> {
        initialize_schema(&mut conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> std::result::Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Read back the record stored under `timestamp` in `technology`'s partition.
    pub fn get(
        &self,
        technology: Technology,
        timestamp: i64,
    ) -> std::result::Result<Option<MeasurementRecord>, StoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(&schema::select_by_timestamp(technology), params![timestamp], |row| {
                read_row(technology, row)
            })
            .optional()?;

        row.map(StoredRow::into_record).transpose()
    }

    /// Every record of a partition, oldest first.
    pub fn records(&self, technology: Technology) -> std::result::Result<Vec<MeasurementRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&schema::select_all(technology))?;
        let rows = stmt.query_map([], |row| read_row(technology, row))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }
}

impl MeasurementStore for SqliteStore {
    fn append(&self, record: &MeasurementRecord) -> std::result::Result<RowId, StoreError> {
        let technology = record.technology();
        let mut conn = self.lock()?;

        // Dropping `tx` without commit rolls the insert back
        let tx = conn.transaction()?;
        let inserted = insert_record(&tx, record);

        match inserted {
            Ok(_) => {
                let row_id = tx.last_insert_rowid();
                tx.commit()?;
                debug!("Stored {} record {}", technology, record.timestamp);
                Ok(row_id)
            }
            Err(rusqlite::Error::SqliteFailure(err, _)) if err.code == ErrorCode::ConstraintViolation => {
                Err(StoreError::DuplicateTimestamp { technology, timestamp: record.timestamp })
            }
            Err(err) => Err(err.into()),
        }
    }

    fn count_all(&self) -> std::result::Result<BTreeMap<Technology, u64>, StoreError> {
        let conn = self.lock()?;
        let mut counts = BTreeMap::new();
        for technology in Technology::ALL {
            let count: i64 = conn.query_row(&schema::count(technology), [], |row| row.get(0))?;
            counts.insert(technology, count.max(0) as u64);
        }
        Ok(counts)
    }

    fn clear_all(&self) -> std::result::Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for technology in Technology::ALL {
            tx.execute_batch(&schema::drop_table(technology))?;
            tx.execute_batch(&schema::create_table(technology))?;
        }
        tx.commit()?;
        info!("Dropped and recreated all measurement tables");
        Ok(())
    }
}

fn initialize_schema(conn: &mut Connection) -> std::result::Result<(), StoreError> {
    let tx = conn.transaction()?;
    let version: i64 = tx.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if version != schema::SCHEMA_VERSION {
        if version != 0 {
            info!(
                "Measurement schema version {} differs from {}, resetting tables",
                version,
                schema::SCHEMA_VERSION
            );
        }
        for technology in Technology::ALL {
            tx.execute_batch(&schema::drop_table(technology))?;
        }
        tx.pragma_update(None, "user_version", schema::SCHEMA_VERSION)?;
    }

    for technology in Technology::ALL {
        tx.execute_batch(&schema::create_table(technology))?;
    }
    tx.commit()?;
    Ok(())
}

fn insert_record(conn: &Connection, record: &MeasurementRecord) -> rusqlite::Result<usize> {
    let sql = schema::insert(record.technology());
    let fix = &record.fix;
    let captured_at = fix.captured_at.timestamp_millis();

    match &record.cell {
        CellSample::Gsm { cid, lac, mcc, mnc, arfcn, signal_dbm, timing_advance } => conn.execute(
            &sql,
            params![
                record.timestamp,
                cid,
                lac,
                mcc,
                mnc,
                arfcn,
                signal_dbm,
                Some(*timing_advance),
                fix.latitude,
                fix.longitude,
                captured_at
            ],
        ),
        CellSample::Lte { ci, tac, mcc, mnc, earfcn, signal_dbm, timing_advance } => conn.execute(
            &sql,
            params![
                record.timestamp,
                ci,
                tac,
                mcc,
                mnc,
                earfcn,
                signal_dbm,
                Some(*timing_advance),
                fix.latitude,
                fix.longitude,
                captured_at
            ],
        ),
        CellSample::Wcdma { cid, lac, mcc, mnc, uarfcn, signal_dbm } => conn.execute(
            &sql,
            params![
                record.timestamp,
                cid,
                lac,
                mcc,
                mnc,
                uarfcn,
                signal_dbm,
                None::<i32>,
                fix.latitude,
                fix.longitude,
                captured_at
            ],
        ),
        CellSample::Cdma { base_station_id, network_id, system_id, signal_dbm } => conn.execute(
            &sql,
            params![
                record.timestamp,
                base_station_id,
                network_id,
                system_id,
                signal_dbm,
                fix.latitude,
                fix.longitude,
                captured_at
            ],
        ),
    }
}

/// Row as read from SQLite, before the capture time is validated.
struct StoredRow {
    timestamp: i64,
    cell: CellSample,
    latitude: f64,
    longitude: f64,
    captured_at_ms: i64,
}

impl StoredRow {
    fn into_record(self) -> std::result::Result<MeasurementRecord, StoreError> {
        let captured_at = Utc
            .timestamp_millis_opt(self.captured_at_ms)
            .single()
            .ok_or_else(|| StoreError::InvalidRow(format!("captured_at {} out of range", self.captured_at_ms)))?;

        Ok(MeasurementRecord {
            timestamp: self.timestamp,
            cell: self.cell,
            fix: Fix::new(self.latitude, self.longitude, captured_at),
        })
    }
}

fn read_row(technology: Technology, row: &Row<'_>) -> rusqlite::Result<StoredRow> {
    let (cell, next): (CellSample, usize) = match technology {
        Technology::Gsm => (
            CellSample::Gsm {
                cid: row.get(1)?,
                lac: row.get(2)?,
                mcc: row.get(3)?,
                mnc: row.get(4)?,
                arfcn: row.get(5)?,
                signal_dbm: row.get(6)?,
                timing_advance: row.get(7)?,
            },
            8,
        ),
        Technology::Lte => (
            CellSample::Lte {
                ci: row.get(1)?,
                tac: row.get(2)?,
                mcc: row.get(3)?,
                mnc: row.get(4)?,
                earfcn: row.get(5)?,
                signal_dbm: row.get(6)?,
                timing_advance: row.get(7)?,
            },
            8,
        ),
        Technology::Wcdma => (
            CellSample::Wcdma {
                cid: row.get(1)?,
                lac: row.get(2)?,
                mcc: row.get(3)?,
                mnc: row.get(4)?,
                uarfcn: row.get(5)?,
                signal_dbm: row.get(6)?,
            },
            8,
        ),
        Technology::Cdma => (
            CellSample::Cdma {
                base_station_id: row.get(1)?,
                network_id: row.get(2)?,
                system_id: row.get(3)?,
                signal_dbm: row.get(4)?,
            },
            5,
        ),
    };

    Ok(StoredRow {
        timestamp: row.get(0)?,
        cell,
        latitude: row.get(next)?,
        longitude: row.get(next + 1)?,
        captured_at_ms: row.get(next + 2)?,
    })
}
