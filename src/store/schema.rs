//! Table layout of the measurement database.
//!
//! One flat table per technology, keyed by the acquisition timestamp in
//! milliseconds. No foreign keys: every table can be dropped and recreated
//! on its own.

use crate::cell::Technology;

/// Bumped whenever a table layout changes. A database at any other version
/// is reset on open.
pub const SCHEMA_VERSION: i64 = 4;

// GSM, LTE and WCDMA share a layout; `arfcn` holds ARFCN, EARFCN or UARFCN.
const CELL_COLUMNS: &str = "timestamp INTEGER PRIMARY KEY,
    cid INTEGER NOT NULL,
    lac INTEGER NOT NULL,
    mcc TEXT NOT NULL,
    mnc TEXT NOT NULL,
    arfcn INTEGER NOT NULL,
    signal_strength INTEGER NOT NULL,
    timing_advance INTEGER,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    captured_at INTEGER NOT NULL";

const CDMA_COLUMNS: &str = "timestamp INTEGER PRIMARY KEY,
    base_station_id INTEGER NOT NULL,
    network_id INTEGER NOT NULL,
    system_id INTEGER NOT NULL,
    signal_strength INTEGER NOT NULL,
    timing_advance INTEGER,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    captured_at INTEGER NOT NULL";

pub fn table(technology: Technology) -> &'static str {
    technology.as_str()
}

pub fn create_table(technology: Technology) -> String {
    let columns = match technology {
        Technology::Gsm | Technology::Lte | Technology::Wcdma => CELL_COLUMNS,
        Technology::Cdma => CDMA_COLUMNS,
    };
    format!("CREATE TABLE IF NOT EXISTS {} ({});", table(technology), columns)
}

pub fn drop_table(technology: Technology) -> String {
    format!("DROP TABLE IF EXISTS {};", table(technology))
}

pub fn insert(technology: Technology) -> String {
    match technology {
        Technology::Gsm | Technology::Lte | Technology::Wcdma => format!(
            "INSERT INTO {} (timestamp, cid, lac, mcc, mnc, arfcn, signal_strength, timing_advance,
                latitude, longitude, captured_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            table(technology)
        ),
        Technology::Cdma => format!(
            "INSERT INTO {} (timestamp, base_station_id, network_id, system_id, signal_strength,
                timing_advance, latitude, longitude, captured_at)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, ?7, ?8)",
            table(technology)
        ),
    }
}

/// Columns selected by [`select_by_timestamp`] and [`select_all`], in order.
pub fn select_columns(technology: Technology) -> &'static str {
    match technology {
        Technology::Gsm | Technology::Lte | Technology::Wcdma => {
            "timestamp, cid, lac, mcc, mnc, arfcn, signal_strength, timing_advance, latitude, longitude, captured_at"
        }
        Technology::Cdma => {
            "timestamp, base_station_id, network_id, system_id, signal_strength, latitude, longitude, captured_at"
        }
    }
}

pub fn select_by_timestamp(technology: Technology) -> String {
    format!(
        "SELECT {} FROM {} WHERE timestamp = ?1",
        select_columns(technology),
        table(technology)
    )
}

pub fn select_all(technology: Technology) -> String {
    format!(
        "SELECT {} FROM {} ORDER BY timestamp",
        select_columns(technology),
        table(technology)
    )
}

pub fn count(technology: Technology) -> String {
    format!("SELECT COUNT(*) FROM {}", table(technology))
}
