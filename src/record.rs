//! Accepted measurement: one fix paired with the serving cell seen at that moment.

use chrono::SubsecRound;

use crate::cell::{CellSample, Technology};
use crate::location::Fix;

/// A sample the filter accepted for persistence.
///
/// `timestamp` is the fix's capture time in milliseconds since the Unix
/// epoch and is the record's key inside its technology partition. The
/// fix's `captured_at` is truncated to the same millisecond, which is the
/// resolution the store keeps.
///
/// The key comes from the fix, not from the clock at write time. Two loops
/// that accept the same provider fix for the same technology therefore
/// produce the same key, and the second append is rejected as a duplicate.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
    pub timestamp: i64,
    pub cell: CellSample,
    pub fix: Fix,
}

impl MeasurementRecord {
    pub fn new(cell: CellSample, mut fix: Fix) -> Self {
        fix.captured_at = fix.captured_at.trunc_subsecs(3);
        Self {
            timestamp: fix.captured_at.timestamp_millis(),
            cell,
            fix,
        }
    }

    pub fn technology(&self) -> Technology {
        self.cell.technology()
    }
}
