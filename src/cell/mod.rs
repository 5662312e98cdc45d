//! # Cell Module
//!
//! Serving-cell identity and signal metrics.
//!
//! This module handles:
//! - The normalized [`CellSample`] shared by the filter and the store
//! - Raw radio-layer records as the platform reports them ([`radio`])
//! - Selecting and normalizing the registered cell ([`sampler`])

use std::fmt;

pub mod radio;
pub mod sampler;

/// Value the radio layer reports for any integer field it has not resolved.
///
/// For timing advance this means the radio has not measured an advance yet.
pub const UNAVAILABLE: i32 = i32::MAX;

/// Placeholder stored when neither string nor numeric MCC/MNC is known.
pub const UNKNOWN_NETWORK_CODE: &str = "Unknown";

/// Radio access technology of a serving cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Technology {
    Gsm,
    Lte,
    Wcdma,
    Cdma,
}

impl Technology {
    /// Every technology, in partition order.
    pub const ALL: [Technology; 4] = [
        Technology::Gsm,
        Technology::Lte,
        Technology::Wcdma,
        Technology::Cdma,
    ];

    /// Short upper-case name, also used as the storage partition name.
    pub fn as_str(self) -> &'static str {
        match self {
            Technology::Gsm => "GSM",
            Technology::Lte => "LTE",
            Technology::Wcdma => "WCDMA",
            Technology::Cdma => "CDMA",
        }
    }
}

impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity and signal metrics of the registered cell, one variant per technology.
///
/// Fields never cross between variants: a WCDMA reading has no timing
/// advance, a CDMA reading has no MCC/MNC (its `system_id` plays that role).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellSample {
    Gsm {
        cid: i32,
        lac: i32,
        mcc: String,
        mnc: String,
        arfcn: i32,
        signal_dbm: i32,
        timing_advance: i32,
    },
    Lte {
        ci: i32,
        tac: i32,
        mcc: String,
        mnc: String,
        earfcn: i32,
        signal_dbm: i32,
        timing_advance: i32,
    },
    Wcdma {
        cid: i32,
        lac: i32,
        mcc: String,
        mnc: String,
        uarfcn: i32,
        signal_dbm: i32,
    },
    Cdma {
        base_station_id: i32,
        network_id: i32,
        system_id: i32,
        signal_dbm: i32,
    },
}

impl CellSample {
    pub fn technology(&self) -> Technology {
        match self {
            CellSample::Gsm { .. } => Technology::Gsm,
            CellSample::Lte { .. } => Technology::Lte,
            CellSample::Wcdma { .. } => Technology::Wcdma,
            CellSample::Cdma { .. } => Technology::Cdma,
        }
    }

    /// Timing advance, for the technologies that report one.
    pub fn timing_advance(&self) -> Option<i32> {
        match self {
            CellSample::Gsm { timing_advance, .. } | CellSample::Lte { timing_advance, .. } => {
                Some(*timing_advance)
            }
            CellSample::Wcdma { .. } | CellSample::Cdma { .. } => None,
        }
    }

    pub fn signal_dbm(&self) -> i32 {
        match self {
            CellSample::Gsm { signal_dbm, .. }
            | CellSample::Lte { signal_dbm, .. }
            | CellSample::Wcdma { signal_dbm, .. }
            | CellSample::Cdma { signal_dbm, .. } => *signal_dbm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gsm(timing_advance: i32) -> CellSample {
        CellSample::Gsm {
            cid: 1,
            lac: 2,
            mcc: "230".to_string(),
            mnc: "01".to_string(),
            arfcn: 60,
            signal_dbm: -70,
            timing_advance,
        }
    }

    #[test]
    fn test_technology_names() {
        assert_eq!(Technology::Gsm.to_string(), "GSM");
        assert_eq!(Technology::Lte.to_string(), "LTE");
        assert_eq!(Technology::Wcdma.to_string(), "WCDMA");
        assert_eq!(Technology::Cdma.to_string(), "CDMA");
    }

    #[test]
    fn test_timing_advance_only_for_gsm_and_lte() {
        assert_eq!(gsm(5).timing_advance(), Some(5));

        let wcdma = CellSample::Wcdma {
            cid: 1,
            lac: 2,
            mcc: "230".to_string(),
            mnc: "03".to_string(),
            uarfcn: 10700,
            signal_dbm: -90,
        };
        assert_eq!(wcdma.timing_advance(), None);

        let cdma = CellSample::Cdma {
            base_station_id: 7,
            network_id: 8,
            system_id: 9,
            signal_dbm: -95,
        };
        assert_eq!(cdma.timing_advance(), None);
        assert_eq!(cdma.technology(), Technology::Cdma);
        assert_eq!(cdma.signal_dbm(), -95);
    }

    #[test]
    fn test_all_is_ordered() {
        let mut sorted = Technology::ALL;
        sorted.sort();
        assert_eq!(sorted, Technology::ALL);
    }
}
