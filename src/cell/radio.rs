//! Raw radio-layer records and the trait a platform telephony backend implements.

use serde::{Deserialize, Serialize};

use crate::error::RadioError;

use super::UNAVAILABLE;

fn unavailable() -> i32 {
    UNAVAILABLE
}

/// Network codes as the platform exposes them.
///
/// Newer platforms hand out decimal strings (which keep leading zeros),
/// older ones only the legacy integers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawNetworkCodes {
    #[serde(default)]
    pub mcc_string: Option<String>,
    #[serde(default)]
    pub mnc_string: Option<String>,
    #[serde(default = "unavailable")]
    pub mcc: i32,
    #[serde(default = "unavailable")]
    pub mnc: i32,
}

/// One visible cell, as enumerated by the radio layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCellInfo {
    /// Whether the device is camped on this cell
    pub registered: bool,
    #[serde(flatten)]
    pub radio: RawRadio,
}

/// Technology-specific payload of a [`RawCellInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RawRadio {
    Gsm {
        cid: i32,
        lac: i32,
        #[serde(default = "unavailable")]
        arfcn: i32,
        #[serde(flatten)]
        codes: RawNetworkCodes,
        dbm: i32,
        #[serde(default = "unavailable")]
        timing_advance: i32,
    },
    Lte {
        ci: i32,
        tac: i32,
        #[serde(default = "unavailable")]
        earfcn: i32,
        #[serde(flatten)]
        codes: RawNetworkCodes,
        dbm: i32,
        #[serde(default = "unavailable")]
        timing_advance: i32,
    },
    Wcdma {
        cid: i32,
        lac: i32,
        #[serde(default = "unavailable")]
        uarfcn: i32,
        #[serde(flatten)]
        codes: RawNetworkCodes,
        dbm: i32,
    },
    Cdma {
        base_station_id: i32,
        network_id: i32,
        system_id: i32,
        dbm: i32,
    },
    /// 5G NR: visible to the radio layer but not logged
    Nr {
        #[serde(default)]
        nci: i64,
    },
    #[serde(other)]
    Unknown,
}

/// Platform telephony backend: enumerates every currently visible cell.
#[cfg_attr(test, mockall::automock)]
pub trait RadioLayer: Send + Sync {
    fn all_cell_info(&self) -> std::result::Result<Vec<RawCellInfo>, RadioError>;
}
