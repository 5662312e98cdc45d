//! # Serving Cell Sampler
//!
//! Picks the registered cell out of everything the radio layer can see and
//! normalizes it into a [`CellSample`].

use tracing::debug;

use super::radio::{RadioLayer, RawCellInfo, RawNetworkCodes, RawRadio};
use super::{CellSample, UNAVAILABLE, UNKNOWN_NETWORK_CODE};

/// Reads the serving cell the device is currently camped on.
#[cfg_attr(test, mockall::automock)]
pub trait CellSampler: Send + Sync {
    /// Returns `None` when no cell is registered, the radio layer fails, or
    /// the registered cell uses a technology that is not logged.
    fn read_serving_cell(&self) -> Option<CellSample>;
}

/// [`CellSampler`] backed by a platform [`RadioLayer`].
#[derive(Debug)]
pub struct RadioCellSampler<R> {
    radio: R,
}

impl<R: RadioLayer> RadioCellSampler<R> {
    pub fn new(radio: R) -> Self {
        Self { radio }
    }
}

impl<R: RadioLayer> CellSampler for RadioCellSampler<R> {
    fn read_serving_cell(&self) -> Option<CellSample> {
        let cells = match self.radio.all_cell_info() {
            Ok(cells) => cells,
            Err(e) => {
                debug!("Radio layer error: {}", e);
                return None;
            }
        };

        let Some(registered) = cells.into_iter().find(|cell| cell.registered) else {
            debug!("No registered cell");
            return None;
        };

        normalize(registered)
    }
}

/// Map a raw registered cell onto its [`CellSample`] variant.
///
/// Unsupported technologies yield `None`.
pub fn normalize(info: RawCellInfo) -> Option<CellSample> {
    match info.radio {
        RawRadio::Gsm { cid, lac, arfcn, codes, dbm, timing_advance } => {
            let (mcc, mnc) = network_codes(&codes);
            Some(CellSample::Gsm {
                cid,
                lac,
                mcc,
                mnc,
                arfcn,
                signal_dbm: dbm,
                timing_advance,
            })
        }
        RawRadio::Lte { ci, tac, earfcn, codes, dbm, timing_advance } => {
            let (mcc, mnc) = network_codes(&codes);
            Some(CellSample::Lte {
                ci,
                tac,
                mcc,
                mnc,
                earfcn,
                signal_dbm: dbm,
                timing_advance,
            })
        }
        RawRadio::Wcdma { cid, lac, uarfcn, codes, dbm } => {
            let (mcc, mnc) = network_codes(&codes);
            Some(CellSample::Wcdma {
                cid,
                lac,
                mcc,
                mnc,
                uarfcn,
                signal_dbm: dbm,
            })
        }
        RawRadio::Cdma { base_station_id, network_id, system_id, dbm } => Some(CellSample::Cdma {
            base_station_id,
            network_id,
            system_id,
            signal_dbm: dbm,
        }),
        RawRadio::Nr { .. } | RawRadio::Unknown => {
            debug!("Registered cell technology is not logged");
            None
        }
    }
}

fn network_codes(codes: &RawNetworkCodes) -> (String, String) {
    (
        code_string(codes.mcc_string.as_deref(), codes.mcc),
        code_string(codes.mnc_string.as_deref(), codes.mnc),
    )
}

// String form wins; the legacy integer drops leading zeros of the MNC.
fn code_string(string_form: Option<&str>, legacy: i32) -> String {
    match string_form {
        Some(code) if !code.is_empty() => code.to_string(),
        _ if legacy != UNAVAILABLE && legacy >= 0 => legacy.to_string(),
        _ => UNKNOWN_NETWORK_CODE.to_string(),
    }
}
