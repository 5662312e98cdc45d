//! # Sample Filter
//!
//! Decides whether a (fix, cell) pair is worth persisting.
//!
//! Two gates, checked in this order:
//!
//! 1. **Timing advance** (GSM/LTE only): the value must lie in `[0, i32::MAX)`.
//!    The sentinel means the radio has not resolved an advance yet, so the
//!    sample is rejected as stale whatever the distance, and the caller
//!    should nudge the network.
//! 2. **Displacement**: the fix must be at least the technology's minimum
//!    distance away from the last accepted fix. With no previous fix the
//!    distance is unbounded.

use tracing::debug;

use crate::cell::{CellSample, Technology, UNAVAILABLE};
use crate::config::FilterConfig;
use crate::location::Fix;
use crate::record::MeasurementRecord;

/// Outcome of [`SampleFilter::evaluate`].
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Accept(MeasurementRecord),
    Reject(RejectReason),
}

impl Decision {
    /// Only a stale radio state warrants a nudge; standing still does not.
    pub fn wants_nudge(&self) -> bool {
        matches!(self, Decision::Reject(RejectReason::StaleRadioState { .. }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RejectReason {
    /// Timing advance outside `[0, i32::MAX)`
    StaleRadioState { timing_advance: i32 },
    /// Not far enough from the last accepted fix
    InsufficientDisplacement { distance_m: f64, threshold_m: f64 },
}

/// Per-technology displacement gate plus timing-advance gate.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleFilter {
    gsm_min_distance_m: f64,
    lte_min_distance_m: f64,
    wcdma_min_distance_m: f64,
    cdma_min_distance_m: f64,
}

impl Default for SampleFilter {
    fn default() -> Self {
        Self::from_config(&FilterConfig::default())
    }
}

impl SampleFilter {
    /// WCDMA and CDMA fall back to the GSM threshold when not configured.
    pub fn from_config(config: &FilterConfig) -> Self {
        Self {
            gsm_min_distance_m: config.gsm_min_distance_m,
            lte_min_distance_m: config.lte_min_distance_m,
            wcdma_min_distance_m: config.wcdma_min_distance_m.unwrap_or(config.gsm_min_distance_m),
            cdma_min_distance_m: config.cdma_min_distance_m.unwrap_or(config.gsm_min_distance_m),
        }
    }

    pub fn min_distance_m(&self, technology: Technology) -> f64 {
        match technology {
            Technology::Gsm => self.gsm_min_distance_m,
            Technology::Lte => self.lte_min_distance_m,
            Technology::Wcdma => self.wcdma_min_distance_m,
            Technology::Cdma => self.cdma_min_distance_m,
        }
    }

    pub fn evaluate(&self, prev: Option<&Fix>, fix: Fix, cell: CellSample) -> Decision {
        if let Some(timing_advance) = cell.timing_advance() {
            if !timing_advance_resolved(timing_advance) {
                debug!("{} timing advance {} not resolved", cell.technology(), timing_advance);
                return Decision::Reject(RejectReason::StaleRadioState { timing_advance });
            }
        }

        if let Some(prev) = prev {
            let threshold_m = self.min_distance_m(cell.technology());
            let distance_m = prev.distance_to(&fix);
            if distance_m < threshold_m {
                return Decision::Reject(RejectReason::InsufficientDisplacement { distance_m, threshold_m });
            }
        }

        Decision::Accept(MeasurementRecord::new(cell, fix))
    }
}

fn timing_advance_resolved(timing_advance: i32) -> bool {
    (0..UNAVAILABLE).contains(&timing_advance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const TA_SENTINEL: i32 = 2147483647;

    fn fix_at(latitude: f64, longitude: f64) -> Fix {
        Fix::new(latitude, longitude, Utc.timestamp_millis_opt(1_700_000_000_000).unwrap())
    }

    /// Point `meters` north of `origin`.
    fn north_of(origin: &Fix, meters: f64) -> Fix {
        let d_lat = (meters / 6_371_000.0).to_degrees();
        Fix::new(origin.latitude + d_lat, origin.longitude, origin.captured_at + chrono::Duration::seconds(1))
    }

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

    fn lte(timing_advance: i32) -> CellSample {
        CellSample::Lte {
            ci: 10,
            tac: 20,
            mcc: "230".to_string(),
            mnc: "03".to_string(),
            earfcn: 6300,
            signal_dbm: -95,
            timing_advance,
        }
    }

    fn wcdma() -> CellSample {
        CellSample::Wcdma {
            cid: 1,
            lac: 2,
            mcc: "230".to_string(),
            mnc: "02".to_string(),
            uarfcn: 10700,
            signal_dbm: -88,
        }
    }

    fn cdma() -> CellSample {
        CellSample::Cdma { base_station_id: 1, network_id: 2, system_id: 3, signal_dbm: -99 }
    }

    #[test]
    fn test_default_thresholds() {
        let filter = SampleFilter::default();
        assert_eq!(filter.min_distance_m(Technology::Gsm), 200.0);
        assert_eq!(filter.min_distance_m(Technology::Lte), 50.0);
        assert_eq!(filter.min_distance_m(Technology::Wcdma), 200.0);
        assert_eq!(filter.min_distance_m(Technology::Cdma), 200.0);
    }

    #[test]
    fn test_configured_wcdma_threshold() {
        let config = FilterConfig { wcdma_min_distance_m: Some(75.0), ..FilterConfig::default() };
        let filter = SampleFilter::from_config(&config);
        assert_eq!(filter.min_distance_m(Technology::Wcdma), 75.0);
        assert_eq!(filter.min_distance_m(Technology::Cdma), 200.0);
    }

    #[test]
    fn test_first_sample_always_accepted() {
        let filter = SampleFilter::default();
        let fix = fix_at(50.0, 14.0);

        for cell in [gsm(5), lte(0), wcdma(), cdma()] {
            match filter.evaluate(None, fix, cell.clone()) {
                Decision::Accept(record) => {
                    assert_eq!(record.cell, cell);
                    assert_eq!(record.fix, fix);
                    assert_eq!(record.timestamp, 1_700_000_000_000);
                }
                other => panic!("Expected Accept for {:?}, got: {:?}", cell, other),
            }
        }
    }

    #[test]
    fn test_scenario_a_first_gsm_sample() {
        let decision = SampleFilter::default().evaluate(None, fix_at(50.0, 14.0), gsm(5));
        assert!(matches!(decision, Decision::Accept(_)));
        assert!(!decision.wants_nudge());
    }

    #[test]
    fn test_scenario_b_lte_not_moved_enough() {
        let prev = fix_at(50.0, 14.0);
        let decision = SampleFilter::default().evaluate(Some(&prev), north_of(&prev, 30.0), lte(3));

        match &decision {
            Decision::Reject(RejectReason::InsufficientDisplacement { distance_m, threshold_m }) => {
                assert!((distance_m - 30.0).abs() < 0.5, "got {}", distance_m);
                assert_eq!(*threshold_m, 50.0);
            }
            other => panic!("Expected InsufficientDisplacement, got: {:?}", other),
        }
        assert!(!decision.wants_nudge());
    }

    #[test]
    fn test_scenario_c_lte_stale_timing_advance() {
        let prev = fix_at(50.0, 14.0);
        let decision = SampleFilter::default().evaluate(Some(&prev), north_of(&prev, 80.0), lte(TA_SENTINEL));

        assert_eq!(
            decision,
            Decision::Reject(RejectReason::StaleRadioState { timing_advance: TA_SENTINEL })
        );
        assert!(decision.wants_nudge());
    }

    #[test]
    fn test_stale_timing_advance_rejected_regardless_of_distance() {
        let filter = SampleFilter::default();
        let prev = fix_at(50.0, 14.0);

        for cell in [gsm(TA_SENTINEL), lte(TA_SENTINEL), gsm(-1)] {
            assert!(filter.evaluate(None, prev, cell.clone()).wants_nudge());
            assert!(filter.evaluate(Some(&prev), prev, cell.clone()).wants_nudge());
            assert!(filter.evaluate(Some(&prev), north_of(&prev, 10_000.0), cell).wants_nudge());
        }
    }

    #[test]
    fn test_largest_real_timing_advance_is_valid() {
        let decision = SampleFilter::default().evaluate(None, fix_at(50.0, 14.0), lte(TA_SENTINEL - 1));
        assert!(matches!(decision, Decision::Accept(_)));
    }

    #[test]
    fn test_wcdma_and_cdma_have_no_timing_advance_gate() {
        let filter = SampleFilter::default();
        let prev = fix_at(50.0, 14.0);

        for cell in [wcdma(), cdma()] {
            let decision = filter.evaluate(Some(&prev), north_of(&prev, 250.0), cell.clone());
            assert!(matches!(decision, Decision::Accept(_)), "{:?}", cell);

            let decision = filter.evaluate(Some(&prev), north_of(&prev, 150.0), cell);
            assert!(matches!(
                decision,
                Decision::Reject(RejectReason::InsufficientDisplacement { .. })
            ));
        }
    }

    #[test]
    fn test_gsm_uses_wider_threshold_than_lte() {
        let filter = SampleFilter::default();
        let prev = fix_at(50.0, 14.0);
        let candidate = north_of(&prev, 100.0);

        assert!(matches!(filter.evaluate(Some(&prev), candidate, lte(4)), Decision::Accept(_)));
        assert!(matches!(
            filter.evaluate(Some(&prev), candidate, gsm(4)),
            Decision::Reject(RejectReason::InsufficientDisplacement { .. })
        ));
    }

    #[test]
    fn test_distance_exactly_at_threshold_is_accepted() {
        let config = FilterConfig { lte_min_distance_m: 0.0, ..FilterConfig::default() };
        let filter = SampleFilter::from_config(&config);
        let prev = fix_at(50.0, 14.0);

        assert!(matches!(filter.evaluate(Some(&prev), prev, lte(1)), Decision::Accept(_)));
    }
}
