//! # Location Module
//!
//! Location fixes and the bounded-wait acquisition used by the sampling loop.
//!
//! All failures here collapse into "no fix this cycle": a provider error or
//! an expired wait returns `None`, never an error.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LocationError;

/// Mean Earth radius in meters
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A single location fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    pub captured_at: DateTime<Utc>,
}

impl Fix {
    pub fn new(latitude: f64, longitude: f64, captured_at: DateTime<Utc>) -> Self {
        Self { latitude, longitude, captured_at }
    }

    /// Both coordinates finite and inside their geographic ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle (haversine) distance to `other`, in meters.
    pub fn distance_to(&self, other: &Fix) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());
        EARTH_RADIUS_M * c
    }
}

/// Acquires location fixes for the sampling loop.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocationSource: Send + Sync {
    /// Request a fresh high-accuracy fix, waiting at most `timeout`.
    async fn acquire(&self, timeout: Duration) -> Option<Fix>;

    /// Most recently cached fix, without waiting for a new one.
    async fn last_known(&self) -> Option<Fix>;
}

/// Platform location backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Resolves once the provider has a fresh fix. May take arbitrarily long.
    async fn current_fix(&self) -> std::result::Result<Fix, LocationError>;

    /// The provider's cached fix, if it has one.
    async fn cached_fix(&self) -> std::result::Result<Option<Fix>, LocationError>;
}

/// [`LocationSource`] over any [`LocationProvider`].
///
/// Applies the acquisition deadline and drops fixes with unusable coordinates.
#[derive(Debug)]
pub struct ProviderLocationSource<P> {
    provider: P,
}

impl<P: LocationProvider> ProviderLocationSource<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

#[async_trait]
impl<P: LocationProvider> LocationSource for ProviderLocationSource<P> {
    async fn acquire(&self, timeout: Duration) -> Option<Fix> {
        match tokio::time::timeout(timeout, self.provider.current_fix()).await {
            Ok(Ok(fix)) => usable(fix),
            Ok(Err(e)) => {
                debug!("Location provider failed: {}", e);
                None
            }
            Err(_) => {
                debug!("No location fix within {:?}", timeout);
                None
            }
        }
    }

    async fn last_known(&self) -> Option<Fix> {
        match self.provider.cached_fix().await {
            Ok(fix) => fix.and_then(usable),
            Err(e) => {
                debug!("Last known location unavailable: {}", e);
                None
            }
        }
    }
}

fn usable(fix: Fix) -> Option<Fix> {
    if fix.is_valid() {
        Some(fix)
    } else {
        debug!("Discarding fix with invalid coordinates: ({}, {})", fix.latitude, fix.longitude);
        None
    }
}
