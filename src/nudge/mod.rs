//! # Network Nudge
//!
//! Fire-and-forget outbound request that gets the modem to refresh its
//! link-layer state, and with it the timing advance.
//!
//! Nothing here reports back to the caller. A failed nudge only means the
//! timing advance may take a little longer to resolve.

use std::time::Duration;

use tracing::debug;

use crate::config::NudgeConfig;

/// Best-effort network probe.
#[cfg_attr(test, mockall::automock)]
pub trait NetworkNudge: Send + Sync {
    /// Start the probe and return immediately.
    fn fire(&self);
}

/// Nudge that issues a single HTTP(S) GET and drops the response.
///
/// The request runs on a detached task of the current tokio runtime. Outside
/// a runtime, `fire` does nothing.
#[derive(Debug, Clone)]
pub struct HttpNudge {
    client: reqwest::Client,
    url: String,
}

impl HttpNudge {
    /// Build a nudge for `url` with the given connect and whole-request timeouts.
    pub fn new(url: impl Into<String>, connect_timeout: Duration, request_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client, url: url.into() }
    }

    pub fn from_config(config: &NudgeConfig) -> Self {
        Self::new(
            config.url.clone(),
            Duration::from_millis(config.connect_timeout_ms),
            Duration::from_millis(config.request_timeout_ms),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl NetworkNudge for HttpNudge {
    fn fire(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No tokio runtime, skipping nudge to {}", self.url);
            return;
        };

        let request = self.client.get(&self.url);
        let url = self.url.clone();

        runtime.spawn(async move {
            match request.send().await {
                Ok(response) => debug!("Nudge to {} answered {}", url, response.status()),
                Err(e) => debug!("Nudge to {} failed: {}", url, e),
            }
        });
    }
}

/// Nudge that does nothing, for when nudging is turned off.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledNudge;

impl NetworkNudge for DisabledNudge {
    fn fire(&self) {}
}

/// Build the nudge described by `config`.
pub fn from_config(config: &NudgeConfig) -> Box<dyn NetworkNudge> {
    if config.enabled {
        Box::new(HttpNudge::from_config(config))
    } else {
        Box::new(DisabledNudge)
    }
}
