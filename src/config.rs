use crate::poll::Backoff;
use aws_config::{retry::RetryConfig, BehaviorVersion};
use aws_types::{region::Region, SdkConfig};
use std::time::Duration;
use tokio::time::Instant;

/// `WaitSettings` bounds every wait the lifecycle operations perform
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitSettings {
    /// Wait for a new function to leave `Pending`
    pub activation: Backoff,
    /// Wait for a code update to finish before the configuration update
    pub update: Backoff,
    /// Wait for a new execution role to become assumable by Lambda
    pub role_propagation: Backoff,
    /// Budget shared by all the waits of one create or update
    pub total: Option<Duration>,
}

impl Default for WaitSettings {
    fn default() -> Self {
        WaitSettings {
            activation: Backoff::new(
                Duration::from_secs(1),
                Duration::from_secs(5),
                Duration::from_secs(120),
            ),
            update: Backoff::new(
                Duration::from_secs(1),
                Duration::from_secs(5),
                Duration::from_secs(120),
            ),
            role_propagation: Backoff::new(
                Duration::from_secs(2),
                Duration::from_secs(8),
                Duration::from_secs(60),
            ),
            total: None,
        }
    }
}

impl WaitSettings {
    /// Cap every wait at `limit`, and all the waits of one operation
    /// together at `limit` as well.
    pub fn capped(self, limit: Duration) -> WaitSettings {
        let cap = |backoff: Backoff| Backoff {
            max_wait: backoff.max_wait.min(limit),
            ..backoff
        };
        WaitSettings {
            activation: cap(self.activation),
            update: cap(self.update),
            role_propagation: cap(self.role_propagation),
            total: Some(self.total.map_or(limit, |total| total.min(limit))),
        }
    }

    /// The instant an operation starting now has to finish waiting by.
    pub fn deadline(&self) -> Option<Instant> {
        self.total.map(|total| Instant::now() + total)
    }
}

/// `Settings` carries the provider configuration every component is built from
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Settings {
    /// AWS region, the provider chain decides when `None`
    pub region: Option<String>,
    /// Named profile from the shared AWS config files
    pub profile: Option<String>,
    /// Bounds for the waits
    pub waits: WaitSettings,
}

impl Settings {
    /// Resolve credentials and region through the standard provider chain.
    ///
    /// SDK retries are disabled: mutating calls must never be sent twice,
    /// read retries are handled by the lifecycle operations themselves.
    #[tracing::instrument(skip(self), fields(region = ?self.region, profile = ?self.profile))]
    pub async fn load_sdk_config(&self) -> SdkConfig {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).retry_config(RetryConfig::disabled());

        if let Some(region) = &self.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(profile) = &self.profile {
            loader = loader.profile_name(profile);
        }

        loader.load().await
    }
}
