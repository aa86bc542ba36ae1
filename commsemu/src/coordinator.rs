//! The per-link parameter coordinator.
//!
//! A [`Coordinator`] owns the [`ImpairmentProfile`] of one link. Every update takes the
//! profile lock, commits the new value and applies the resulting profile to the link's
//! interfaces before releasing the lock, so applies happen in exactly the order updates
//! were committed.

use tokio::sync::Mutex;
use tracing::{info, info_span, warn, Instrument};

use commsemu_tc::{Applier, ApplyError, ApplyReport, ImpairmentProfile, Shaper};

use crate::{
    link::{Dimension, Link},
    policy::{InputError, InputPolicy},
};

/// What happened to a single update.
#[derive(Debug)]
pub enum Update {
    /// The profile was committed and applied. The report may still contain failed interfaces.
    Applied(ApplyReport),
    /// The profile was committed but nothing was issued because the link cannot be shaped.
    ApplyFailed(ApplyError),
    /// The sample was refused. The profile is unchanged and nothing was issued.
    Rejected(InputError),
}

impl Update {
    /// `true` if the profile was applied to every interface.
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(report) if report.is_success())
    }

    /// The per-interface report, if the profile reached the applier.
    pub fn report(&self) -> Option<&ApplyReport> {
        match self {
            Self::Applied(report) => Some(report),
            _ => None,
        }
    }
}

/// Serializes the parameter updates of one link and applies each resulting profile through
/// its shaper.
#[derive(Debug)]
pub struct Coordinator<S> {
    link: Link,
    policy: InputPolicy,
    applier: Applier<S>,
    /// FIFO-fair, and held across the apply.
    profile: Mutex<ImpairmentProfile>,
}

impl<S: Shaper> Coordinator<S> {
    /// A coordinator for `link` starting from the all-zero profile. Nothing is applied until the
    /// first update or [`Coordinator::reapply`].
    pub fn new(link: Link, shaper: S) -> Self {
        Self {
            link,
            policy: InputPolicy::default(),
            applier: Applier::new(shaper),
            profile: Mutex::new(ImpairmentProfile::default()),
        }
    }

    /// Sets how out-of-range samples are treated.
    pub fn with_policy(mut self, policy: InputPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The link this coordinator shapes.
    pub fn link(&self) -> &Link {
        &self.link
    }

    /// The active input policy.
    pub fn policy(&self) -> InputPolicy {
        self.policy
    }

    /// A snapshot of the current profile. Waits for an in-flight update to finish.
    pub async fn profile(&self) -> ImpairmentProfile {
        *self.profile.lock().await
    }

    /// The current profile, or `None` while an update is in flight.
    pub fn try_profile(&self) -> Option<ImpairmentProfile> {
        self.profile.try_lock().ok().map(|profile| *profile)
    }

    /// Sets packet loss from a fraction in `[0, 1]`. Stored as `fraction * 100` without
    /// rounding; the rendered directive is trimmed to six decimals.
    pub async fn set_drop(&self, fraction: f64) -> Update {
        self.set(Dimension::Drop, fraction).await
    }

    /// Sets the rate cap in Mbit/s.
    pub async fn set_bandwidth(&self, mbps: f64) -> Update {
        self.set(Dimension::Bandwidth, mbps).await
    }

    /// Sets the added delay in milliseconds.
    pub async fn set_delay(&self, ms: f64) -> Update {
        self.set(Dimension::Delay, ms).await
    }

    /// Commits a sample for `dimension` and applies the resulting profile.
    pub async fn set(&self, dimension: Dimension, value: f64) -> Update {
        let value = match self.policy.sanitize(dimension, value) {
            Ok(value) => value,
            Err(e) => {
                warn!(link = %self.link.name(), err = %e, "sample rejected");
                return Update::Rejected(e);
            }
        };

        let mut profile = self.profile.lock().await;
        match dimension {
            Dimension::Drop => profile.drop_percent = value * 100.0,
            Dimension::Bandwidth => profile.bandwidth_mbps = value,
            Dimension::Delay => profile.delay_ms = value,
        }
        info!(link = %self.link.name(), %dimension, value, profile = %*profile, "update committed");

        self.apply(&profile).await
    }

    /// Applies the current profile again without changing it.
    pub async fn reapply(&self) -> Update {
        let profile = self.profile.lock().await;
        self.apply(&profile).await
    }

    /// Must be called with the profile lock held.
    async fn apply(&self, profile: &ImpairmentProfile) -> Update {
        let span = info_span!("apply", link = %self.link.name());

        match self.applier.apply(profile, self.link.interfaces()).instrument(span).await {
            Ok(report) => {
                if !report.is_success() {
                    warn!(
                        link = %self.link.name(),
                        failed = report.failures().count(),
                        "profile only partially applied"
                    );
                }
                Update::Applied(report)
            }
            Err(e) => {
                warn!(link = %self.link.name(), err = %e, "profile not applied");
                Update::ApplyFailed(e)
            }
        }
    }
}
