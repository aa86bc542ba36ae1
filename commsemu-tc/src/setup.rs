//! One-shot interface initialization: replace whatever root qdisc exists with a prio qdisc.
//!
//! The netem `replace` issued at runtime does not depend on this, but running it first gives
//! every interface a known root.

use thiserror::Error;
use tracing::{debug, info};

use crate::{
    command,
    directive::{QdiscDeleteRequest, QdiscPrioRequest, PRIO_MAX_BANDS, PRIO_MIN_BANDS},
    shaper::Shaper,
};

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("interface name is empty")]
    EmptyInterface,
    #[error("prio supports {min} to {max} bands, got {0}", min = PRIO_MIN_BANDS, max = PRIO_MAX_BANDS)]
    Bands(u32),
    #[error("failed to install prio qdisc: {0}")]
    Command(#[from] command::Error),
}

/// Removes the root qdisc of `interface` (if any) and installs a prio qdisc with `bands` bands,
/// mapping every priority to band 0.
pub async fn install_prio<S: Shaper + ?Sized>(
    shaper: &S,
    interface: &str,
    bands: u32,
) -> Result<(), SetupError> {
    if interface.trim().is_empty() {
        return Err(SetupError::EmptyInterface);
    }
    let bands = u8::try_from(bands)
        .ok()
        .filter(|b| (PRIO_MIN_BANDS..=PRIO_MAX_BANDS).contains(b))
        .ok_or(SetupError::Bands(bands))?;

    // Fails when the interface has no root qdisc yet, which is fine.
    if let Err(e) = shaper.execute(&QdiscDeleteRequest::new(interface).into()).await {
        debug!(interface, err = %e, "no root qdisc removed");
    }

    shaper.execute(&QdiscPrioRequest::new(interface).with_bands(bands).into()).await?;
    info!(interface, bands, "prio qdisc installed");

    Ok(())
}
