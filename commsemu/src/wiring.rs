use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};

use commsemu_bus::{handler, Bus, BusError};
use commsemu_tc::Shaper;
use commsemu_wire::sample;

use crate::{coordinator::Coordinator, link::Dimension};

/// Subscribes the three impairment topics of the coordinator's link under `prefix`.
///
/// Each topic feeds its own coordinator entry point. Payloads that do not decode to a number
/// are logged and dropped without touching the profile.
pub async fn subscribe_link<B, S>(bus: &B, coordinator: Arc<Coordinator<S>>, prefix: &str) -> Result<(), BusError>
where
    B: Bus + ?Sized,
    S: Shaper,
{
    for dimension in Dimension::ALL {
        let topic = coordinator.link().topic(prefix, dimension);

        let coordinator = Arc::clone(&coordinator);
        let source = topic.clone();
        bus.subscribe(
            &topic,
            handler(move |payload: Bytes| {
                let coordinator = Arc::clone(&coordinator);
                let source = source.clone();
                async move {
                    match sample::decode(&payload) {
                        Ok(value) => {
                            let _ = coordinator.set(dimension, value).await;
                        }
                        Err(e) => warn!(topic = %source, err = %e, "discarding malformed sample"),
                    }
                }
            }),
        )
        .await?;

        info!(%topic, "subscribed");
    }

    Ok(())
}
