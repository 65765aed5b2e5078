use anyhow::{Error, Result, anyhow};
use futures_util::StreamExt;
use tokio::time::{Duration, sleep};
use tracing::{Instrument, debug, error, info, warn};
use uuid::Uuid;

use crate::{
    clients::{
        bus::BusClient,
        connector::{ConnectorClient, DispatchError},
    },
    models::{
        destination::DestinationRegistry, envelope::Envelope, notification::Notification,
        retry::RetryConfig, status::Disposition,
    },
};

/// Runs one delivery through decode -> classify -> dispatch and reports how
/// the consumer should settle it. Every failure is handled here; nothing
/// propagates to the loop.
pub async fn process_message(
    body: &[u8],
    registry: &DestinationRegistry,
    connector: &ConnectorClient,
) -> Disposition {
    let envelope = match Envelope::decode(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "Dropping undecodable message");
            return Disposition::Complete;
        }
    };

    let notification = match Notification::classify(&envelope) {
        Ok(notification) => notification,
        Err(e) => {
            warn!(
                message_name = %envelope.message_name(),
                error = %e,
                "Dropping message with malformed payload"
            );
            return Disposition::Complete;
        }
    };

    let Some(card) = notification.render() else {
        debug!(
            message_name = %envelope.message_name(),
            "Ignoring unrecognized message"
        );
        return Disposition::Complete;
    };

    match connector.dispatch(registry, &card).await {
        Ok(()) => {
            info!(title = %card.title, "Notification delivered");
            Disposition::Complete
        }
        Err(DispatchError::NoDestination) => {
            error!(
                title = %card.title,
                "No conversation destination registered, dropping notification"
            );
            Disposition::Complete
        }
        Err(DispatchError::Transport(e)) => {
            warn!(
                title = %card.title,
                error = %e,
                "Connector send failed, returning message for redelivery"
            );
            Disposition::Redeliver
        }
    }
}

/// The long-lived consumer loop: one delivery in flight at a time, settled
/// according to the pipeline's disposition. Runs until process shutdown.
pub async fn run_consumer(
    bus: &BusClient,
    registry: &DestinationRegistry,
    connector: &ConnectorClient,
) -> Result<(), Error> {
    let mut consumer = bus.create_consumer().await?;

    info!("Consumer registered, waiting for events");

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(delivery) => delivery,
            Err(e) => {
                warn!(error = %e, "Consumer stream error");
                continue;
            }
        };

        let span = tracing::info_span!("delivery", delivery_id = %Uuid::new_v4());
        let disposition = process_message(&delivery.data, registry, connector)
            .instrument(span)
            .await;

        let settled = match disposition {
            Disposition::Complete => bus.acknowledge(delivery.delivery_tag).await,
            Disposition::Redeliver => bus.redeliver(delivery.delivery_tag).await,
        };

        if let Err(e) = settled {
            warn!(
                disposition = %disposition,
                error = %e,
                "Failed to settle delivery"
            );
        }
    }

    Err(anyhow!("Consumer stream ended unexpectedly"))
}

pub async fn retry_with_backoff<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay_ms = config.initial_delay_ms;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    info!(
                        attempt,
                        max_attempts = config.max_attempts,
                        "Retry succeeded"
                    );
                }
                return Ok(result);
            }
            Err(e) => {
                if attempt >= config.max_attempts {
                    warn!(
                        max_attempts = config.max_attempts,
                        error = %e,
                        "Retry failed after exhausting all attempts"
                    );
                    return Err(e);
                }

                debug!(
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms,
                    "Retry attempt failed, backing off"
                );

                let jitter = rand::random_range(-0.1..=0.1);

                let jittered_delay = (delay_ms as f64 * (1.0 + jitter)) as u64;

                sleep(Duration::from_millis(jittered_delay)).await;

                delay_ms = std::cmp::min(delay_ms * config.backoff_multiplier, config.max_delay_ms);
            }
        }
    }
}
