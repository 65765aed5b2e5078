use anyhow::{Error, Result, anyhow};
use lapin::{
    Channel, Connection, ConnectionProperties, Consumer, ExchangeKind,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicQosOptions, BasicRejectOptions,
        ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
    },
    types::FieldTable,
};
use tracing::{info, warn};

use crate::config::Config;

/// Deliver one message at a time; the pipeline is strictly sequential.
const PREFETCH_COUNT: u16 = 1;

const CONSUMER_TAG: &str = "relay_worker";

/// The durable subscription: a durable queue bound to the event topic
/// exchange, consumed with manual acknowledgement.
pub struct BusClient {
    connection: Connection,
    channel: Channel,
    subscription_name: String,
}

impl BusClient {
    pub async fn connect(config: &Config) -> Result<Self, Error> {
        let connection = Connection::connect(&config.amqp_url, ConnectionProperties::default())
            .await
            .map_err(|_| anyhow!("Failed to connect to message broker"))?;

        // Link-level errors surface here asynchronously; they are logged and
        // never tear down the consumer loop.
        connection.on_error(|error| {
            warn!(error = %error, "Broker connection error");
        });

        info!("Broker connection established");

        let channel = connection
            .create_channel()
            .await
            .map_err(|_| anyhow!("Broker channel creation failed"))?;

        channel
            .basic_qos(PREFETCH_COUNT, BasicQosOptions::default())
            .await
            .map_err(|_| anyhow!("Failed to set up QoS"))?;

        channel
            .exchange_declare(
                &config.topic_name,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|_| anyhow!("Failed to declare topic exchange"))?;

        channel
            .queue_declare(
                &config.subscription_name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|_| anyhow!("Failed to declare subscription queue"))?;

        channel
            .queue_bind(
                &config.subscription_name,
                &config.topic_name,
                "#",
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|_| anyhow!("Failed to bind subscription to topic"))?;

        info!(
            topic = %config.topic_name,
            subscription = %config.subscription_name,
            "Durable subscription ready"
        );

        Ok(Self {
            connection,
            channel,
            subscription_name: config.subscription_name.clone(),
        })
    }

    pub async fn create_consumer(&self) -> Result<Consumer, Error> {
        let consumer = self
            .channel
            .basic_consume(
                &self.subscription_name,
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|_| anyhow!("Failed to create consumer"))?;

        Ok(consumer)
    }

    pub async fn acknowledge(&self, delivery_tag: u64) -> Result<(), Error> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|_| anyhow!("Failed to acknowledge message"))?;

        Ok(())
    }

    /// Returns a delivery to the broker for redelivery under its own policy.
    pub async fn redeliver(&self, delivery_tag: u64) -> Result<(), Error> {
        self.channel
            .basic_reject(delivery_tag, BasicRejectOptions { requeue: true })
            .await
            .map_err(|_| anyhow!("Failed to return message to the broker"))?;

        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connection.status().connected()
    }
}
