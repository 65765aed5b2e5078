use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::{
    config::Config,
    models::{
        activity::{InboundActivity, OutboundActivity},
        destination::DestinationRegistry,
        notification::Card,
    },
};

const TOKEN_SCOPE: &str = "https://api.botframework.com/.default";

/// Outcome of a dispatch attempt. `NoDestination` is terminal for the
/// message (only a future inbound turn can change it); `Transport` is
/// retryable through broker redelivery.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no conversation destination has been registered")]
    NoDestination,

    #[error("connector send failed: {0}")]
    Transport(anyhow::Error),
}

/// HTTP client for the conversation connector. Each send acquires a bearer
/// token via the client-credentials grant, then posts a message activity to
/// the conversation named by the destination.
pub struct ConnectorClient {
    http_client: Client,
    app_id: String,
    app_password: String,
    token_url: String,
}

impl ConnectorClient {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|_| anyhow!("Failed to create HTTP client"))?;

        info!(app_id = %config.connector_app_id, "Connector client initialized");

        Ok(Self {
            http_client,
            app_id: config.connector_app_id.clone(),
            app_password: config.connector_app_password.clone(),
            token_url: config.connector_token_url.clone(),
        })
    }

    /// Sends a rendered card to the currently registered destination.
    pub async fn dispatch(
        &self,
        registry: &DestinationRegistry,
        card: &Card,
    ) -> Result<(), DispatchError> {
        let Some(destination) = registry.get() else {
            return Err(DispatchError::NoDestination);
        };

        let activity = OutboundActivity::card_message(&destination, card);

        self.send_activity(
            &destination.service_url,
            &destination.conversation_id,
            &activity,
        )
        .await
        .map_err(DispatchError::Transport)
    }

    /// Replies to an inbound activity on its own conversation.
    pub async fn reply(&self, inbound: &InboundActivity, text: &str) -> Result<(), Error> {
        let activity = OutboundActivity::text_reply(inbound, text);

        self.send_activity(&inbound.service_url, &inbound.conversation.id, &activity)
            .await
    }

    /// Round-trips the credential endpoint without sending anything.
    pub async fn check_credentials(&self) -> Result<(), Error> {
        self.fetch_token().await.map(|_| ())
    }

    async fn send_activity(
        &self,
        service_url: &str,
        conversation_id: &str,
        activity: &OutboundActivity,
    ) -> Result<(), Error> {
        let token = self.fetch_token().await?;

        let url = format!(
            "{}/v3/conversations/{}/activities",
            service_url.trim_end_matches('/'),
            conversation_id
        );

        debug!(conversation_id, "Posting activity to conversation");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&token)
            .json(activity)
            .send()
            .await?;

        if response.status().is_success() {
            info!(conversation_id, "Activity delivered");
            Ok(())
        } else {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            Err(anyhow!("Connector returned status {}: {}", status, error_text))
        }
    }

    async fn fetch_token(&self) -> Result<String, Error> {
        let response = self
            .http_client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.app_id.as_str()),
                ("client_secret", self.app_password.as_str()),
                ("scope", TOKEN_SCOPE),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Token request failed with status {}",
                response.status()
            ));
        }

        let token: TokenResponse = response.json().await?;

        Ok(token.access_token)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}
