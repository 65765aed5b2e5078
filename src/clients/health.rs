use std::{collections::HashMap, time::Instant};

use chrono::Utc;
use tracing::{debug, warn};

use crate::{
    clients::{bus::BusClient, connector::ConnectorClient},
    config::Config,
    models::health::{HealthCheckResponse, HealthStatus, ServiceHealth},
};

pub struct HealthChecker {
    config: Config,
}

impl HealthChecker {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn check_all(&self) -> HealthCheckResponse {
        let mut checks = HashMap::new();

        let broker_health = self.check_broker().await;
        checks.insert("message_broker".to_string(), broker_health);

        let connector_health = self.check_connector().await;
        checks.insert("connector_credentials".to_string(), connector_health);

        let overall_status = self.determine_overall_status(&checks);

        HealthCheckResponse {
            status: overall_status,
            timestamp: Utc::now(),
            checks,
        }
    }

    async fn check_broker(&self) -> ServiceHealth {
        let start = Instant::now();

        match BusClient::connect(&self.config).await {
            Ok(_) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(response_time_ms = elapsed, "Broker health check passed");
                ServiceHealth::healthy(elapsed)
            }
            Err(e) => {
                warn!(error = %e, "Broker connection failed");
                ServiceHealth::unhealthy(format!("Connection failed: {}", e))
            }
        }
    }

    async fn check_connector(&self) -> ServiceHealth {
        let start = Instant::now();

        let client = match ConnectorClient::new(&self.config) {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "Connector client creation failed");
                return ServiceHealth::unhealthy(format!("Client creation failed: {}", e));
            }
        };

        match client.check_credentials().await {
            Ok(_) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(response_time_ms = elapsed, "Connector health check passed");
                ServiceHealth::healthy(elapsed)
            }
            Err(e) => {
                warn!(error = %e, "Connector credential check failed");
                ServiceHealth::degraded(format!("Credential check failed: {}", e))
            }
        }
    }

    fn determine_overall_status(&self, checks: &HashMap<String, ServiceHealth>) -> HealthStatus {
        let broker_unhealthy = checks
            .get("message_broker")
            .is_some_and(|health| health.status == HealthStatus::Unhealthy);

        let has_degraded = checks
            .values()
            .any(|health| health.status != HealthStatus::Healthy);

        if broker_unhealthy {
            HealthStatus::Unhealthy
        } else if has_degraded {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}
