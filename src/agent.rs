//! Outbound UL2.0 delivery to the FIWARE IoT Agent.
//!
//! One `IotAgentClient` addresses one device behind the agent: the measure
//! URL (API key + device id baked into the query string) and the tenant
//! headers are fixed at construction, so sending is a single text/plain POST.

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::ul20;
use reqwest::header;
use std::time::Duration;

/// Everything needed to address one UL2.0 device behind the IoT Agent.
#[derive(Debug, Clone)]
pub struct DeviceRoute {
    pub base_url: String,
    pub base_path: String,
    pub api_key: String,
    pub device_id: String,
    pub service: String,
    pub service_path: String,
    pub timeout: Duration,
}

impl DeviceRoute {
    /// Route used by the push gateway: `[agent]` endpoint, `[fiware]` tenant.
    pub fn for_push(cfg: &BridgeConfig) -> Self {
        Self {
            base_url: cfg.agent.base_url.clone(),
            base_path: cfg.agent.base_path.clone(),
            api_key: cfg.agent.api_key.clone(),
            device_id: cfg.agent.device_id.clone(),
            service: cfg.fiware.service.clone(),
            service_path: cfg.fiware.service_path.clone(),
            timeout: Duration::from_secs(cfg.agent.timeout_secs),
        }
    }

    /// Route used by the weather poller: same agent endpoint, but the
    /// poller's own device, API key, and tenant.
    pub fn for_weather(cfg: &BridgeConfig) -> Self {
        Self {
            base_url: cfg.agent.base_url.clone(),
            base_path: cfg.agent.base_path.clone(),
            api_key: cfg.weather.api_key.clone(),
            device_id: cfg.weather.full_device_id(),
            service: cfg.weather.service.clone(),
            service_path: cfg.weather.service_path.clone(),
            timeout: Duration::from_secs(cfg.agent.timeout_secs),
        }
    }
}

/// Shared HTTP client for measure deliveries.
pub struct IotAgentClient {
    http: reqwest::Client,
    endpoint: String,
    service: String,
    service_path: String,
}

impl IotAgentClient {
    pub fn new(route: &DeviceRoute) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(route.timeout)
            .user_agent(concat!("ul20-bridge/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let endpoint = ul20::device_url(
            &route.base_url,
            &route.base_path,
            &route.api_key,
            &route.device_id,
        );

        Ok(Self {
            http,
            endpoint,
            service: route.service.clone(),
            service_path: route.service_path.clone(),
        })
    }

    /// Measure URL this client posts to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST one encoded payload. Non-2xx answers and transport failures are
    /// both delivery errors.
    pub async fn send(&self, payload: &str) -> Result<(), BridgeError> {
        let resp = self
            .http
            .post(&self.endpoint)
            .header(header::CONTENT_TYPE, "text/plain")
            .header("Fiware-Service", &self.service)
            .header("Fiware-ServicePath", &self.service_path)
            .body(payload.to_string())
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable>".to_string());
            return Err(BridgeError::AgentRejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(%status, "payload delivered");
        Ok(())
    }

    /// Send with sleep-and-retry: up to `attempts` tries, sleeping `delay`
    /// between them. The last error is returned when every attempt fails.
    pub async fn send_with_retry(
        &self,
        payload: &str,
        attempts: u32,
        delay: Duration,
    ) -> Result<(), BridgeError> {
        let attempts = attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.send(payload).await {
                Ok(()) => return Ok(()),
                Err(err) if attempt < attempts => {
                    tracing::warn!(
                        attempt,
                        "delivery failed: {err}; retrying in {}s",
                        delay.as_secs()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
