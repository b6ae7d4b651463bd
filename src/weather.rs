//! Weather polling variant: fetch a public weather API document on a fixed
//! interval, extract the observed fields, render the UL2.0 payload template,
//! and deliver it through the IoT Agent with sleep-and-retry.

use crate::agent::{DeviceRoute, IotAgentClient};
use crate::config::{BridgeConfig, WeatherConfig};
use crate::ul20;
use anyhow::{Context, Result};
use serde_json::Value;
use std::time::Duration;

/// The fields extracted from one weather API document, already rendered as
/// wire text. Absent numeric fields default to `0`, an absent condition to
/// `Undefined`.
#[derive(Debug, PartialEq)]
pub struct WeatherObservation {
    pub temperature: String,
    pub humidity: String,
    pub pressure: String,
    pub wind_speed: String,
    pub wind_direction: String,
    pub weather_type: String,
}

impl WeatherObservation {
    pub fn from_document(doc: &Value) -> Self {
        Self {
            temperature: field(doc, "/main/temp", "0"),
            humidity: field(doc, "/main/humidity", "0"),
            pressure: field(doc, "/main/pressure", "0"),
            wind_speed: field(doc, "/wind/speed", "0"),
            wind_direction: field(doc, "/wind/deg", "0"),
            weather_type: field(doc, "/weather/0/main", "Undefined"),
        }
    }

    /// Placeholder name → value pairs for template rendering.
    pub fn template_values(&self) -> [(&'static str, String); 6] {
        [
            ("temperature", self.temperature.clone()),
            ("humidity", self.humidity.clone()),
            ("pressure", self.pressure.clone()),
            ("wind_speed", self.wind_speed.clone()),
            ("wind_direction", self.wind_direction.clone()),
            ("weather_type", self.weather_type.clone()),
        ]
    }
}

fn field(doc: &Value, pointer: &str, default: &str) -> String {
    match doc.pointer(pointer) {
        Some(Value::String(s)) => s.clone(),
        Some(v @ (Value::Number(_) | Value::Bool(_))) => v.to_string(),
        _ => default.to_string(),
    }
}

/// HTTP client for the upstream weather API.
pub struct WeatherClient {
    http: reqwest::Client,
    api_url: String,
}

impl WeatherClient {
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ul20-bridge/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_url: api_url.to_string(),
        })
    }

    pub async fn fetch(&self) -> Result<WeatherObservation> {
        let resp = self
            .http
            .get(&self.api_url)
            .send()
            .await
            .context("weather API request failed")?;

        let status = resp.status();
        anyhow::ensure!(status.is_success(), "weather API returned {status}");

        let doc: Value = resp
            .json()
            .await
            .context("weather API returned non-JSON body")?;
        Ok(WeatherObservation::from_document(&doc))
    }
}

/// One poll cycle: fetch, render, deliver. Returns the rendered payload.
pub async fn cycle(
    client: &WeatherClient,
    agent: &IotAgentClient,
    cfg: &WeatherConfig,
) -> Result<String> {
    let observation = client.fetch().await?;
    let payload = ul20::render_template(&cfg.payload_template, &observation.template_values());

    agent
        .send_with_retry(
            &payload,
            cfg.retry_attempts,
            Duration::from_secs(cfg.retry_delay_secs),
        )
        .await?;
    Ok(payload)
}

/// Poll forever. A failed cycle is logged and retried on the next interval.
pub async fn run(config: BridgeConfig) -> Result<()> {
    anyhow::ensure!(
        !config.weather.api_url.is_empty(),
        "weather.api_url is not configured"
    );

    let timeout = Duration::from_secs(config.agent.timeout_secs);
    let client = WeatherClient::new(&config.weather.api_url, timeout)?;
    let agent = IotAgentClient::new(&DeviceRoute::for_weather(&config))?;
    let interval = Duration::from_secs(config.weather.poll_interval_secs);

    tracing::info!(
        api_url = %config.weather.api_url,
        endpoint = agent.endpoint(),
        interval_secs = interval.as_secs(),
        "weather poller started"
    );

    loop {
        match cycle(&client, &agent, &config.weather).await {
            Ok(payload) => tracing::info!(payload = %payload, "observation delivered"),
            Err(err) => tracing::error!("weather cycle failed: {err:#}"),
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_WEATHER_TEMPLATE;
    use serde_json::json;
    use wiremock::matchers::{body_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_document() -> Value {
        json!({
            "main": { "temp": 21.3, "humidity": 40, "pressure": 1013 },
            "wind": { "speed": 5.1, "deg": 180 },
            "weather": [{ "main": "Clouds", "description": "scattered clouds" }]
        })
    }

    #[test]
    fn extracts_all_fields() {
        let obs = WeatherObservation::from_document(&sample_document());
        assert_eq!(obs.temperature, "21.3");
        assert_eq!(obs.humidity, "40");
        assert_eq!(obs.pressure, "1013");
        assert_eq!(obs.wind_speed, "5.1");
        assert_eq!(obs.wind_direction, "180");
        assert_eq!(obs.weather_type, "Clouds");
    }

    #[test]
    fn absent_fields_use_defaults() {
        let obs = WeatherObservation::from_document(&json!({}));
        assert_eq!(obs.temperature, "0");
        assert_eq!(obs.wind_direction, "0");
        assert_eq!(obs.weather_type, "Undefined");
    }

    #[test]
    fn default_template_renders_fully() {
        let obs = WeatherObservation::from_document(&sample_document());
        let payload = ul20::render_template(DEFAULT_WEATHER_TEMPLATE, &obs.template_values());
        assert_eq!(
            payload,
            "temperature|21.3|humidity|40|pressure|1013|wind_speed|5.1|wind_dir|180|weather_type|Clouds"
        );
    }

    #[tokio::test]
    async fn fetch_parses_upstream_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_document()))
            .mount(&server)
            .await;

        let client = WeatherClient::new(
            &format!("{}/data/2.5/weather?id=643493", server.uri()),
            Duration::from_secs(5),
        )
        .unwrap();
        let obs = client.fetch().await.unwrap();
        assert_eq!(obs.weather_type, "Clouds");
    }

    #[tokio::test]
    async fn fetch_rejects_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = WeatherClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let err = client.fetch().await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn cycle_fetches_and_delivers() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_document()))
            .mount(&upstream)
            .await;

        let downstream = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/iot/d"))
            .and(body_string(
                "temperature|21.3|humidity|40|pressure|1013|wind_speed|5.1|wind_dir|180|weather_type|Clouds",
            ))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&downstream)
            .await;

        let mut cfg = BridgeConfig::default();
        cfg.agent.base_url = downstream.uri();
        cfg.weather.api_url = upstream.uri();
        cfg.weather.retry_delay_secs = 0;

        let client = WeatherClient::new(&cfg.weather.api_url, Duration::from_secs(5)).unwrap();
        let agent = IotAgentClient::new(&DeviceRoute::for_weather(&cfg)).unwrap();
        let payload = cycle(&client, &agent, &cfg.weather).await.unwrap();
        assert!(payload.starts_with("temperature|21.3"));
    }

    #[tokio::test]
    async fn run_requires_api_url() {
        let cfg = BridgeConfig::default();
        let err = run(cfg).await.unwrap_err();
        assert!(err.to_string().contains("api_url"));
    }
}
