//! One-shot platform provisioning: register the observed entity with the
//! Orion context broker and the UL2.0 service + device with IDAS, then print
//! the ids the poller should be configured with.
//!
//! Mirrors the platform bootstrap flow: version check, entity registration
//! with a GeoJSON point, IoT-service registration (409 means "already
//! registered"), and device registration that also derives the UL2.0 payload
//! template from the measurement set.

use crate::config::ProvisionConfig;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

/// One measurement a registered device reports: the UL2.0 object id, the
/// context attribute it maps to, its NGSI type, and the template placeholder
/// the poller fills in.
pub struct Measurement {
    pub object_id: &'static str,
    pub attribute: &'static str,
    pub value_type: &'static str,
    pub placeholder: &'static str,
}

/// Full measurement set of the weather device.
pub const MEASUREMENTS: &[Measurement] = &[
    Measurement {
        object_id: "temperature",
        attribute: "temperature",
        value_type: "Number",
        placeholder: "temperature",
    },
    Measurement {
        object_id: "humidity",
        attribute: "relativeHumidity",
        value_type: "Number",
        placeholder: "humidity",
    },
    Measurement {
        object_id: "pressure",
        attribute: "atmosphericPressure",
        value_type: "Number",
        placeholder: "pressure",
    },
    Measurement {
        object_id: "wind_speed",
        attribute: "windSpeed",
        value_type: "Number",
        placeholder: "wind_speed",
    },
    Measurement {
        object_id: "wind_dir",
        attribute: "windDirection",
        value_type: "Number",
        placeholder: "wind_direction",
    },
    Measurement {
        object_id: "weather_type",
        attribute: "weatherType",
        value_type: "Text",
        placeholder: "weather_type",
    },
];

/// Result of a device registration: the generated device suffix and the
/// payload template derived from the measurement set.
#[derive(Debug)]
pub struct DeviceRegistration {
    pub device_id: String,
    pub payload_template: String,
}

/// Random 4-hex-char id, the tail of a dashless UUIDv4.
pub fn short_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[id.len() - 4..].to_string()
}

/// Minimum viable `WeatherObserved` entity document.
pub fn station_entity(station_id: &str, location: [f64; 2], entity_type: &str) -> Value {
    json!({
        "id": station_id,
        "type": entity_type,
        "location": {
            "value": {
                "type": "Point",
                "coordinates": location,
            },
            "type": "geo:json",
        },
        "dateObserved": {
            "value": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            "type": "DateTime",
        },
        "name": {
            "value": "OpenWeatherMap",
            "type": "Text",
        },
        "source": {
            "value": "ul20-bridge",
            "type": "Text",
        },
    })
}

/// Device document for IDAS plus the derived UL2.0 payload template.
pub fn device_document(
    entity_id: &str,
    device_id: &str,
    entity_type: &str,
    measurements: &[Measurement],
) -> (Value, String) {
    let attributes: Vec<Value> = measurements
        .iter()
        .map(|m| {
            json!({
                "object_id": m.object_id,
                "name": format!("{}:{}", m.attribute, device_id),
                "type": m.value_type,
            })
        })
        .collect();

    let template = measurements
        .iter()
        .map(|m| format!("{}|{{{}}}", m.object_id, m.placeholder))
        .collect::<Vec<_>>()
        .join("|");

    let document = json!({
        "device_id": format!("{entity_id}-{device_id}"),
        "entity_name": entity_id,
        "entity_type": entity_type,
        "protocol": "UL20",
        "timezone": "Europe/Helsinki",
        "attributes": attributes,
    });

    (document, template)
}

/// HTTP client for the Orion and IDAS registration endpoints.
pub struct Provisioner {
    http: reqwest::Client,
    cfg: ProvisionConfig,
}

impl Provisioner {
    pub fn new(cfg: ProvisionConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent(concat!("ul20-bridge/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, cfg })
    }

    fn tenant_headers(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("Accept", "application/json")
            .header("Fiware-Service", &self.cfg.service)
            .header("Fiware-ServicePath", &self.cfg.service_path)
    }

    /// `GET <orion>/version` — broker liveness check.
    pub async fn check_broker(&self) -> Result<()> {
        let url = format!("{}/version", self.cfg.orion_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Orion is unreachable at {url}"))?;
        anyhow::ensure!(
            resp.status().is_success(),
            "Orion version check returned {}",
            resp.status()
        );
        tracing::info!("Orion is up");
        Ok(())
    }

    /// Register the observed entity. Returns its (possibly generated) id.
    pub async fn register_entity(&self, station_id: Option<String>) -> Result<String> {
        let station_id = station_id.unwrap_or_else(short_id);
        let body = station_entity(&station_id, self.cfg.location, &self.cfg.entity_type);

        let url = format!("{}/v2/entities", self.cfg.orion_url);
        let resp = self
            .tenant_headers(self.http.post(&url))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("entity registration request to {url} failed"))?;

        let status = resp.status();
        anyhow::ensure!(
            status.is_success(),
            "entity registration returned {status}: {}",
            resp.text().await.unwrap_or_default()
        );

        tracing::info!(entity_id = %station_id, "entity registered");
        Ok(station_id)
    }

    /// Register the UL2.0 service. A 409 means it exists already and is
    /// treated as success.
    pub async fn register_service(&self) -> Result<()> {
        let body = json!({
            "services": [{
                "apikey": self.cfg.api_key,
                "cbroker": self.cfg.orion_url,
                "resource": "/iot/d",
                "entity_type": self.cfg.entity_type,
            }]
        });

        let url = format!("{}/iot/services", self.cfg.idas_url);
        let resp = self
            .tenant_headers(self.http.post(&url))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("service registration request to {url} failed"))?;

        let status = resp.status();
        if status == StatusCode::CONFLICT {
            tracing::info!("IoT service registered already, skipping");
            return Ok(());
        }
        anyhow::ensure!(
            status.is_success(),
            "service registration returned {status}: {}",
            resp.text().await.unwrap_or_default()
        );

        tracing::info!("IoT service registered");
        Ok(())
    }

    /// Register the weather device under `entity_id`.
    pub async fn register_device(&self, entity_id: &str) -> Result<DeviceRegistration> {
        let device_id = short_id();
        let (document, payload_template) =
            device_document(entity_id, &device_id, &self.cfg.entity_type, MEASUREMENTS);

        let url = format!("{}/iot/devices", self.cfg.idas_url);
        let resp = self
            .tenant_headers(self.http.post(&url))
            .json(&json!({ "devices": [document] }))
            .send()
            .await
            .with_context(|| format!("device registration request to {url} failed"))?;

        let status = resp.status();
        anyhow::ensure!(
            status.is_success(),
            "device registration returned {status}: {}",
            resp.text().await.unwrap_or_default()
        );

        tracing::info!(device_id = %device_id, "device registered");
        Ok(DeviceRegistration {
            device_id,
            payload_template,
        })
    }

    /// Full bootstrap: broker check, entity, service, device.
    pub async fn run(&self) -> Result<()> {
        self.check_broker().await?;
        let entity_id = self.register_entity(None).await?;
        self.register_service().await?;
        let device = self.register_device(&entity_id).await?;

        println!("entity_id = \"{entity_id}\"");
        println!("device_id = \"{}\"", device.device_id);
        println!("payload_template = \"{}\"", device.payload_template);
        Ok(())
    }
}

pub async fn run(config: crate::config::BridgeConfig) -> Result<()> {
    Provisioner::new(config.provision)?.run().await
}
