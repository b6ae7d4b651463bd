//! Bridge configuration: a TOML file with per-section defaults that match the
//! deployed platform instance, so an empty file (or no file at all) yields a
//! runnable configuration for local testing.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Top-level configuration for every bridge entry point.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub server: ServerConfig,
    pub sensor: SensorConfig,
    pub agent: AgentConfig,
    pub fiware: FiwareConfig,
    pub weather: WeatherConfig,
    pub provision: ProvisionConfig,
}

/// Push-gateway listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the gateway binds to.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
        }
    }
}

/// Expected identity of the pushing sensor gateway plus the static
/// sense-id → attribute translation tables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Expected `User-Agent` header value.
    pub user_agent: String,
    /// Expected `Connectorname` header value.
    pub connector_name: String,
    /// Expected `Deviceauthuuid` header value.
    pub device_id: String,
    /// Attribute name → sense id. Every entry must resolve against the
    /// readings of an accepted push.
    pub attribute_mapping: BTreeMap<String, String>,
    /// Order and key names of the outbound UL2.0 fields. Never derived from
    /// map iteration order.
    pub wire_order: Vec<WireField>,
}

/// One field of the outbound UL2.0 payload: the wire key and the attribute
/// (from `attribute_mapping`) whose value it carries.
#[derive(Debug, Clone, Deserialize)]
pub struct WireField {
    pub key: String,
    pub attribute: String,
}

impl Default for SensorConfig {
    fn default() -> Self {
        let attribute_mapping = [
            ("temperature", "0x00060100"),
            ("relativeHumidity", "0x00060200"),
            ("airPressure", "0x00060400"),
            ("batteryLevel", "0x00030200"),
        ]
        .into_iter()
        .map(|(attribute, sense_id)| (attribute.to_string(), sense_id.to_string()))
        .collect();

        let wire_order = [
            ("temp", "temperature"),
            ("humidity", "relativeHumidity"),
            ("pressure", "airPressure"),
            ("battery", "batteryLevel"),
        ]
        .into_iter()
        .map(|(key, attribute)| WireField {
            key: key.to_string(),
            attribute: attribute.to_string(),
        })
        .collect();

        Self {
            user_agent: "tsone/0.3".to_string(),
            connector_name: "Thingsee Cloud".to_string(),
            device_id: "24f318a0-b5cb-11e8-8794-75c2cccfc6a6".to_string(),
            attribute_mapping,
            wire_order,
        }
    }
}

/// Downstream IoT Agent endpoint used by the push gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Base URL of the IoT Agent, e.g. `http://host:7896`.
    pub base_url: String,
    /// Measure path on the agent.
    pub base_path: String,
    /// API key of the UL2.0 service (`k` query parameter).
    pub api_key: String,
    /// Device id the readings are attributed to (`i` query parameter).
    pub device_id: String,
    /// Outbound request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:7896".to_string(),
            base_path: "/iot/d".to_string(),
            api_key: "thingsee-def8".to_string(),
            device_id: "c6a6-238a".to_string(),
            timeout_secs: 15,
        }
    }
}

/// Tenant headers attached to every delivery from the push gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FiwareConfig {
    pub service: String,
    pub service_path: String,
}

impl Default for FiwareConfig {
    fn default() -> Self {
        Self {
            service: "indoor_air".to_string(),
            service_path: "/uoo/ts280".to_string(),
        }
    }
}

/// Default payload template for the weather poller. The placeholders match
/// the fields extracted from the weather API document.
pub const DEFAULT_WEATHER_TEMPLATE: &str = "temperature|{temperature}|humidity|{humidity}\
|pressure|{pressure}|wind_speed|{wind_speed}|wind_dir|{wind_direction}\
|weather_type|{weather_type}";

/// Weather-poller settings. The poller impersonates its own UL2.0 device and
/// tenant, independent of the push gateway's.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Full URL of the weather API document to poll. Must be set; there is
    /// no usable default because the upstream requires an API key.
    pub api_url: String,
    /// Entity the observations belong to.
    pub entity_id: String,
    /// Device suffix; the effective device id is `<entity_id>-<device_id>`.
    pub device_id: String,
    /// API key of the weather UL2.0 service.
    pub api_key: String,
    pub service: String,
    pub service_path: String,
    /// UL2.0 payload template with `{placeholder}` substitution points.
    pub payload_template: String,
    /// Seconds between polls.
    pub poll_interval_secs: u64,
    /// Seconds slept between delivery retries.
    pub retry_delay_secs: u64,
    /// Delivery attempts per observation before the cycle gives up.
    pub retry_attempts: u32,
}

impl WeatherConfig {
    /// Effective UL2.0 device id, `<entity_id>-<device_id>`.
    pub fn full_device_id(&self) -> String {
        format!("{}-{}", self.entity_id, self.device_id)
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            entity_id: "0e72".to_string(),
            device_id: "ae68".to_string(),
            api_key: "raspberrypi-sensors".to_string(),
            service: "weather".to_string(),
            service_path: "/oulu".to_string(),
            payload_template: DEFAULT_WEATHER_TEMPLATE.to_string(),
            poll_interval_secs: 300,
            retry_delay_secs: 30,
            retry_attempts: 10,
        }
    }
}

/// Targets for one-shot platform provisioning (`provision` subcommand).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Orion context broker base URL.
    pub orion_url: String,
    /// IDAS device-management base URL.
    pub idas_url: String,
    pub service: String,
    pub service_path: String,
    /// API key registered for the UL2.0 service.
    pub api_key: String,
    pub entity_type: String,
    /// `[latitude, longitude]` of the observed entity.
    pub location: [f64; 2],
    pub timeout_secs: u64,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            orion_url: "http://127.0.0.1:1026".to_string(),
            idas_url: "http://127.0.0.1:4041".to_string(),
            service: "weather".to_string(),
            service_path: "/oulu".to_string(),
            api_key: "raspberrypi-sensors".to_string(),
            entity_type: "WeatherObserved".to_string(),
            location: [42.840_462_5, -2.512_327_7],
            timeout_secs: 15,
        }
    }
}

/// Load configuration from a TOML file, expanding `~` and `$VAR` in the path.
pub fn load(path: &str) -> Result<BridgeConfig> {
    let expanded = shellexpand::full(path)
        .with_context(|| format!("Failed to expand config path {path}"))?;
    let raw = std::fs::read_to_string(expanded.as_ref())
        .with_context(|| format!("Failed to read config file {expanded}"))?;
    let cfg = toml::from_str(&raw)
        .with_context(|| format!("Failed to parse config file {expanded}"))?;
    Ok(cfg)
}

/// Load the file at `path` when given, otherwise fall back to defaults.
pub fn load_or_default(path: Option<&str>) -> Result<BridgeConfig> {
    match path {
        Some(p) => load(p),
        None => Ok(BridgeConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_platform_instance() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.sensor.user_agent, "tsone/0.3");
        assert_eq!(cfg.sensor.connector_name, "Thingsee Cloud");
        assert_eq!(
            cfg.sensor.attribute_mapping.get("temperature").unwrap(),
            "0x00060100"
        );
        assert_eq!(cfg.agent.base_path, "/iot/d");
        assert_eq!(cfg.fiware.service, "indoor_air");
        assert_eq!(cfg.weather.poll_interval_secs, 300);
        assert_eq!(cfg.weather.full_device_id(), "0e72-ae68");
    }

    #[test]
    fn wire_order_default_is_fixed() {
        let cfg = SensorConfig::default();
        let keys: Vec<&str> = cfg.wire_order.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, ["temp", "humidity", "pressure", "battery"]);
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[sensor]\nuser_agent = \"tsone/0.4\"\n\n[agent]\nbase_url = \"http://agent:7896\"\n"
        )
        .unwrap();

        let cfg = load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(cfg.sensor.user_agent, "tsone/0.4");
        assert_eq!(cfg.agent.base_url, "http://agent:7896");
        // Unnamed sections keep their defaults.
        assert_eq!(cfg.sensor.connector_name, "Thingsee Cloud");
        assert_eq!(cfg.fiware.service_path, "/uoo/ts280");
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load("/definitely/not/here.toml").is_err());
    }

    #[test]
    fn no_path_yields_defaults() {
        let cfg = load_or_default(None).unwrap();
        assert_eq!(cfg.server.bind, "0.0.0.0:5000");
    }
}
