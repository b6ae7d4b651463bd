//! Reading extraction and attribute re-mapping for TS280 push notifications.
//!
//! A push body is a JSON array of messages; only the first message's `senses`
//! array carries readings. Each reading is `{"sId": "...", "val": ...}` where
//! the id is an opaque hex string and the value any JSON scalar. Readings are
//! flattened into an id → value table, then translated through the configured
//! attribute mapping and laid out in the configured wire order.

use crate::config::WireField;
use crate::error::BridgeError;
use crate::ul20::Ul20Payload;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// One message of a push notification. Fields other than `senses` are
/// accepted and ignored.
#[derive(Debug, Deserialize)]
pub struct PushMessage {
    #[serde(default)]
    pub senses: Vec<SenseReading>,
}

/// A single sensor reading inside a push message.
#[derive(Debug, Deserialize)]
pub struct SenseReading {
    #[serde(rename = "sId")]
    pub sense_id: String,
    pub val: Value,
}

/// Render a JSON scalar the way the wire format expects: strings bare,
/// numbers, booleans, and null in their JSON text form. Objects and arrays
/// have no UL2.0 representation.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(_) | Value::Bool(_) | Value::Null => Some(value.to_string()),
        Value::Object(_) | Value::Array(_) => None,
    }
}

/// Flatten the first message's readings into a sense-id → value table.
/// A later duplicate of the same id wins.
pub fn flatten_readings(
    messages: &[PushMessage],
) -> Result<BTreeMap<String, String>, BridgeError> {
    let first = messages
        .first()
        .ok_or_else(|| BridgeError::MalformedBody("empty message array".to_string()))?;

    if first.senses.is_empty() {
        return Err(BridgeError::MalformedBody(
            "message contains no senses".to_string(),
        ));
    }

    let mut readings = BTreeMap::new();
    for reading in &first.senses {
        let text = scalar_text(&reading.val).ok_or_else(|| BridgeError::UnsupportedValue {
            sense_id: reading.sense_id.clone(),
        })?;
        readings.insert(reading.sense_id.clone(), text);
    }
    Ok(readings)
}

/// Translate the flat readings through the attribute mapping. Every
/// configured attribute must resolve to a reading.
pub fn map_attributes(
    readings: &BTreeMap<String, String>,
    mapping: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>, BridgeError> {
    let mut mapped = BTreeMap::new();
    for (attribute, sense_id) in mapping {
        let value = readings
            .get(sense_id)
            .ok_or_else(|| BridgeError::MissingReading {
                attribute: attribute.clone(),
                sense_id: sense_id.clone(),
            })?;
        mapped.insert(attribute.clone(), value.clone());
    }
    Ok(mapped)
}

/// Lay the mapped attributes out in the configured wire order.
pub fn wire_payload(
    mapped: &BTreeMap<String, String>,
    wire_order: &[WireField],
) -> Result<Ul20Payload, BridgeError> {
    let mut payload = Ul20Payload::new();
    for field in wire_order {
        let value = mapped
            .get(&field.attribute)
            .ok_or_else(|| BridgeError::UnmappedAttribute {
                attribute: field.attribute.clone(),
            })?;
        payload.push(&field.key, value);
    }
    Ok(payload)
}

/// Full pipeline for one push body: flatten, re-map, encode.
pub fn map_push_body(
    messages: &[PushMessage],
    mapping: &BTreeMap<String, String>,
    wire_order: &[WireField],
) -> Result<String, BridgeError> {
    let readings = flatten_readings(messages)?;
    let mapped = map_attributes(&readings, mapping)?;
    Ok(wire_payload(&mapped, wire_order)?.encode())
}
