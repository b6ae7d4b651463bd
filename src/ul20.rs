//! UltraLight 2.0 wire format: `key|value` pairs joined with `|`, plus the
//! `{placeholder}` template rendering used by the weather poller and the
//! device-addressing query string.

/// An ordered UL2.0 payload under construction. Field order is whatever the
/// caller pushed; the encoder never reorders.
#[derive(Debug, Default)]
pub struct Ul20Payload {
    fields: Vec<(String, String)>,
}

impl Ul20Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.push((key.into(), value.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Encode as `k1|v1|k2|v2|…`.
    pub fn encode(&self) -> String {
        let mut parts = Vec::with_capacity(self.fields.len() * 2);
        for (key, value) in &self.fields {
            parts.push(key.as_str());
            parts.push(value.as_str());
        }
        parts.join("|")
    }
}

/// Substitute `{name}` placeholders in `template` with the given values.
/// Placeholders without a matching value are left untouched.
pub fn render_template(template: &str, values: &[(&str, String)]) -> String {
    let mut rendered = template.to_string();
    for (name, value) in values {
        rendered = rendered.replace(&format!("{{{name}}}"), value);
    }
    rendered
}

/// Build the measure URL for one device behind the IoT Agent:
/// `<base_url><base_path>?k=<api_key>&i=<device_id>`.
pub fn device_url(base_url: &str, base_path: &str, api_key: &str, device_id: &str) -> String {
    format!(
        "{base_url}{base_path}?k={k}&i={i}",
        k = urlencoding::encode(api_key),
        i = urlencoding::encode(device_id),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_joins_pairs_in_push_order() {
        let mut payload = Ul20Payload::new();
        payload.push("temp", "23.5");
        payload.push("humidity", "40");
        payload.push("battery", "88");
        assert_eq!(payload.encode(), "temp|23.5|humidity|40|battery|88");
    }

    #[test]
    fn empty_payload_encodes_empty() {
        assert_eq!(Ul20Payload::new().encode(), "");
        assert!(Ul20Payload::new().is_empty());
    }

    #[test]
    fn render_substitutes_known_placeholders() {
        let out = render_template(
            "temperature|{temperature}|wind_dir|{wind_direction}",
            &[
                ("temperature", "21.3".to_string()),
                ("wind_direction", "180".to_string()),
            ],
        );
        assert_eq!(out, "temperature|21.3|wind_dir|180");
    }

    #[test]
    fn render_leaves_unknown_placeholders() {
        let out = render_template("a|{a}|b|{b}", &[("a", "1".to_string())]);
        assert_eq!(out, "a|1|b|{b}");
    }

    #[test]
    fn device_url_encodes_query_values() {
        let url = device_url("http://agent:7896", "/iot/d", "key with space", "0e72-ae68");
        assert_eq!(
            url,
            "http://agent:7896/iot/d?k=key%20with%20space&i=0e72-ae68"
        );
    }
}
