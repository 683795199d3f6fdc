use serde_json::Value;

use crate::types::{DeviceDescriptor, DeviceInfo};

pub const MANUFACTURER: &str = "Mitsubishi Electric";
pub const UNDEFINED: &str = "Undefined";

impl DeviceInfo {
    /// Derives the identity fields from the discovery entry. Every absent
    /// value renders as [`UNDEFINED`].
    pub fn from_descriptor(device: &DeviceDescriptor) -> Self {
        let entry = &device.static_info;
        let block = entry.get("Device").unwrap_or(&Value::Null);

        let units: &[Value] = match block.get("Units") {
            Some(Value::Array(units)) => units.as_slice(),
            _ => &[],
        };
        let first_model = |indoor: bool| {
            units
                .iter()
                .find(|u| u.get("IsIndoor").and_then(|v| v.as_bool()) == Some(indoor))
                .and_then(|u| text(u, "Model"))
        };

        DeviceInfo {
            manufacturer: MANUFACTURER.to_string(),
            indoor_model: or_undefined(first_model(true)),
            outdoor_model: or_undefined(first_model(false)),
            serial_number: or_undefined(text(entry, "SerialNumber").or_else(|| text(block, "SerialNumber"))),
            firmware_version: or_undefined(text(block, "FirmwareAppVersion")),
        }
    }
}

fn text(value: &Value, field: &str) -> Option<String> {
    match value.get(field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn or_undefined(value: Option<String>) -> String {
    value.unwrap_or_else(|| UNDEFINED.to_string())
}
