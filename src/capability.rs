use chrono::NaiveDateTime;
use serde_json::Value;

use crate::types::*;
use crate::{Error, Result};

/// Field set a device reports. The poller is identical for every class;
/// only decoding differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Climate,
    Ventilation,
}

impl Capability {
    pub fn for_type(device_type: DeviceType) -> Option<Self> {
        match device_type {
            DeviceType::Ata => Some(Capability::Climate),
            DeviceType::Erv => Some(Capability::Ventilation),
            DeviceType::Atw | DeviceType::Other(_) => None,
        }
    }

    pub fn decode(&self, raw: &Value) -> Result<DeviceState> {
        if !raw.is_object() {
            return Err(Error::Protocol("device state is not an object".into()));
        }
        let power = raw
            .get("Power")
            .and_then(|v| v.as_bool())
            .ok_or_else(|| Error::Protocol("device state has no Power field".into()))?;

        let ventilation = match self {
            Capability::Climate => None,
            Capability::Ventilation => Some(VentilationReadings {
                ventilation_mode: small_int(raw, "VentilationMode").map(VentilationMode::from_melcloud),
                supply_temperature: temperature(raw, "SupplyTemperature"),
                outdoor_temperature: temperature(raw, "OutdoorTemperature"),
                room_co2_level: raw
                    .get("RoomCO2Level")
                    .and_then(|v| v.as_u64())
                    .and_then(|v| u32::try_from(v).ok()),
            }),
        };

        let (vane_horizontal, vane_vertical) = match self {
            Capability::Climate => (small_int(raw, "VaneHorizontal"), small_int(raw, "VaneVertical")),
            Capability::Ventilation => (None, None),
        };

        Ok(DeviceState {
            timestamp: raw
                .get("LastCommunication")
                .and_then(|v| v.as_str())
                .and_then(parse_timestamp),
            power,
            room_temperature: temperature(raw, "RoomTemperature"),
            set_temperature: temperature(raw, "SetTemperature"),
            operation_mode: small_int(raw, "OperationMode").map(OperationMode::from_melcloud),
            fan_speed: small_int(raw, "SetFanSpeed"),
            vane_horizontal,
            vane_vertical,
            in_standby: flag(raw, "InStandbyMode"),
            has_pending_command: flag(raw, "HasPendingCommand"),
            offline: flag(raw, "Offline"),
            error_code: raw.get("ErrorCode").and_then(|v| v.as_i64()),
            error_message: raw
                .get("ErrorMessage")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            ventilation,
            raw: raw.clone(),
        })
    }
}

fn flag(raw: &Value, field: &str) -> bool {
    raw.get(field).and_then(|v| v.as_bool()).unwrap_or(false)
}

fn small_int(raw: &Value, field: &str) -> Option<u8> {
    raw.get(field)
        .and_then(|v| v.as_u64())
        .and_then(|v| u8::try_from(v).ok())
}

fn temperature(raw: &Value, field: &str) -> Option<Temperature> {
    raw.get(field).and_then(|v| v.as_f64()).map(Temperature::from_celsius)
}

// MELCloud sends naive timestamps, sometimes with fractional seconds.
fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ata_payload() -> Value {
        json!({
            "DeviceID": 100,
            "DeviceType": 0,
            "Power": true,
            "RoomTemperature": 21.5,
            "SetTemperature": 23.0,
            "SetFanSpeed": 3,
            "OperationMode": 1,
            "VaneHorizontal": 2,
            "VaneVertical": 0,
            "InStandbyMode": false,
            "HasPendingCommand": false,
            "Offline": false,
            "LastCommunication": "2024-01-15T08:30:12.345"
        })
    }

    #[test]
    fn decodes_climate_fields() {
        let state = Capability::Climate.decode(&ata_payload()).unwrap();
        assert!(state.power);
        assert!((state.room_temperature.unwrap().celsius() - 21.5).abs() < 0.01);
        assert!((state.set_temperature.unwrap().celsius() - 23.0).abs() < 0.01);
        assert_eq!(state.fan_speed, Some(3));
        assert_eq!(state.operation_mode, Some(OperationMode::Heat));
        assert_eq!(state.vane_horizontal, Some(2));
        assert!(state.ventilation.is_none());
        assert_eq!(
            state.timestamp.unwrap().format("%Y-%m-%d %H:%M:%S").to_string(),
            "2024-01-15 08:30:12"
        );
        assert_eq!(state.raw, ata_payload());
    }

    #[test]
    fn decodes_ventilation_fields() {
        let raw = json!({
            "Power": true,
            "RoomTemperature": 20.0,
            "SetTemperature": 21.0,
            "SetFanSpeed": 2,
            "OperationMode": 8,
            "VentilationMode": 1,
            "SupplyTemperature": 18.5,
            "OutdoorTemperature": 4.0,
            "RoomCO2Level": 640,
            "InStandbyMode": true,
            "ErrorCode": 8000,
            "ErrorMessage": ""
        });
        let state = Capability::Ventilation.decode(&raw).unwrap();
        let vent = state.ventilation.as_ref().unwrap();
        assert_eq!(vent.ventilation_mode, Some(VentilationMode::Bypass));
        assert!((vent.supply_temperature.unwrap().celsius() - 18.5).abs() < 0.01);
        assert!((vent.outdoor_temperature.unwrap().celsius() - 4.0).abs() < 0.01);
        assert_eq!(vent.room_co2_level, Some(640));
        assert!(state.in_standby);
        assert_eq!(state.error_code, Some(8000));
        assert_eq!(state.error_message, None);
        assert_eq!(state.vane_horizontal, None);
    }

    #[test]
    fn missing_power_is_an_error() {
        let err = Capability::Climate.decode(&json!({"RoomTemperature": 20.0})).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert!(Capability::Climate.decode(&json!([])).is_err());
    }

    #[test]
    fn capability_by_type() {
        assert_eq!(Capability::for_type(DeviceType::Ata), Some(Capability::Climate));
        assert_eq!(Capability::for_type(DeviceType::Erv), Some(Capability::Ventilation));
        assert_eq!(Capability::for_type(DeviceType::Atw), None);
        assert_eq!(Capability::for_type(DeviceType::Other(9)), None);
    }
}
