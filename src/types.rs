use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;

/// Temperature stored as Celsius internally; MELCloud reports Celsius
/// regardless of the account's display preference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Temperature(f64);

impl Temperature {
    pub fn from_celsius(c: f64) -> Self {
        Self(c)
    }

    pub fn from_fahrenheit(f: f64) -> Self {
        Self((f - 32.0) * (5.0 / 9.0))
    }

    pub fn celsius(&self) -> f64 {
        self.0
    }

    pub fn fahrenheit(&self) -> f64 {
        self.0 * (9.0 / 5.0) + 32.0
    }

    pub fn in_unit(&self, unit: TemperatureUnit) -> f64 {
        match unit {
            TemperatureUnit::Celsius => self.celsius(),
            TemperatureUnit::Fahrenheit => self.fahrenheit(),
        }
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}\u{00b0}C", self.0)
    }
}

/// Account-wide display unit. There is no per-device override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn from_use_fahrenheit(use_fahrenheit: bool) -> Self {
        if use_fahrenheit {
            TemperatureUnit::Fahrenheit
        } else {
            TemperatureUnit::Celsius
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "\u{00b0}C",
            TemperatureUnit::Fahrenheit => "\u{00b0}F",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceType {
    /// Air-to-air split unit.
    Ata,
    /// Air-to-water heat pump. Listed, never polled.
    Atw,
    /// Energy recovery ventilation unit.
    Erv,
    Other(u8),
}

impl DeviceType {
    pub fn from_melcloud(code: u8) -> Self {
        match code {
            0 => DeviceType::Ata,
            1 => DeviceType::Atw,
            3 => DeviceType::Erv,
            other => DeviceType::Other(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            DeviceType::Ata => 0,
            DeviceType::Atw => 1,
            DeviceType::Erv => 3,
            DeviceType::Other(code) => *code,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperationMode {
    Heat,
    Dry,
    Cool,
    Fan,
    Auto,
    Other(u8),
}

impl OperationMode {
    pub fn from_melcloud(code: u8) -> Self {
        match code {
            1 => OperationMode::Heat,
            2 => OperationMode::Dry,
            3 => OperationMode::Cool,
            7 => OperationMode::Fan,
            8 => OperationMode::Auto,
            other => OperationMode::Other(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VentilationMode {
    Recovery,
    Bypass,
    Auto,
    Other(u8),
}

impl VentilationMode {
    pub fn from_melcloud(code: u8) -> Self {
        match code {
            0 => VentilationMode::Recovery,
            1 => VentilationMode::Bypass,
            2 => VentilationMode::Auto,
            other => VentilationMode::Other(other),
        }
    }
}

/// Static identity of one physical unit, produced once by discovery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceDescriptor {
    pub device_id: i64,
    pub building_id: i64,
    pub device_type: DeviceType,
    pub name: String,
    /// The device entry exactly as the listing returned it.
    pub static_info: Value,
}

/// Fields only an ERV unit reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VentilationReadings {
    pub ventilation_mode: Option<VentilationMode>,
    pub supply_temperature: Option<Temperature>,
    pub outdoor_temperature: Option<Temperature>,
    pub room_co2_level: Option<u32>,
}

/// One decoded poll result. Replaced wholesale on every successful poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceState {
    /// Server-reported `LastCommunication`.
    pub timestamp: Option<NaiveDateTime>,
    pub power: bool,
    pub room_temperature: Option<Temperature>,
    pub set_temperature: Option<Temperature>,
    pub operation_mode: Option<OperationMode>,
    pub fan_speed: Option<u8>,
    pub vane_horizontal: Option<u8>,
    pub vane_vertical: Option<u8>,
    pub in_standby: bool,
    pub has_pending_command: bool,
    pub offline: bool,
    pub error_code: Option<i64>,
    pub error_message: Option<String>,
    pub ventilation: Option<VentilationReadings>,
    /// Full payload as fetched. Commands are complete-state bodies, so
    /// callers merge their change into a clone of this.
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub manufacturer: String,
    pub indoor_model: String,
    pub outdoor_model: String,
    pub serial_number: String,
    pub firmware_version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CommandKind {
    /// Power or other state change; marks the body with `HasPendingCommand`.
    Power,
    Other,
}

/// Everything the engine reports to its consumers.
#[derive(Debug, Clone)]
pub enum Event {
    Connected {
        account: String,
        context_key: String,
        devices: Vec<Arc<DeviceDescriptor>>,
        device_count: usize,
        unit: TemperatureUnit,
        unit_label: &'static str,
    },
    StateChanged {
        device: Arc<DeviceDescriptor>,
        state: DeviceState,
    },
    InfoChanged {
        device_id: i64,
        info: DeviceInfo,
    },
    Error {
        device_id: Option<i64>,
        message: String,
    },
    Debug {
        message: String,
    },
}
