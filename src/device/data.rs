//! Typed views over merged VE.Direct fields.
//!
//! The shape of a device is decided from its merged fields each time data is
//! read; nothing here is stored in the session.

use crate::device::SessionSnapshot;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceShape {
    Mppt,
    BatteryMonitor,
    Unsupported,
}

impl DeviceShape {
    /// Solar chargers report their tracker mode (`MPPT`), battery monitors
    /// their state of charge (`SOC`). Either must hold a number to count.
    // a number is trimmed, non-empty and a finite f64, so "" and "0x10" are not numbers
    pub fn classify(snapshot: &SessionSnapshot) -> Self {
        if number(snapshot, "MPPT").is_some() {
            DeviceShape::Mppt
        } else if number(snapshot, "SOC").is_some() {
            DeviceShape::BatteryMonitor
        } else {
            DeviceShape::Unsupported
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum DeviceData {
    Mppt(MpptData),
    BatteryMonitor(BatteryMonitorData),
    Unsupported(UnsupportedData),
}

impl DeviceData {
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Self {
        match DeviceShape::classify(snapshot) {
            DeviceShape::Mppt => DeviceData::Mppt(MpptData::new(snapshot)),
            DeviceShape::BatteryMonitor => {
                DeviceData::BatteryMonitor(BatteryMonitorData::new(snapshot))
            }
            DeviceShape::Unsupported => DeviceData::Unsupported(UnsupportedData::new(snapshot)),
        }
    }

    pub fn shape(&self) -> DeviceShape {
        match self {
            DeviceData::Mppt(_) => DeviceShape::Mppt,
            DeviceData::BatteryMonitor(_) => DeviceShape::BatteryMonitor,
            DeviceData::Unsupported(_) => DeviceShape::Unsupported,
        }
    }

}

// MpptData {{{
/// Solar charge controller (BlueSolar / SmartSolar MPPT).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MpptData {
    pub serial_number: Option<String>,
    pub product_id: Option<String>,
    pub firmware: Option<String>,
    /// V
    pub battery_voltage: Option<f64>,
    /// A
    pub battery_current: Option<f64>,
    /// V
    pub panel_voltage: Option<f64>,
    /// W
    pub panel_power: Option<f64>,
    /// A
    pub load_current: Option<f64>,
    pub load_on: Option<bool>,
    pub charge_state: Option<&'static str>,
    pub tracker_mode: Option<&'static str>,
    pub error: Option<&'static str>,
    /// kWh
    pub yield_total: Option<f64>,
    /// kWh
    pub yield_today: Option<f64>,
    /// W
    pub max_power_today: Option<f64>,
    /// kWh
    pub yield_yesterday: Option<f64>,
    /// W
    pub max_power_yesterday: Option<f64>,
    pub day_sequence: Option<f64>,
    pub last_update: DateTime<Utc>,
}

impl MpptData {
    pub fn new(snapshot: &SessionSnapshot) -> Self {
        Self {
            serial_number: text(snapshot, "SER#"),
            product_id: text(snapshot, "PID"),
            firmware: text(snapshot, "FW"),
            battery_voltage: scaled(snapshot, "V", 1000.0),
            battery_current: scaled(snapshot, "I", 1000.0),
            panel_voltage: scaled(snapshot, "VPV", 1000.0),
            panel_power: number(snapshot, "PPV"),
            load_current: scaled(snapshot, "IL", 1000.0),
            load_on: on_off(snapshot, "LOAD"),
            charge_state: code(snapshot, "CS").map(ChargeState::from_value),
            tracker_mode: code(snapshot, "MPPT").map(TrackerMode::from_value),
            error: code(snapshot, "ERR").map(ChargerError::from_value),
            yield_total: scaled(snapshot, "H19", 100.0),
            yield_today: scaled(snapshot, "H20", 100.0),
            max_power_today: number(snapshot, "H21"),
            yield_yesterday: scaled(snapshot, "H22", 100.0),
            max_power_yesterday: number(snapshot, "H23"),
            day_sequence: number(snapshot, "HSDS"),
            last_update: snapshot.last_update,
        }
    }
} // }}}

// BatteryMonitorData {{{
/// Battery monitor (BMV / SmartShunt).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatteryMonitorData {
    pub serial_number: Option<String>,
    pub product_id: Option<String>,
    pub model: Option<String>,
    pub firmware: Option<String>,
    /// V
    pub battery_voltage: Option<f64>,
    /// V
    pub auxiliary_voltage: Option<f64>,
    /// V
    pub midpoint_voltage: Option<f64>,
    /// %
    pub midpoint_deviation: Option<f64>,
    /// A
    pub battery_current: Option<f64>,
    /// W
    pub power: Option<f64>,
    /// Ah
    pub consumed_ah: Option<f64>,
    /// %
    pub state_of_charge: Option<f64>,
    /// minutes, -1 while discharge is too small to estimate
    pub time_to_go: Option<f64>,
    pub alarm: Option<bool>,
    pub relay: Option<bool>,
    pub alarm_reason: Option<u32>,
    pub last_update: DateTime<Utc>,
}

impl BatteryMonitorData {
    pub fn new(snapshot: &SessionSnapshot) -> Self {
        Self {
            serial_number: text(snapshot, "SER#"),
            product_id: text(snapshot, "PID"),
            model: text(snapshot, "BMV"),
            firmware: text(snapshot, "FW"),
            battery_voltage: scaled(snapshot, "V", 1000.0),
            auxiliary_voltage: scaled(snapshot, "VS", 1000.0),
            midpoint_voltage: scaled(snapshot, "VM", 1000.0),
            midpoint_deviation: scaled(snapshot, "DM", 10.0),
            battery_current: scaled(snapshot, "I", 1000.0),
            power: number(snapshot, "P"),
            consumed_ah: scaled(snapshot, "CE", 1000.0),
            state_of_charge: scaled(snapshot, "SOC", 10.0),
            time_to_go: number(snapshot, "TTG"),
            alarm: on_off(snapshot, "Alarm"),
            relay: on_off(snapshot, "Relay"),
            alarm_reason: code(snapshot, "AR"),
            last_update: snapshot.last_update,
        }
    }
} // }}}

/// A device that is neither a charger nor a monitor; raw fields only.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UnsupportedData {
    pub fields: BTreeMap<String, String>,
    pub last_update: DateTime<Utc>,
}

impl UnsupportedData {
    pub fn new(snapshot: &SessionSnapshot) -> Self {
        Self {
            fields: snapshot.fields.clone(),
            last_update: snapshot.last_update,
        }
    }
}

pub struct ChargeState;
impl ChargeState {
    pub fn from_value(value: u32) -> &'static str {
        match value {
            0 => "Off",
            1 => "Low power",
            2 => "Fault",
            3 => "Bulk",
            4 => "Absorption",
            5 => "Float",
            6 => "Storage",
            7 => "Equalize (manual)",
            9 => "Inverting",
            11 => "Power supply",
            245 => "Starting-up",
            246 => "Repeated absorption",
            247 => "Auto equalize / Recondition",
            248 => "BatterySafe",
            252 => "External control",
            _ => "Unknown",
        }
    }
}

pub struct TrackerMode;
impl TrackerMode {
    pub fn from_value(value: u32) -> &'static str {
        match value {
            0 => "Off",
            1 => "Voltage or current limited",
            2 => "MPP tracker active",
            _ => "Unknown",
        }
    }
}

pub struct ChargerError;
impl ChargerError {
    pub fn from_value(value: u32) -> &'static str {
        match value {
            0 => "No error",
            2 => "Battery voltage too high",
            17 => "Charger temperature too high",
            18 => "Charger over current",
            19 => "Charger current reversed",
            20 => "Bulk time limit exceeded",
            21 => "Current sensor issue",
            26 => "Terminals overheated",
            28 => "Converter issue",
            33 => "Input voltage too high (solar panel)",
            34 => "Input current too high (solar panel)",
            38 => "Input shutdown (excessive battery voltage)",
            39 => "Input shutdown (due to current flow during off mode)",
            65 => "Lost communication with one of devices",
            66 => "Synchronised charging device configuration issue",
            67 => "BMS connection lost",
            68 => "Network misconfigured",
            116 => "Factory calibration data lost",
            117 => "Invalid/incompatible firmware",
            119 => "User settings invalid",
            _ => "Unknown",
        }
    }
}

fn text(snapshot: &SessionSnapshot, label: &str) -> Option<String> {
    snapshot.get(label).map(str::to_string)
}

fn number(snapshot: &SessionSnapshot, label: &str) -> Option<f64> {
    snapshot
        .get(label)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn scaled(snapshot: &SessionSnapshot, label: &str, divisor: f64) -> Option<f64> {
    number(snapshot, label).map(|v| v / divisor)
}

fn code(snapshot: &SessionSnapshot, label: &str) -> Option<u32> {
    snapshot.get(label).and_then(|v| v.trim().parse().ok())
}

fn on_off(snapshot: &SessionSnapshot, label: &str) -> Option<bool> {
    match snapshot.get(label)?.trim() {
        "ON" => Some(true),
        "OFF" => Some(false),
        _ => None,
    }
}
