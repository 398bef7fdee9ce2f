// Wire keys and fixed message texts matching the PicoGo firmware

use serde::Serialize;

use crate::commands::Switch;
use crate::telemetry::TelemetryReport;

// Inbound keys, in dispatch order
pub const FORWARD: &str = "Forward";
pub const BACKWARD: &str = "Backward";
pub const LEFT: &str = "Left";
pub const RIGHT: &str = "Right";
pub const LOW: &str = "Low";
pub const MEDIUM: &str = "Medium";
pub const HIGH: &str = "High";
pub const BUZZER: &str = "BZ";
pub const STATUS_LED: &str = "LED";
pub const RGB: &str = "RGB";
pub const TOY: &str = "ToyGPIO15";
pub const TOY_PULSE: &str = "ToyGPIO15Pulse";

pub const PULSE_TRIGGER: &str = "pulse";

// Info lines sent as {"State": ...}
pub const INFO_PRESS: &str = "[INFO] Simulating button press (connecting K2 to GND)";
pub const INFO_RELEASE: &str = "[INFO] Releasing button (disconnecting K2)";
pub const INFO_PULSE_START: &str = "[SETUP] Starting toy pulse sequence";
pub const INFO_PULSE_DONE: &str = "[DONE] Cycle complete";
pub const INFO_PULSE_ABORT: &str = "[ABORT] Toy pulse sequence cancelled";

pub const STOP: &str = "Stop";

/// One outbound JSON object. Every variant serializes to a flat object with
/// string values only.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outbound {
    Ack(Ack),
    Telemetry(TelemetryReport),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Ack {
    #[serde(rename = "State")]
    State(String),
    #[serde(rename = "BZ")]
    Buzzer(OnOff),
    #[serde(rename = "LED")]
    StatusLed(OnOff),
    #[serde(rename = "ToyGPIO15")]
    Toy(OnOff),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OnOff {
    #[serde(rename = "ON")]
    On,
    #[serde(rename = "OFF")]
    Off,
}

impl From<Switch> for OnOff {
    fn from(s: Switch) -> Self {
        match s {
            Switch::On => OnOff::On,
            Switch::Off => OnOff::Off,
        }
    }
}

impl Outbound {
    pub fn state(text: impl Into<String>) -> Self {
        Outbound::Ack(Ack::State(text.into()))
    }

    pub fn to_json(&self) -> String {
        // Only string fields; serialization cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl From<Ack> for Outbound {
    fn from(ack: Ack) -> Self {
        Outbound::Ack(ack)
    }
}
