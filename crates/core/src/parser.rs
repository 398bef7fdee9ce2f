use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::commands::{Command, Direction, Edge, Rgb, RgbParseError, SpeedPreset, Switch};
use crate::protocol::PULSE_TRIGGER;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed command message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("command message must be a JSON object")]
    NotAnObject,
    #[error(transparent)]
    Rgb(#[from] RgbParseError),
}

// Raw view of an inbound object. Unknown keys are dropped by serde; known
// keys keep their raw value so an unexpected value can be ignored instead of
// failing the whole message.
#[derive(Debug, Default, Deserialize)]
struct CommandMessage {
    #[serde(rename = "Forward")]
    forward: Option<Value>,
    #[serde(rename = "Backward")]
    backward: Option<Value>,
    #[serde(rename = "Left")]
    left: Option<Value>,
    #[serde(rename = "Right")]
    right: Option<Value>,
    #[serde(rename = "Low")]
    low: Option<Value>,
    #[serde(rename = "Medium")]
    medium: Option<Value>,
    #[serde(rename = "High")]
    high: Option<Value>,
    #[serde(rename = "BZ")]
    buzzer: Option<Value>,
    #[serde(rename = "LED")]
    led: Option<Value>,
    #[serde(rename = "RGB")]
    rgb: Option<Value>,
    #[serde(rename = "ToyGPIO15")]
    toy: Option<Value>,
    #[serde(rename = "ToyGPIO15Pulse")]
    toy_pulse: Option<Value>,
}

/// Parse one read from the transport.
///
/// `Ok(None)` means nothing arrived this tick. Any decode problem, including a
/// malformed RGB triple, rejects the whole message.
pub fn parse(raw: Option<&[u8]>) -> Result<Option<Vec<Command>>, ParseError> {
    match raw {
        None => Ok(None),
        Some(bytes) => decode(bytes).map(Some),
    }
}

/// Decode a single JSON object into commands, in fixed key order.
pub fn decode(bytes: &[u8]) -> Result<Vec<Command>, ParseError> {
    let value: Value = serde_json::from_slice(bytes)?;
    if !value.is_object() {
        return Err(ParseError::NotAnObject);
    }
    let msg: CommandMessage = serde_json::from_value(value)?;
    msg.into_commands()
}

impl CommandMessage {
    fn into_commands(self) -> Result<Vec<Command>, ParseError> {
        let mut out = Vec::new();

        let directions = [
            (Direction::Forward, &self.forward),
            (Direction::Backward, &self.backward),
            (Direction::Left, &self.left),
            (Direction::Right, &self.right),
        ];
        for (direction, value) in directions {
            if let Some(edge) = as_str(value).and_then(Edge::from_wire) {
                out.push(Command::Drive(direction, edge));
            }
        }

        let presets = [
            (SpeedPreset::Low, &self.low),
            (SpeedPreset::Medium, &self.medium),
            (SpeedPreset::High, &self.high),
        ];
        for (preset, value) in presets {
            if as_str(value).and_then(Edge::from_wire) == Some(Edge::Down) {
                out.push(Command::Speed(preset));
            }
        }

        if let Some(s) = as_str(&self.buzzer).and_then(Switch::from_wire) {
            out.push(Command::Buzzer(s));
        }
        if let Some(s) = as_str(&self.led).and_then(Switch::from_wire) {
            out.push(Command::StatusLed(s));
        }

        if let Some(value) = &self.rgb {
            let rgb = match value {
                Value::String(text) => text.parse::<Rgb>()?,
                other => return Err(RgbParseError(other.to_string()).into()),
            };
            out.push(Command::Rgb(rgb));
        }

        if let Some(s) = as_str(&self.toy).and_then(Switch::from_wire) {
            out.push(Command::Toy(s));
        }
        if as_str(&self.toy_pulse) == Some(PULSE_TRIGGER) {
            out.push(Command::ToyPulse);
        }

        Ok(out)
    }
}

fn as_str(value: &Option<Value>) -> Option<&str> {
    value.as_ref().and_then(Value::as_str)
}
