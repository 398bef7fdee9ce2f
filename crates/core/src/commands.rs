use std::fmt;
use std::str::FromStr;

use thiserror::Error;

// Commands decoded from one inbound JSON object. A single object can carry
// several keys, so one frame maps to an ordered list of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Drive(Direction, Edge),
    Speed(SpeedPreset),
    Buzzer(Switch),
    StatusLed(Switch),
    Rgb(Rgb),
    Toy(Switch),
    ToyPulse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Backward,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Forward,
        Direction::Backward,
        Direction::Left,
        Direction::Right,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Direction::Forward => "Forward",
            Direction::Backward => "Backward",
            Direction::Left => "Left",
            Direction::Right => "Right",
        }
    }

    pub fn is_turn(self) -> bool {
        matches!(self, Direction::Left | Direction::Right)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Press/release transition of a directional key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Down,
    Up,
}

impl Edge {
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "Down" => Some(Edge::Down),
            "Up" => Some(Edge::Up),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "on" => Some(Switch::On),
            "off" => Some(Switch::Off),
            _ => None,
        }
    }

    pub fn is_on(self) -> bool {
        self == Switch::On
    }

    pub fn label(self) -> &'static str {
        match self {
            Switch::On => "ON",
            Switch::Off => "OFF",
        }
    }
}

impl From<bool> for Switch {
    fn from(on: bool) -> Self {
        if on { Switch::On } else { Switch::Off }
    }
}

// Turning ignores the preset and always runs at this duty.
pub const TURN_SPEED: u8 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeedPreset {
    Low,
    #[default]
    Medium,
    High,
}

impl SpeedPreset {
    pub fn duty(self) -> u8 {
        match self {
            SpeedPreset::Low => 30,
            SpeedPreset::Medium => 50,
            SpeedPreset::High => 80,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SpeedPreset::Low => "Low",
            SpeedPreset::Medium => "Medium",
            SpeedPreset::High => "High",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid RGB value {0:?}: expected three integers 0-255")]
pub struct RgbParseError(pub String);

/// Strict colour triple: `r,g,b` with optional surrounding parentheses and
/// whitespace. Each channel is a plain decimal integer in 0..=255.
impl FromStr for Rgb {
    type Err = RgbParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || RgbParseError(s.to_string());
        let trimmed = s.trim();
        let inner = match trimmed.strip_prefix('(') {
            Some(rest) => rest.strip_suffix(')').ok_or_else(err)?,
            None => trimmed,
        };

        let mut channels = [0u8; 3];
        let mut parts = inner.split(',');
        for slot in channels.iter_mut() {
            let part = parts.next().ok_or_else(err)?.trim();
            if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(err());
            }
            *slot = part.parse::<u8>().map_err(|_| err())?;
        }
        if parts.next().is_some() {
            return Err(err());
        }

        let [r, g, b] = channels;
        Ok(Rgb { r, g, b })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_accepts_plain_and_parenthesised_triples() {
        assert_eq!("(255,0,0)".parse::<Rgb>(), Ok(Rgb::new(255, 0, 0)));
        assert_eq!("10, 20 ,30".parse::<Rgb>(), Ok(Rgb::new(10, 20, 30)));
        assert_eq!(" ( 0,0,7 ) ".parse::<Rgb>(), Ok(Rgb::new(0, 0, 7)));
    }

    #[test]
    fn rgb_rejects_anything_but_a_bounded_triple() {
        for bad in [
            "",
            "()",
            "(1,2)",
            "(1,2,3,4)",
            "(256,0,0)",
            "(-1,0,0)",
            "(1.5,0,0)",
            "(0x10,0,0)",
            "(1+1,0,0)",
            "__import__('os')",
            "(1,2,3",
            "1,2,3)",
            "(1,,3)",
            "(+1,2,3)",
            "(0001,2,3)",
        ] {
            assert!(bad.parse::<Rgb>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn rgb_displays_canonically() {
        assert_eq!(Rgb::new(255, 0, 0).to_string(), "(255,0,0)");
    }

    #[test]
    fn presets_map_to_duty() {
        assert_eq!(SpeedPreset::default(), SpeedPreset::Medium);
        assert_eq!(SpeedPreset::Low.duty(), 30);
        assert_eq!(SpeedPreset::Medium.duty(), 50);
        assert_eq!(SpeedPreset::High.duty(), 80);
    }
}
