pub mod commands;
pub mod controller;
pub mod dispatcher;
pub mod hardware;
pub mod parser;
pub mod protocol;
pub mod pulse;
pub mod sim;
pub mod state;
pub mod telemetry;

pub use commands::{Command, Direction, Edge, Rgb, SpeedPreset, Switch, TURN_SPEED};
pub use controller::{Controller, ControllerConfig, LoopStats};
pub use hardware::{AnalogSensors, DriveActuator, HwError, LightStrip, OutputPin, Peripherals, Relay};
pub use parser::{parse, ParseError};
pub use protocol::{Ack, OnOff, Outbound};
pub use pulse::PulsePhase;
pub use sim::{HwCall, PinMode, SimBoard, SimSensors};
pub use state::{ActuatorState, RelayState};
pub use telemetry::{TelemetryConfig, TelemetryReport, TelemetrySample};
