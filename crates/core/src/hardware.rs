//! Narrow interfaces to the robot's drivers.
//!
//! The controller never talks to pins, PWM slices or the pixel bus directly;
//! it goes through these traits so the same loop runs against real drivers
//! or the simulated board.

use thiserror::Error;

use crate::commands::{Direction, Rgb};

pub const STRIP_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{device} fault: {reason}")]
pub struct HwError {
    pub device: &'static str,
    pub reason: String,
}

impl HwError {
    pub fn new(device: &'static str, reason: impl Into<String>) -> Self {
        Self { device, reason: reason.into() }
    }
}

pub type HwResult<T> = Result<T, HwError>;

pub trait DriveActuator {
    /// Start moving in `direction` at `speed` percent (0..=100).
    fn drive(&mut self, direction: Direction, speed: u8) -> HwResult<()>;
    fn stop(&mut self) -> HwResult<()>;
}

pub trait LightStrip {
    fn set_pixel(&mut self, index: usize, color: Rgb) -> HwResult<()>;
    fn render(&mut self) -> HwResult<()>;
}

/// A single digital output such as the buzzer or the status LED.
pub trait OutputPin {
    fn set(&mut self, on: bool) -> HwResult<()>;
}

/// Button line simulated through a GPIO: pressed pulls it to ground as an
/// output, released floats it as an input.
pub trait Relay {
    fn set_pressed(&mut self, pressed: bool) -> HwResult<()>;
}

/// Raw 16-bit ADC counts.
pub trait AnalogSensors {
    fn read_battery_raw(&mut self) -> HwResult<u16>;
    fn read_temp_raw(&mut self) -> HwResult<u16>;
}

/// All actuators the dispatcher drives, owned by the controller.
pub struct Peripherals {
    pub drive: Box<dyn DriveActuator + Send>,
    pub strip: Box<dyn LightStrip + Send>,
    pub buzzer: Box<dyn OutputPin + Send>,
    pub status_led: Box<dyn OutputPin + Send>,
    pub relay: Box<dyn Relay + Send>,
}
