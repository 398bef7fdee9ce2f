//! Simulated board used by the host controller and the tests.
//!
//! Every collaborator call is traced and appended to a shared call log, so a
//! test can assert on exactly what reached the "hardware".

use std::collections::HashSet;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

use crate::commands::{Direction, Rgb};
use crate::hardware::{
    AnalogSensors, DriveActuator, HwError, HwResult, LightStrip, OutputPin, Peripherals, Relay,
};

pub const DRIVE: &str = "drive";
pub const STRIP: &str = "strip";
pub const BUZZER: &str = "buzzer";
pub const STATUS_LED: &str = "status_led";
pub const RELAY: &str = "relay";
pub const ADC: &str = "adc";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwCall {
    Drive { direction: Direction, speed: u8 },
    Stop,
    SetPixel { index: usize, color: Rgb },
    Render,
    Buzzer(bool),
    StatusLed(bool),
    Relay { pressed: bool },
}

impl HwCall {
    pub fn is_drive(&self) -> bool {
        matches!(self, HwCall::Drive { .. })
    }
}

/// Relay line model: driven low while pressed, high impedance otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PinMode {
    OutputLow,
    #[default]
    Input,
}

#[derive(Debug, Default)]
struct Shared {
    calls: Mutex<Vec<HwCall>>,
    faults: Mutex<HashSet<&'static str>>,
    relay_mode: Mutex<PinMode>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn check(&self, device: &'static str) -> HwResult<()> {
        if lock(&self.faults).contains(device) {
            return Err(HwError::new(device, "injected fault"));
        }
        Ok(())
    }

    fn record(&self, call: HwCall) {
        lock(&self.calls).push(call);
    }
}

#[derive(Debug, Clone)]
pub struct SimBoard {
    shared: Arc<Shared>,
    sensors: SimSensors,
}

impl SimBoard {
    pub fn new(battery_raw: u16, temp_raw: u16) -> Self {
        let shared = Arc::new(Shared::default());
        let sensors = SimSensors {
            battery_raw: Arc::new(AtomicU16::new(battery_raw)),
            temp_raw: Arc::new(AtomicU16::new(temp_raw)),
            shared: shared.clone(),
        };
        Self { shared, sensors }
    }

    pub fn peripherals(&self) -> Peripherals {
        Peripherals {
            drive: Box::new(self.device(DRIVE)),
            strip: Box::new(self.device(STRIP)),
            buzzer: Box::new(self.device(BUZZER)),
            status_led: Box::new(self.device(STATUS_LED)),
            relay: Box::new(SimRelay { device: self.device(RELAY) }),
        }
    }

    /// Sensor handle; clones share the same raw readings.
    pub fn sensors(&self) -> SimSensors {
        self.sensors.clone()
    }

    pub fn calls(&self) -> Vec<HwCall> {
        lock(&self.shared.calls).clone()
    }

    pub fn take_calls(&self) -> Vec<HwCall> {
        std::mem::take(&mut *lock(&self.shared.calls))
    }

    pub fn relay_mode(&self) -> PinMode {
        *lock(&self.shared.relay_mode)
    }

    pub fn inject_fault(&self, device: &'static str) {
        lock(&self.shared.faults).insert(device);
    }

    pub fn clear_fault(&self, device: &'static str) {
        lock(&self.shared.faults).remove(device);
    }

    fn device(&self, name: &'static str) -> SimDevice {
        SimDevice { name, shared: self.shared.clone() }
    }
}

struct SimDevice {
    name: &'static str,
    shared: Arc<Shared>,
}

impl SimDevice {
    fn apply(&self, call: HwCall) -> HwResult<()> {
        self.shared.check(self.name)?;
        debug!(device = self.name, ?call, "sim");
        self.shared.record(call);
        Ok(())
    }
}

impl DriveActuator for SimDevice {
    fn drive(&mut self, direction: Direction, speed: u8) -> HwResult<()> {
        self.apply(HwCall::Drive { direction, speed: speed.min(100) })
    }

    fn stop(&mut self) -> HwResult<()> {
        self.apply(HwCall::Stop)
    }
}

impl LightStrip for SimDevice {
    fn set_pixel(&mut self, index: usize, color: Rgb) -> HwResult<()> {
        self.apply(HwCall::SetPixel { index, color })
    }

    fn render(&mut self) -> HwResult<()> {
        self.apply(HwCall::Render)
    }
}

impl OutputPin for SimDevice {
    fn set(&mut self, on: bool) -> HwResult<()> {
        match self.name {
            BUZZER => self.apply(HwCall::Buzzer(on)),
            _ => self.apply(HwCall::StatusLed(on)),
        }
    }
}

struct SimRelay {
    device: SimDevice,
}

impl Relay for SimRelay {
    fn set_pressed(&mut self, pressed: bool) -> HwResult<()> {
        self.device.apply(HwCall::Relay { pressed })?;
        let mode = if pressed { PinMode::OutputLow } else { PinMode::Input };
        let mut current = lock(&self.device.shared.relay_mode);
        let previous = std::mem::replace(&mut *current, mode);
        if previous != mode {
            trace!(from = ?previous, to = ?mode, "relay pin reconfigured");
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SimSensors {
    battery_raw: Arc<AtomicU16>,
    temp_raw: Arc<AtomicU16>,
    shared: Arc<Shared>,
}

impl SimSensors {
    pub fn set_battery_raw(&self, raw: u16) {
        self.battery_raw.store(raw, Ordering::Relaxed);
    }

    pub fn set_temp_raw(&self, raw: u16) {
        self.temp_raw.store(raw, Ordering::Relaxed);
    }
}

impl AnalogSensors for SimSensors {
    fn read_battery_raw(&mut self) -> HwResult<u16> {
        self.shared.check(ADC)?;
        Ok(self.battery_raw.load(Ordering::Relaxed))
    }

    fn read_temp_raw(&mut self) -> HwResult<u16> {
        self.shared.check(ADC)?;
        Ok(self.temp_raw.load(Ordering::Relaxed))
    }
}
