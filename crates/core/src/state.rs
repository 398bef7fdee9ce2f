use tracing::debug;

use crate::commands::{Direction, Rgb, SpeedPreset, TURN_SPEED};
use crate::hardware::{HwResult, Peripherals, STRIP_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelayState {
    #[default]
    Released,
    Pressed,
}

/// In-process record of what the actuators were last told to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActuatorState {
    pub speed: SpeedPreset,
    pub motion: Option<(Direction, u8)>,
    pub buzzer: bool,
    pub status_led: bool,
    pub relay: RelayState,
    pub color: Rgb,
}

impl Default for ActuatorState {
    fn default() -> Self {
        Self {
            speed: SpeedPreset::default(),
            motion: None,
            buzzer: false,
            status_led: true,
            relay: RelayState::Released,
            color: Rgb::BLACK,
        }
    }
}

/// Owns the peripherals and keeps [`ActuatorState`] in step with them.
///
/// State is only updated after the collaborator call succeeded, so on a
/// hardware fault it still describes the last applied setting.
pub struct Actuators {
    state: ActuatorState,
    hw: Peripherals,
}

impl Actuators {
    pub fn new(hw: Peripherals) -> Self {
        Self { state: ActuatorState::default(), hw }
    }

    pub fn state(&self) -> &ActuatorState {
        &self.state
    }

    /// Power-on settings: LED on, buzzer off, relay released, strip blank.
    pub fn init(&mut self) -> HwResult<()> {
        self.set_status_led(true)?;
        self.set_buzzer(false)?;
        self.release()?;
        self.fill(Rgb::BLACK)
    }

    /// Drive at the preset speed, or at the fixed turn speed for Left/Right.
    /// Returns the duty that was applied.
    pub fn drive(&mut self, direction: Direction) -> HwResult<u8> {
        let speed = if direction.is_turn() { TURN_SPEED } else { self.state.speed.duty() };
        self.hw.drive.drive(direction, speed)?;
        self.state.motion = Some((direction, speed));
        Ok(speed)
    }

    pub fn stop(&mut self) -> HwResult<()> {
        self.hw.drive.stop()?;
        self.state.motion = None;
        Ok(())
    }

    // Takes effect on the next drive() only.
    pub fn set_speed(&mut self, preset: SpeedPreset) {
        self.state.speed = preset;
    }

    pub fn set_buzzer(&mut self, on: bool) -> HwResult<()> {
        self.hw.buzzer.set(on)?;
        self.state.buzzer = on;
        Ok(())
    }

    pub fn set_status_led(&mut self, on: bool) -> HwResult<()> {
        self.hw.status_led.set(on)?;
        self.state.status_led = on;
        Ok(())
    }

    pub fn fill(&mut self, color: Rgb) -> HwResult<()> {
        for index in 0..STRIP_LEN {
            self.hw.strip.set_pixel(index, color)?;
        }
        self.hw.strip.render()?;
        self.state.color = color;
        Ok(())
    }

    pub fn press(&mut self) -> HwResult<()> {
        self.hw.relay.set_pressed(true)?;
        if self.state.relay == RelayState::Pressed {
            debug!("relay already pressed");
        }
        self.state.relay = RelayState::Pressed;
        Ok(())
    }

    pub fn release(&mut self) -> HwResult<()> {
        self.hw.relay.set_pressed(false)?;
        self.state.relay = RelayState::Released;
        Ok(())
    }
}
