use std::time::Instant;

use tracing::{debug, warn};

use crate::commands::{Command, Edge, Switch};
use crate::hardware::HwResult;
use crate::protocol::{Ack, Outbound, STOP};
use crate::pulse::{self, PulseSequence};
use crate::state::Actuators;

/// Apply decoded commands in order, appending acknowledgements to `out`.
///
/// Stops at the first hardware fault; acknowledgements for commands already
/// applied stay in `out`, the failing one gets none.
pub fn dispatch(
    commands: &[Command],
    now: Instant,
    act: &mut Actuators,
    pulse: &mut PulseSequence,
    out: &mut Vec<Outbound>,
) -> HwResult<()> {
    for cmd in commands {
        apply(*cmd, now, act, pulse, out)?;
    }
    Ok(())
}

fn apply(
    cmd: Command,
    now: Instant,
    act: &mut Actuators,
    pulse: &mut PulseSequence,
    out: &mut Vec<Outbound>,
) -> HwResult<()> {
    match cmd {
        Command::Drive(direction, Edge::Down) => {
            pulse.cancel(act, out)?;
            let speed = act.drive(direction)?;
            debug!(%direction, speed, "drive");
            out.push(Outbound::state(direction.name()));
        }
        // Any release stops all motion, whichever key was held.
        Command::Drive(direction, Edge::Up) => {
            pulse.cancel(act, out)?;
            act.stop()?;
            debug!(%direction, "stop");
            out.push(Outbound::state(STOP));
        }
        Command::Speed(preset) => {
            act.set_speed(preset);
            out.push(Outbound::state(preset.name()));
        }
        Command::Buzzer(s) => {
            act.set_buzzer(s.is_on())?;
            out.push(Ack::Buzzer(s.into()).into());
            out.push(Outbound::state(format!("BZ:{}", s.label())));
        }
        Command::StatusLed(s) => {
            act.set_status_led(s.is_on())?;
            out.push(Ack::StatusLed(s.into()).into());
            out.push(Outbound::state(format!("LED:{}", s.label())));
        }
        Command::Rgb(color) => {
            act.fill(color)?;
            out.push(Outbound::state(format!("RGB:{color}")));
        }
        Command::Toy(s) => {
            pulse.cancel(act, out)?;
            match s {
                Switch::On => pulse::press(act, out)?,
                Switch::Off => pulse::release(act, out)?,
            }
            out.push(Ack::Toy(s.into()).into());
        }
        Command::ToyPulse => {
            if !pulse.start(now, act, out)? {
                warn!("toy pulse already running; request ignored");
            }
        }
    }
    Ok(())
}
