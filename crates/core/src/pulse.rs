use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::hardware::HwResult;
use crate::protocol::{Outbound, INFO_PRESS, INFO_PULSE_ABORT, INFO_PULSE_DONE, INFO_PULSE_START, INFO_RELEASE};
use crate::state::Actuators;

pub const DEFAULT_HOLD: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulsePhase {
    Idle,
    /// Released at start; press when `until` passes.
    Released { until: Instant },
    /// Pressed; release and finish when `until` passes.
    Pressed { until: Instant },
}

/// Toy button pulse: release, hold, press, hold, release.
///
/// Runs off deadlines checked by [`PulseSequence::poll`] instead of sleeping,
/// so the main loop keeps reading commands and sampling telemetry meanwhile.
#[derive(Debug, Clone)]
pub struct PulseSequence {
    phase: PulsePhase,
    hold: Duration,
}

impl PulseSequence {
    pub fn new(hold: Duration) -> Self {
        Self { phase: PulsePhase::Idle, hold }
    }

    pub fn phase(&self) -> PulsePhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase != PulsePhase::Idle
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match self.phase {
            PulsePhase::Idle => None,
            PulsePhase::Released { until } | PulsePhase::Pressed { until } => Some(until),
        }
    }

    /// Returns false, without side effects, if a sequence is already running.
    pub fn start(&mut self, now: Instant, act: &mut Actuators, out: &mut Vec<Outbound>) -> HwResult<bool> {
        if self.is_active() {
            return Ok(false);
        }
        out.push(Outbound::state(INFO_PULSE_START));
        release(act, out)?;
        self.phase = PulsePhase::Released { until: now + self.hold };
        info!(hold_ms = self.hold.as_millis() as u64, "toy pulse started");
        Ok(true)
    }

    pub fn poll(&mut self, now: Instant, act: &mut Actuators, out: &mut Vec<Outbound>) -> HwResult<()> {
        match self.phase {
            // A failed press ends the sequence; the relay is still released.
            PulsePhase::Released { until } if now >= until => {
                self.phase = PulsePhase::Idle;
                press(act, out)?;
                self.phase = PulsePhase::Pressed { until: now + self.hold };
            }
            // Stays Pressed until the release succeeds, so later polls retry it.
            PulsePhase::Pressed { until } if now >= until => {
                release(act, out)?;
                self.phase = PulsePhase::Idle;
                out.push(Outbound::state(INFO_PULSE_DONE));
                info!("toy pulse complete");
            }
            _ => {}
        }
        Ok(())
    }

    /// Abort a running sequence, leaving the relay released.
    pub fn cancel(&mut self, act: &mut Actuators, out: &mut Vec<Outbound>) -> HwResult<()> {
        let phase = self.phase;
        match phase {
            PulsePhase::Idle => return Ok(()),
            PulsePhase::Pressed { .. } => release(act, out)?,
            PulsePhase::Released { .. } => {}
        }
        self.phase = PulsePhase::Idle;
        out.push(Outbound::state(INFO_PULSE_ABORT));
        debug!(?phase, "toy pulse cancelled");
        Ok(())
    }
}

pub(crate) fn press(act: &mut Actuators, out: &mut Vec<Outbound>) -> HwResult<()> {
    act.press()?;
    out.push(Outbound::state(INFO_PRESS));
    Ok(())
}

pub(crate) fn release(act: &mut Actuators, out: &mut Vec<Outbound>) -> HwResult<()> {
    act.release()?;
    out.push(Outbound::state(INFO_RELEASE));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{HwCall, SimBoard, RELAY};
    use crate::state::RelayState;

    fn setup() -> (SimBoard, Actuators, PulseSequence) {
        let board = SimBoard::new(0, 0);
        let act = Actuators::new(board.peripherals());
        (board, act, PulseSequence::new(DEFAULT_HOLD))
    }

    fn texts(out: &[Outbound]) -> Vec<String> {
        out.iter().map(Outbound::to_json).collect()
    }

    #[test]
    fn runs_release_press_release_on_deadlines() {
        let (board, mut act, mut pulse) = setup();
        let t0 = Instant::now();
        let mut out = Vec::new();

        assert!(pulse.start(t0, &mut act, &mut out).unwrap());
        assert_eq!(pulse.next_deadline(), Some(t0 + DEFAULT_HOLD));

        pulse.poll(t0 + Duration::from_millis(1999), &mut act, &mut out).unwrap();
        assert_eq!(out.len(), 2);

        pulse.poll(t0 + DEFAULT_HOLD, &mut act, &mut out).unwrap();
        assert_eq!(act.state().relay, RelayState::Pressed);

        let t1 = t0 + DEFAULT_HOLD;
        pulse.poll(t1 + Duration::from_millis(1999), &mut act, &mut out).unwrap();
        assert_eq!(out.len(), 3);
        pulse.poll(t1 + DEFAULT_HOLD, &mut act, &mut out).unwrap();

        assert!(!pulse.is_active());
        assert_eq!(act.state().relay, RelayState::Released);
        assert_eq!(
            texts(&out),
            vec![
                format!(r#"{{"State":"{INFO_PULSE_START}"}}"#),
                format!(r#"{{"State":"{INFO_RELEASE}"}}"#),
                format!(r#"{{"State":"{INFO_PRESS}"}}"#),
                format!(r#"{{"State":"{INFO_RELEASE}"}}"#),
                format!(r#"{{"State":"{INFO_PULSE_DONE}"}}"#),
            ]
        );
        assert_eq!(
            board.calls(),
            vec![
                HwCall::Relay { pressed: false },
                HwCall::Relay { pressed: true },
                HwCall::Relay { pressed: false },
            ]
        );
    }

    #[test]
    fn second_start_is_ignored_while_running() {
        let (_board, mut act, mut pulse) = setup();
        let t0 = Instant::now();
        let mut out = Vec::new();
        pulse.start(t0, &mut act, &mut out).unwrap();
        out.clear();
        assert!(!pulse.start(t0, &mut act, &mut out).unwrap());
        assert!(out.is_empty());
    }

    #[test]
    fn cancel_while_pressed_releases_the_relay() {
        let (_board, mut act, mut pulse) = setup();
        let t0 = Instant::now();
        let mut out = Vec::new();
        pulse.start(t0, &mut act, &mut out).unwrap();
        pulse.poll(t0 + DEFAULT_HOLD, &mut act, &mut out).unwrap();
        out.clear();

        pulse.cancel(&mut act, &mut out).unwrap();
        assert_eq!(act.state().relay, RelayState::Released);
        assert_eq!(
            texts(&out),
            vec![
                format!(r#"{{"State":"{INFO_RELEASE}"}}"#),
                format!(r#"{{"State":"{INFO_PULSE_ABORT}"}}"#),
            ]
        );
        assert!(!pulse.is_active());
    }

    #[test]
    fn failed_final_release_is_retried_on_next_poll() {
        let (board, mut act, mut pulse) = setup();
        let t0 = Instant::now();
        let mut out = Vec::new();
        pulse.start(t0, &mut act, &mut out).unwrap();
        let pressed_at = t0 + DEFAULT_HOLD;
        pulse.poll(pressed_at, &mut act, &mut out).unwrap();
        out.clear();

        board.inject_fault(RELAY);
        let due = pressed_at + DEFAULT_HOLD;
        assert!(pulse.poll(due, &mut act, &mut out).is_err());
        assert_eq!(pulse.phase(), PulsePhase::Pressed { until: due });
        assert_eq!(act.state().relay, RelayState::Pressed);
        assert!(out.is_empty());

        board.clear_fault(RELAY);
        pulse.poll(due + DEFAULT_HOLD, &mut act, &mut out).unwrap();
        assert_eq!(pulse.phase(), PulsePhase::Idle);
        assert_eq!(act.state().relay, RelayState::Released);
        assert_eq!(
            texts(&out),
            vec![
                format!(r#"{{"State":"{INFO_RELEASE}"}}"#),
                format!(r#"{{"State":"{INFO_PULSE_DONE}"}}"#),
            ]
        );
    }

    #[test]
    fn failed_cancel_keeps_the_sequence_pressed() {
        let (board, mut act, mut pulse) = setup();
        let t0 = Instant::now();
        let mut out = Vec::new();
        pulse.start(t0, &mut act, &mut out).unwrap();
        pulse.poll(t0 + DEFAULT_HOLD, &mut act, &mut out).unwrap();
        out.clear();

        board.inject_fault(RELAY);
        assert!(pulse.cancel(&mut act, &mut out).is_err());
        assert!(pulse.is_active());
        assert!(out.is_empty());

        board.clear_fault(RELAY);
        pulse.cancel(&mut act, &mut out).unwrap();
        assert!(!pulse.is_active());
        assert_eq!(act.state().relay, RelayState::Released);
    }

    #[test]
    fn cancel_when_idle_is_silent() {
        let (board, mut act, mut pulse) = setup();
        let mut out = Vec::new();
        pulse.cancel(&mut act, &mut out).unwrap();
        assert!(out.is_empty());
        assert!(board.calls().is_empty());
    }
}
