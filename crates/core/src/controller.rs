use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::dispatcher::dispatch;
use crate::hardware::{AnalogSensors, Peripherals};
use crate::parser;
use crate::protocol::{Outbound, INFO_RELEASE};
use crate::pulse::{PulsePhase, PulseSequence, DEFAULT_HOLD};
use crate::state::{ActuatorState, Actuators};
use crate::telemetry::{TelemetryConfig, TelemetrySampler};

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub telemetry: TelemetryConfig,
    pub pulse_hold: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            telemetry: TelemetryConfig::default(),
            pulse_hold: DEFAULT_HOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub frames: u64,
    pub rejected: u64,
    pub hw_faults: u64,
    pub telemetry_sent: u64,
}

/// The command-and-telemetry loop body.
///
/// Owns all actuator state; the caller feeds it one iteration at a time with
/// the current time and whatever the transport produced, and writes the
/// returned messages back out. Nothing here blocks or returns an error.
pub struct Controller {
    act: Actuators,
    pulse: PulseSequence,
    sampler: TelemetrySampler,
    sensors: Box<dyn AnalogSensors + Send>,
    stats: LoopStats,
}

impl Controller {
    pub fn new(
        config: ControllerConfig,
        hw: Peripherals,
        sensors: Box<dyn AnalogSensors + Send>,
        now: Instant,
    ) -> Self {
        Self {
            act: Actuators::new(hw),
            pulse: PulseSequence::new(config.pulse_hold),
            sampler: TelemetrySampler::new(config.telemetry, now),
            sensors,
            stats: LoopStats::default(),
        }
    }

    pub fn state(&self) -> &ActuatorState {
        self.act.state()
    }

    pub fn pulse_phase(&self) -> PulsePhase {
        self.pulse.phase()
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Earliest time at which [`Controller::poll`] has work to do.
    pub fn next_deadline(&self) -> Instant {
        let telemetry = self.sampler.next_deadline();
        match self.pulse.next_deadline() {
            Some(pulse) => pulse.min(telemetry),
            None => telemetry,
        }
    }

    /// Power-on sequence. Announces the released relay like the firmware does.
    pub fn start(&mut self) -> Vec<Outbound> {
        let mut out = Vec::new();
        match self.act.init() {
            Ok(()) => {
                out.push(Outbound::state(INFO_RELEASE));
                info!(state = ?self.act.state(), "actuators initialised");
            }
            Err(err) => {
                self.stats.hw_faults += 1;
                error!(%err, "actuator init failed");
            }
        }
        out
    }

    /// Parse and dispatch one inbound read. `None` is the idle case.
    pub fn handle_frame(&mut self, now: Instant, raw: Option<&[u8]>) -> Vec<Outbound> {
        let mut out = Vec::new();
        let commands = match parser::parse(raw) {
            Ok(Some(commands)) => commands,
            Ok(None) => return out,
            Err(err) => {
                self.stats.rejected += 1;
                let preview = raw.map(String::from_utf8_lossy).unwrap_or_default();
                warn!(%err, raw = %preview, "dropping command message");
                return out;
            }
        };
        self.stats.frames += 1;
        debug!(?commands, "dispatching");

        if let Err(err) = dispatch(&commands, now, &mut self.act, &mut self.pulse, &mut out) {
            self.stats.hw_faults += 1;
            warn!(%err, "command aborted by hardware fault");
        }
        out
    }

    /// Deadline checks: pulse sequence, then telemetry.
    pub fn poll(&mut self, now: Instant) -> Vec<Outbound> {
        let mut out = Vec::new();

        if let Err(err) = self.pulse.poll(now, &mut self.act, &mut out) {
            self.stats.hw_faults += 1;
            warn!(%err, "toy pulse aborted by hardware fault");
        }

        match self.sampler.poll(now, self.sensors.as_mut()) {
            Ok(Some(sample)) => {
                let report = sample.report();
                debug!(?report, "telemetry");
                self.stats.telemetry_sent += 1;
                out.push(Outbound::Telemetry(report));
            }
            Ok(None) => {}
            Err(err) => {
                self.stats.hw_faults += 1;
                warn!(%err, "telemetry sample failed");
            }
        }
        out
    }

    /// One full loop iteration.
    pub fn tick(&mut self, now: Instant, raw: Option<&[u8]>) -> Vec<Outbound> {
        let mut out = self.handle_frame(now, raw);
        out.extend(self.poll(now));
        out
    }

    /// Host shutdown: halt the motors and leave the relay released.
    pub fn shutdown(&mut self) {
        let mut discard = Vec::new();
        if let Err(err) = self.pulse.cancel(&mut self.act, &mut discard) {
            warn!(%err, "failed to cancel toy pulse");
        }
        if let Err(err) = self.act.stop() {
            warn!(%err, "failed to stop drive");
        }
        if let Err(err) = self.act.release() {
            warn!(%err, "failed to release relay");
        }
        info!(state = ?self.act.state(), stats = ?self.stats, "controller stopped");
    }
}
