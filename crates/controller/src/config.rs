use std::env;
use std::time::Duration;

use picogo_core::ControllerConfig;

/// Everything the host binary needs beyond the link settings.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub controller: ControllerConfig,
    pub poll_interval: Duration,
    pub sim_battery_raw: u16,
    pub sim_temp_raw: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            controller: ControllerConfig::default(),
            poll_interval: Duration::from_millis(20),
            sim_battery_raw: 40000,
            sim_temp_raw: 14000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut cfg = AppConfig::default();

        if let Some(ms) = env_millis("PICOGO_TELEMETRY_INTERVAL_MS") {
            cfg.controller.telemetry.interval = ms;
        }
        if let Some(v) = env_f64("PICOGO_BATTERY_EMPTY_VOLTS") {
            cfg.controller.telemetry.battery_empty_volts = v;
        }
        if let Some(v) = env_f64("PICOGO_BATTERY_SPAN_VOLTS") {
            // A zero span would make every reading 0% or 100%
            if v > 0.0 {
                cfg.controller.telemetry.battery_span_volts = v;
            }
        }
        if let Some(ms) = env_millis("PICOGO_PULSE_HOLD_MS") {
            cfg.controller.pulse_hold = ms;
        }
        if let Some(ms) = env_millis("PICOGO_POLL_MS") {
            cfg.poll_interval = ms;
        }
        if let Ok(v) = env::var("PICOGO_SIM_BATTERY_RAW") {
            if let Ok(raw) = v.trim().parse::<u16>() {
                cfg.sim_battery_raw = raw;
            }
        }
        if let Ok(v) = env::var("PICOGO_SIM_TEMP_RAW") {
            if let Ok(raw) = v.trim().parse::<u16>() {
                cfg.sim_temp_raw = raw;
            }
        }

        cfg
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    let v = env::var(key).ok()?;
    match v.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Some(Duration::from_millis(ms)),
        _ => {
            tracing::warn!(key, value = %v, "ignoring invalid duration");
            None
        }
    }
}

fn env_f64(key: &str) -> Option<f64> {
    let v = env::var(key).ok()?;
    v.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_board() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.controller.telemetry.interval, Duration::from_millis(3000));
        assert_eq!(cfg.controller.pulse_hold, Duration::from_secs(2));
        assert_eq!(cfg.poll_interval, Duration::from_millis(20));
    }

    #[test]
    fn missing_keys_are_ignored() {
        assert_eq!(env_millis("PICOGO_TEST_UNSET_MILLIS"), None);
        assert_eq!(env_f64("PICOGO_TEST_UNSET_F64"), None);
    }
}
