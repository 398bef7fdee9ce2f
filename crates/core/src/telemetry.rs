use std::time::{Duration, Instant};

use serde::Serialize;

use crate::hardware::{AnalogSensors, HwResult};

/// Conversion constants for the on-board ADC channels.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
    pub interval: Duration,
    pub adc_ref_volts: f64,
    pub adc_full_scale: f64,
    // Battery sense sits behind a 1:2 divider
    pub divider_ratio: f64,
    // RP2040 die sensor: 0.706 V at 27 C, -1.721 mV per degree
    pub temp_ref_volts: f64,
    pub temp_ref_celsius: f64,
    pub temp_slope: f64,
    pub battery_empty_volts: f64,
    pub battery_span_volts: f64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(3000),
            adc_ref_volts: 3.3,
            adc_full_scale: 65535.0,
            divider_ratio: 2.0,
            temp_ref_volts: 0.706,
            temp_ref_celsius: 27.0,
            temp_slope: 0.001721,
            battery_empty_volts: 3.0,
            battery_span_volts: 1.2,
        }
    }
}

impl TelemetryConfig {
    fn to_volts(&self, raw: u16) -> f64 {
        f64::from(raw) * self.adc_ref_volts / self.adc_full_scale
    }

    pub fn battery_volts(&self, raw: u16) -> f64 {
        self.to_volts(raw) * self.divider_ratio
    }

    pub fn temperature(&self, raw: u16) -> f64 {
        self.temp_ref_celsius - (self.to_volts(raw) - self.temp_ref_volts) / self.temp_slope
    }

    /// Linear between empty and empty + span, clamped to 0..=100.
    pub fn battery_percent(&self, volts: f64) -> f64 {
        if self.battery_span_volts <= 0.0 || !self.battery_span_volts.is_finite() {
            return if volts >= self.battery_empty_volts { 100.0 } else { 0.0 };
        }
        let pct = (volts - self.battery_empty_volts) * 100.0 / self.battery_span_volts;
        if pct.is_nan() {
            return 0.0;
        }
        pct.clamp(0.0, 100.0)
    }

    pub fn convert(&self, battery_raw: u16, temp_raw: u16) -> TelemetrySample {
        let voltage = self.battery_volts(battery_raw);
        TelemetrySample {
            percent: self.battery_percent(voltage),
            voltage,
            temperature: self.temperature(temp_raw),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySample {
    pub percent: f64,
    pub voltage: f64,
    pub temperature: f64,
}

impl TelemetrySample {
    pub fn report(&self) -> TelemetryReport {
        TelemetryReport {
            battery: format!("{:.1}%", self.percent),
            voltage: format!("{:.2}V", self.voltage),
            temp: format!("{:.1}C", self.temperature),
        }
    }
}

/// Wire form of a sample; field order is the order on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetryReport {
    #[serde(rename = "Battery")]
    pub battery: String,
    #[serde(rename = "Voltage")]
    pub voltage: String,
    #[serde(rename = "Temp")]
    pub temp: String,
}

/// Level-triggered sampler: due once `interval` has elapsed since the last
/// successful sample, checked on every loop iteration.
#[derive(Debug, Clone)]
pub struct TelemetrySampler {
    config: TelemetryConfig,
    last: Instant,
}

impl TelemetrySampler {
    pub fn new(config: TelemetryConfig, start: Instant) -> Self {
        Self { config, last: start }
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    pub fn next_deadline(&self) -> Instant {
        self.last + self.config.interval
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last) >= self.config.interval
    }

    /// A failed read leaves the schedule untouched so the next iteration retries.
    pub fn poll(&mut self, now: Instant, sensors: &mut dyn AnalogSensors) -> HwResult<Option<TelemetrySample>> {
        if !self.is_due(now) {
            return Ok(None);
        }
        let temp_raw = sensors.read_temp_raw()?;
        let battery_raw = sensors.read_battery_raw()?;
        self.last = now;
        Ok(Some(self.config.convert(battery_raw, temp_raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimBoard, ADC};

    #[test]
    fn converts_raw_counts() {
        let cfg = TelemetryConfig::default();
        let report = cfg.convert(40000, 14000).report();
        assert_eq!(report.battery, "85.7%");
        assert_eq!(report.voltage, "4.03V");
        assert_eq!(report.temp, "27.6C");

        assert_eq!(cfg.convert(37237, 14300).report().battery, "62.5%");
        assert_eq!(cfg.convert(37237, 14300).report().temp, "18.8C");
    }

    #[test]
    fn percent_is_clamped() {
        let cfg = TelemetryConfig::default();
        for raw in [0u16, 1000, 30000, 37237, 50000, u16::MAX] {
            let pct = cfg.convert(raw, 0).percent;
            assert!((0.0..=100.0).contains(&pct), "raw {raw} gave {pct}");
        }
        assert_eq!(cfg.convert(0, 0).report().battery, "0.0%");
        assert_eq!(cfg.convert(u16::MAX, 0).report().battery, "100.0%");
    }

    #[test]
    fn thresholds_are_configurable() {
        let cfg = TelemetryConfig { battery_empty_volts: 3.5, battery_span_volts: 0.5, ..Default::default() };
        assert_eq!(cfg.battery_percent(3.75), 50.0);

        let degenerate = TelemetryConfig { battery_span_volts: 0.0, ..Default::default() };
        assert_eq!(degenerate.battery_percent(2.9), 0.0);
        assert_eq!(degenerate.battery_percent(3.1), 100.0);
    }

    #[test]
    fn report_serializes_in_wire_order() {
        let json = serde_json::to_string(&TelemetryConfig::default().convert(40000, 14000).report()).unwrap();
        assert_eq!(json, r#"{"Battery":"85.7%","Voltage":"4.03V","Temp":"27.6C"}"#);
    }

    #[test]
    fn samples_at_most_once_per_interval() {
        let board = SimBoard::new(40000, 14000);
        let mut sensors = board.sensors();
        let t0 = Instant::now();
        let mut sampler = TelemetrySampler::new(TelemetryConfig::default(), t0);

        let mut emitted = 0;
        for ms in (0..3000).step_by(7) {
            if sampler.poll(t0 + Duration::from_millis(ms), &mut sensors).unwrap().is_some() {
                emitted += 1;
            }
        }
        assert_eq!(emitted, 0);

        assert!(sampler.poll(t0 + Duration::from_millis(3000), &mut sensors).unwrap().is_some());
        assert!(sampler.poll(t0 + Duration::from_millis(3001), &mut sensors).unwrap().is_none());
        assert!(sampler.poll(t0 + Duration::from_millis(5999), &mut sensors).unwrap().is_none());
        assert!(sampler.poll(t0 + Duration::from_millis(6000), &mut sensors).unwrap().is_some());
    }

    #[test]
    fn failed_read_is_retried_next_iteration() {
        let board = SimBoard::new(40000, 14000);
        let mut sensors = board.sensors();
        let t0 = Instant::now();
        let mut sampler = TelemetrySampler::new(TelemetryConfig::default(), t0);

        board.inject_fault(ADC);
        assert!(sampler.poll(t0 + Duration::from_secs(3), &mut sensors).is_err());
        board.clear_fault(ADC);
        assert!(sampler.poll(t0 + Duration::from_millis(3010), &mut sensors).unwrap().is_some());
    }
}
