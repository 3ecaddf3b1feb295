//! Conversion between physical timing (Hz, ns) and the integer values the
//! pulse generator registers take.
//!
//! Everything the hardware sees is integer. Floating point appears only in
//! [`TimingConfig::pulse_rate_for_hz`] and [`TimingConfig::hz_for_pulse_rate`]
//! so the same arithmetic can be mirrored by a small soft core or in fabric.
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

/// Fabric clock driving the pulse generator.
pub const BASE_CLOCK_HZ: u32 = 50_000_000;
/// Nanoseconds per fabric clock tick.
pub const CLOCK_PERIOD_NS: u32 = 1_000_000_000 / BASE_CLOCK_HZ;
/// Clock ticks per unit of the pulse rate register.
pub const PULSE_RATE_SCALE: u32 = 4;
/// Clock ticks per unit of the pulse width register.
pub const PULSE_WIDTH_SCALE: u32 = 1;

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum TimingError {
    #[error("frequency {0} Hz is not a positive finite number")]
    InvalidFrequency(f64),
    #[error("frequency {0} Hz is faster than the pulse generator can run")]
    FrequencyTooHigh(f64),
    #[error("frequency {0} Hz is too slow for the pulse rate register")]
    FrequencyTooLow(f64),
    #[error("the timing configuration has a zero clock or scale")]
    InvalidConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct TimingConfig {
    pub base_clock_hz: u32,
    pub pulse_rate_scale: u32,
    pub pulse_width_scale: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            base_clock_hz: BASE_CLOCK_HZ,
            pulse_rate_scale: PULSE_RATE_SCALE,
            pulse_width_scale: PULSE_WIDTH_SCALE,
        }
    }
}

impl TimingConfig {
    fn validate(&self) -> Result<(), TimingError> {
        if self.base_clock_hz == 0 || self.pulse_rate_scale == 0 || self.pulse_width_scale == 0 {
            return Err(TimingError::InvalidConfig);
        }
        Ok(())
    }

    pub fn clock_period_ns(&self) -> Result<u32, TimingError> {
        self.validate()?;
        1_000_000_000u32
            .checked_div(self.base_clock_hz)
            .filter(|period| *period != 0)
            .ok_or(TimingError::InvalidConfig)
    }

    /// Pulse rate register value for `frequency_hz`. A lower register value
    /// gives a higher step frequency.
    pub fn pulse_rate_for_hz(&self, frequency_hz: f64) -> Result<u32, TimingError> {
        self.validate()?;
        if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
            return Err(TimingError::InvalidFrequency(frequency_hz));
        }
        let cycles = f64::from(self.base_clock_hz) / frequency_hz;
        if cycles > f64::from(u32::MAX) {
            return Err(TimingError::FrequencyTooLow(frequency_hz));
        }
        // Truncation toward zero, the same as the fabric divider.
        let cycles = cycles as u32;
        let rate = cycles
            .checked_div(self.pulse_rate_scale)
            .ok_or(TimingError::InvalidConfig)?;
        if rate == 0 {
            return Err(TimingError::FrequencyTooHigh(frequency_hz));
        }
        Ok(rate)
    }

    /// Pulse width register value for a pulse of `width_ns` nanoseconds.
    pub fn pulse_width_for_ns(&self, width_ns: u32) -> Result<u32, TimingError> {
        let ticks = width_ns
            .checked_div(self.clock_period_ns()?)
            .ok_or(TimingError::InvalidConfig)?;
        ticks
            .checked_div(self.pulse_width_scale)
            .ok_or(TimingError::InvalidConfig)
    }

    /// Step frequency a pulse rate register value produces.
    pub fn hz_for_pulse_rate(&self, pulse_rate: u32) -> Result<f64, TimingError> {
        self.validate()?;
        let cycles = u64::from(pulse_rate).saturating_mul(u64::from(self.pulse_rate_scale));
        if cycles == 0 {
            return Err(TimingError::FrequencyTooHigh(f64::INFINITY));
        }
        Ok(f64::from(self.base_clock_hz) / cycles as f64)
    }

    pub fn ns_for_pulse_width(&self, pulse_width: u32) -> Result<u64, TimingError> {
        let period = u64::from(self.clock_period_ns()?);
        Ok(u64::from(pulse_width)
            .saturating_mul(u64::from(self.pulse_width_scale))
            .saturating_mul(period))
    }
}

pub fn pulse_rate_for_hz(frequency_hz: f64) -> Result<u32, TimingError> {
    TimingConfig::default().pulse_rate_for_hz(frequency_hz)
}

pub fn pulse_width_for_ns(width_ns: u32) -> Result<u32, TimingError> {
    TimingConfig::default().pulse_width_for_ns(width_ns)
}
