//! Startup configuration
//!
//! Everything the HAL needs to know before touching hardware. The values
//! are read once at boot (from flash or a board definition) and validated
//! by [`HalConfig::validate`]; any error stops initialization.

use heapless::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::adc::{AnalogProfile, DEFAULT_RESOLUTION_BITS, SUPPORTED_RESOLUTIONS};
use crate::pin::Pin;
use crate::pwm::{
    resolve_output, PwmError, TimerId, DEFAULT_RESERVED_TIMERS, MAX_PWM_CHANNELS,
    MAX_RESERVED_TIMERS,
};
use crate::serial::{SerialBindings, SerialConfig, SerialError};

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Serial selector invalid or duplicated
    Serial(SerialError),
    /// ADC resolution not supported by the converter
    UnsupportedResolution(u8),
    /// Declared PWM pin cannot be driven
    Pwm(PwmError),
}

impl From<SerialError> for ConfigError {
    fn from(e: SerialError) -> Self {
        ConfigError::Serial(e)
    }
}

impl From<PwmError> for ConfigError {
    fn from(e: PwmError) -> Self {
        ConfigError::Pwm(e)
    }
}

/// ADC settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AdcConfig {
    /// Sampling resolution in bits
    pub resolution_bits: u8,
}

impl Default for AdcConfig {
    fn default() -> Self {
        Self {
            resolution_bits: DEFAULT_RESOLUTION_BITS,
        }
    }
}

/// PWM settings
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PwmConfig {
    /// Pins the firmware intends to drive
    pub pins: Vec<Pin, MAX_PWM_CHANNELS>,
    /// Timers owned by system interrupts (stepper, tone)
    pub reserved_timers: Vec<TimerId, MAX_RESERVED_TIMERS>,
}

impl Default for PwmConfig {
    fn default() -> Self {
        let mut reserved_timers = Vec::new();
        for timer in DEFAULT_RESERVED_TIMERS {
            let _ = reserved_timers.push(timer);
        }
        Self {
            pins: Vec::new(),
            reserved_timers,
        }
    }
}

/// Complete HAL configuration
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HalConfig {
    pub serial: SerialConfig,
    pub adc: AdcConfig,
    pub pwm: PwmConfig,
    /// Use the alternate analog channel table
    pub alternate_profile: bool,
}

impl HalConfig {
    /// Analog channel table selected by `alternate_profile`
    pub fn analog_profile(&self) -> AnalogProfile {
        if self.alternate_profile {
            AnalogProfile::Alternate
        } else {
            AnalogProfile::Standard
        }
    }

    /// Check the configuration without touching hardware
    ///
    /// Returns the resolved serial bindings on success.
    pub fn validate(&self) -> Result<SerialBindings, ConfigError> {
        let bindings = SerialBindings::resolve(&self.serial).map_err(|e| {
            error!("Serial configuration rejected: {}", e);
            ConfigError::from(e)
        })?;

        let bits = self.adc.resolution_bits;
        if !SUPPORTED_RESOLUTIONS.contains(&bits) {
            error!("ADC resolution {=u8} not supported", bits);
            return Err(ConfigError::UnsupportedResolution(bits));
        }

        for &pin in &self.pwm.pins {
            resolve_output(pin, &self.pwm.reserved_timers).map_err(|e| {
                error!("PWM pin {} rejected: {}", pin, e);
                ConfigError::from(e)
            })?;
        }

        Ok(bindings)
    }
}
