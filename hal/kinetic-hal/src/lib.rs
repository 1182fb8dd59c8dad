//! Kinetic Hardware Abstraction Layer
//!
//! The boundary between portable motion-control firmware (planner, thermal
//! loop, command parser) and an STM32-class microcontroller. It owns the
//! pieces that interact with interrupts: analog sampling, PWM timers,
//! serial port binding, critical sections, reset causes and a free memory
//! estimate.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Firmware (planner, thermal, commands)  │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  kinetic-hal (this crate - Hal context) │
//! └─────────────────────────────────────────┘
//!                     │  Platform traits
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  kinetic-hal-stm32 (Cortex-M hooks)     │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`critical`] - Nestable interrupt masking
//! - [`adc`] - One conversion channel shared with the ADC interrupt
//! - [`pwm`] - Duty and frequency on shared hardware timers
//! - [`serial`] - Selector to port binding
//! - [`reset`] - Reset cause and reboot
//! - [`memory`] - Free memory estimate
//! - [`config`] - Startup configuration and validation
//! - [`hal`] - The context tying them together

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod adc;
pub mod config;
pub mod critical;
pub mod hal;
pub mod memory;
pub mod pin;
pub mod pwm;
pub mod reset;
pub mod serial;

#[cfg(test)]
mod mock;

// Re-export key types at crate root for convenience
pub use adc::{Adc, AdcChannelState, AdcError, AdcPeripheral, AnalogProfile};
pub use config::{AdcConfig, ConfigError, HalConfig, PwmConfig};
pub use critical::{CriticalGuard, CriticalSection, InterruptControl, RestoreToken};
pub use hal::{Hal, HalParts, Platform, PwmPin};
pub use memory::{free_memory, MemoryProbe};
pub use pin::{Pin, Port};
pub use pwm::{FrequencyChange, Pwm, PwmError, PwmTimers, TimerId, TimerSettings};
pub use reset::{RebootStatus, ResetCause, ResetFlags, SystemControl};
pub use serial::{SerialBindings, SerialConfig, SerialError, SerialPort, SerialSlot};
