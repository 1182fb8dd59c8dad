//! Host test doubles for the platform traits

use core::cell::Cell;
use std::vec::Vec;

use crate::adc::{AdcPeripheral, AnalogChannel};
use crate::critical::InterruptControl;
use crate::hal::Platform;
use crate::memory::FrameProbe;
use crate::pwm::{PwmTimers, TimerId, TimerSettings};
use crate::reset::{RebootStatus, ResetFlags, SystemControl};

pub struct MockInterrupts {
    enabled: Cell<bool>,
    enable_calls: Cell<u32>,
}

impl MockInterrupts {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Cell::new(enabled),
            enable_calls: Cell::new(0),
        }
    }

    pub fn enable_calls(&self) -> u32 {
        self.enable_calls.get()
    }
}

impl InterruptControl for MockInterrupts {
    fn are_enabled(&self) -> bool {
        self.enabled.get()
    }

    fn disable(&self) {
        self.enabled.set(false);
    }

    fn enable(&self) {
        self.enabled.set(true);
        self.enable_calls.set(self.enable_calls.get() + 1);
    }
}

#[derive(Default)]
pub struct MockAdc {
    pub resolution_calls: Vec<u8>,
    pub triggered: Vec<AnalogChannel>,
    latched: Option<u8>,
}

impl MockAdc {
    /// Converter that always latches `bits` bits
    pub fn latching(bits: u8) -> Self {
        Self {
            latched: Some(bits),
            ..Self::default()
        }
    }
}

impl AdcPeripheral for MockAdc {
    fn set_resolution(&mut self, bits: u8) {
        self.resolution_calls.push(bits);
    }

    fn latched_bits(&self, configured: u8) -> u8 {
        self.latched.unwrap_or(configured)
    }

    fn trigger(&mut self, channel: AnalogChannel) {
        self.triggered.push(channel);
    }
}

/// STM32F4-like timer bank: APB2 timers at 168 MHz, APB1 at 84 MHz,
/// TIM2/TIM5 32-bit
#[derive(Default)]
pub struct MockTimers {
    pub configured: Vec<(TimerId, TimerSettings)>,
    pub compares: Vec<(TimerId, u8, u32)>,
}

impl MockTimers {
    pub fn last_compare(&self, timer: TimerId, channel: u8) -> Option<u32> {
        self.compares
            .iter()
            .rev()
            .find(|(t, c, _)| *t == timer && *c == channel)
            .map(|(_, _, v)| *v)
    }

    pub fn settings(&self, timer: TimerId) -> Option<TimerSettings> {
        self.configured
            .iter()
            .rev()
            .find(|(t, _)| *t == timer)
            .map(|(_, s)| *s)
    }
}

impl PwmTimers for MockTimers {
    fn clock_hz(&self, timer: TimerId) -> u32 {
        match timer.number() {
            1 | 8 | 9 | 10 | 11 => 168_000_000,
            _ => 84_000_000,
        }
    }

    fn counter_bits(&self, timer: TimerId) -> u8 {
        match timer.number() {
            2 | 5 => 32,
            _ => 16,
        }
    }

    fn configure(&mut self, timer: TimerId, settings: TimerSettings) {
        self.configured.push((timer, settings));
    }

    fn set_compare(&mut self, timer: TimerId, channel: u8, value: u32) {
        self.compares.push((timer, channel, value));
    }
}

#[derive(Default)]
pub struct MockSystem {
    pub flags: ResetFlags,
    pub clear_calls: u32,
    pub reboot_supported: bool,
    pub reboot_calls: u32,
}

impl MockSystem {
    pub fn with_flags(flags: ResetFlags) -> Self {
        Self {
            flags,
            ..Self::default()
        }
    }
}

impl SystemControl for MockSystem {
    fn reset_flags(&self) -> ResetFlags {
        self.flags
    }

    fn clear_reset_flags(&mut self) {
        self.flags = ResetFlags::default();
        self.clear_calls += 1;
    }

    fn reboot(&mut self) -> RebootStatus {
        self.reboot_calls += 1;
        if self.reboot_supported {
            RebootStatus::Requested
        } else {
            RebootStatus::Unsupported
        }
    }
}

pub struct MockPlatform;

impl Platform for MockPlatform {
    type Interrupts = MockInterrupts;
    type Adc = MockAdc;
    type Timers = MockTimers;
    type System = MockSystem;
    type Memory = FrameProbe;
}
