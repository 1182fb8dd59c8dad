//! Serial port binding
//!
//! The firmware talks on up to four logical serial slots. Each slot is
//! bound once at startup from a small integer selector:
//!
//! - `-1` selects the USB virtual serial device
//! - `1..=6` selects hardware UART instance N
//!
//! Anything else is a configuration error and stops initialization. The
//! resulting [`SerialBindings`] table never changes afterwards.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Selector value for the USB virtual serial device
pub const USB_SELECTOR: i32 = -1;

/// Highest hardware UART instance
pub const MAX_UART_INSTANCE: i32 = 6;

/// Default line rate for host and display links
pub const DEFAULT_BAUDRATE: u32 = 250_000;

/// Logical serial slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SerialSlot {
    /// Main host link
    Primary,
    /// Second host link
    Secondary,
    /// Third host link
    Tertiary,
    /// Display/diagnostic link
    Diagnostic,
}

/// Hardware UART instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UartInstance {
    Uart1,
    Uart2,
    Uart3,
    Uart4,
    Uart5,
    Uart6,
}

impl UartInstance {
    /// Get the instance from its number (1-6)
    pub fn from_number(number: i32) -> Option<Self> {
        match number {
            1 => Some(UartInstance::Uart1),
            2 => Some(UartInstance::Uart2),
            3 => Some(UartInstance::Uart3),
            4 => Some(UartInstance::Uart4),
            5 => Some(UartInstance::Uart5),
            6 => Some(UartInstance::Uart6),
            _ => None,
        }
    }

    /// Instance number (1-6)
    pub fn number(self) -> u8 {
        self as u8 + 1
    }
}

/// Resolved serial peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SerialPort {
    /// USB virtual serial device
    Usb,
    /// Hardware UART
    Uart(UartInstance),
}

impl SerialPort {
    /// Resolve a selector value
    pub fn from_selector(value: i32) -> Option<Self> {
        if value == USB_SELECTOR {
            return Some(SerialPort::Usb);
        }
        UartInstance::from_number(value).map(SerialPort::Uart)
    }
}

impl fmt::Display for SerialPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerialPort::Usb => f.write_str("USB"),
            SerialPort::Uart(instance) => write!(f, "UART{}", instance.number()),
        }
    }
}

/// UART line configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UartConfig {
    /// Baud rate in bits per second
    pub baudrate: u32,
    /// Number of data bits (typically 8)
    pub data_bits: DataBits,
    /// Parity mode
    pub parity: Parity,
    /// Number of stop bits
    pub stop_bits: StopBits,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            baudrate: DEFAULT_BAUDRATE,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

/// Number of data bits per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DataBits {
    Seven,
    Eight,
    Nine,
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StopBits {
    One,
    Two,
}

/// Serial selectors as read from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SerialConfig {
    /// Primary host port selector (required)
    pub primary: i32,
    /// Second host port selector
    pub secondary: Option<i32>,
    /// Third host port selector
    pub tertiary: Option<i32>,
    /// Display/diagnostic port selector
    pub diagnostic: Option<i32>,
    /// Line settings applied to every bound UART
    pub line: UartConfig,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            primary: 1,
            secondary: None,
            tertiary: None,
            diagnostic: None,
            line: UartConfig::default(),
        }
    }
}

/// Errors from serial binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SerialError {
    /// Selector outside `{-1} ∪ [1, 6]`
    InvalidSelector { slot: SerialSlot, value: i32 },
    /// Two slots resolve to the same peripheral
    Duplicate {
        slot: SerialSlot,
        other: SerialSlot,
        port: SerialPort,
    },
}

/// One resolved slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SerialBinding {
    pub slot: SerialSlot,
    pub port: SerialPort,
    pub line: UartConfig,
}

/// Immutable slot to peripheral table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SerialBindings {
    primary: SerialBinding,
    secondary: Option<SerialBinding>,
    tertiary: Option<SerialBinding>,
    diagnostic: Option<SerialBinding>,
}

impl SerialBindings {
    /// Resolve every configured slot
    ///
    /// Fails on the first invalid selector or on two slots sharing a port.
    pub fn resolve(config: &SerialConfig) -> Result<Self, SerialError> {
        let bind = |slot: SerialSlot, value: i32| -> Result<SerialBinding, SerialError> {
            let port = SerialPort::from_selector(value)
                .ok_or(SerialError::InvalidSelector { slot, value })?;
            Ok(SerialBinding {
                slot,
                port,
                line: config.line,
            })
        };

        let bindings = Self {
            primary: bind(SerialSlot::Primary, config.primary)?,
            secondary: config
                .secondary
                .map(|v| bind(SerialSlot::Secondary, v))
                .transpose()?,
            tertiary: config
                .tertiary
                .map(|v| bind(SerialSlot::Tertiary, v))
                .transpose()?,
            diagnostic: config
                .diagnostic
                .map(|v| bind(SerialSlot::Diagnostic, v))
                .transpose()?,
        };

        for (i, a) in bindings.iter().enumerate() {
            if let Some(b) = bindings.iter().skip(i + 1).find(|b| b.port == a.port) {
                return Err(SerialError::Duplicate {
                    slot: b.slot,
                    other: a.slot,
                    port: a.port,
                });
            }
        }

        for binding in bindings.iter() {
            debug!("{} bound to {}", binding.slot, binding.port);
        }
        Ok(bindings)
    }

    /// Get the binding for a slot
    pub fn get(&self, slot: SerialSlot) -> Option<&SerialBinding> {
        match slot {
            SerialSlot::Primary => Some(&self.primary),
            SerialSlot::Secondary => self.secondary.as_ref(),
            SerialSlot::Tertiary => self.tertiary.as_ref(),
            SerialSlot::Diagnostic => self.diagnostic.as_ref(),
        }
    }

    /// Primary host binding
    pub fn primary(&self) -> &SerialBinding {
        &self.primary
    }

    /// Slot bound to `port`, if any
    pub fn slot_for(&self, port: SerialPort) -> Option<SerialSlot> {
        self.iter().find(|b| b.port == port).map(|b| b.slot)
    }

    /// Iterate bound slots in slot order
    pub fn iter(&self) -> impl Iterator<Item = &SerialBinding> {
        core::iter::once(&self.primary)
            .chain(self.secondary.as_ref())
            .chain(self.tertiary.as_ref())
            .chain(self.diagnostic.as_ref())
    }
}
