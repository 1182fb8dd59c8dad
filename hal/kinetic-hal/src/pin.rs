//! Pin identifiers
//!
//! Pins are small signed integers laid out as `port * 16 + index`, the
//! same numbering the STM32 GPIO ports use (`PA0` = 0, `PB0` = 16, ...).
//! A negative value marks an unconnected pin.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Pins per GPIO port
pub const PINS_PER_PORT: u8 = 16;

/// GPIO port letter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Port {
    A = 0,
    B = 1,
    C = 2,
    D = 3,
    E = 4,
    F = 5,
    G = 6,
    H = 7,
    I = 8,
    J = 9,
    K = 10,
}

impl Port {
    /// Get the port from its letter
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'A' => Some(Port::A),
            'B' => Some(Port::B),
            'C' => Some(Port::C),
            'D' => Some(Port::D),
            'E' => Some(Port::E),
            'F' => Some(Port::F),
            'G' => Some(Port::G),
            'H' => Some(Port::H),
            'I' => Some(Port::I),
            'J' => Some(Port::J),
            'K' => Some(Port::K),
            _ => None,
        }
    }

    /// Get the port from its index (A = 0)
    pub fn from_index(index: u8) -> Option<Self> {
        if index > Port::K as u8 {
            return None;
        }
        Self::from_letter((b'A' + index) as char)
    }

    /// Port letter
    pub fn letter(self) -> char {
        (b'A' + self as u8) as char
    }
}

/// Physical pin identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "i16"))]
pub struct Pin(i16);

impl Pin {
    /// Unconnected pin
    pub const NC: Pin = Pin(-1);

    /// Create a pin from port and index within the port
    pub const fn new(port: Port, index: u8) -> Self {
        assert!(index < PINS_PER_PORT, "pin index out of range");
        Pin(port as i16 * PINS_PER_PORT as i16 + index as i16)
    }

    /// Create a pin from its raw number
    ///
    /// Any negative number is normalized to [`Pin::NC`].
    pub const fn from_raw(raw: i16) -> Self {
        if raw < 0 {
            Pin::NC
        } else {
            Pin(raw)
        }
    }

    /// Raw pin number (`-1` when unconnected)
    pub const fn raw(self) -> i16 {
        self.0
    }

    /// Check if the pin is connected
    pub const fn is_connected(self) -> bool {
        self.0 >= 0
    }

    /// GPIO port of this pin
    pub fn port(self) -> Option<Port> {
        if !self.is_connected() {
            return None;
        }
        let port = u8::try_from(self.0 / PINS_PER_PORT as i16).ok()?;
        Port::from_index(port)
    }

    /// Index of this pin within its port
    pub fn index(self) -> Option<u8> {
        if !self.is_connected() {
            return None;
        }
        Some((self.0 % PINS_PER_PORT as i16) as u8)
    }
}

impl From<i16> for Pin {
    fn from(raw: i16) -> Self {
        Pin::from_raw(raw)
    }
}

impl Default for Pin {
    fn default() -> Self {
        Pin::NC
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.port(), self.index()) {
            (Some(port), Some(index)) => write!(f, "P{}{}", port.letter(), index),
            _ if !self.is_connected() => f.write_str("NC"),
            _ => write!(f, "#{}", self.0),
        }
    }
}

/// Error when parsing a pin name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinParseError {
    /// Name does not start with `P`
    MissingPrefix,
    /// Port letter out of range
    InvalidPort,
    /// Index missing or not below 16
    InvalidIndex,
}

/// Parse a pin name
///
/// Supports formats:
/// - "PA0", "pf15" -> port/index pin
/// - "NC" -> unconnected
impl FromStr for Pin {
    type Err = PinParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("NC") {
            return Ok(Pin::NC);
        }

        let mut chars = s.chars();
        match chars.next() {
            Some('P') | Some('p') => {}
            _ => return Err(PinParseError::MissingPrefix),
        }

        let port = chars
            .next()
            .and_then(Port::from_letter)
            .ok_or(PinParseError::InvalidPort)?;

        let index: u8 = chars
            .as_str()
            .parse()
            .map_err(|_| PinParseError::InvalidIndex)?;
        if index >= PINS_PER_PORT {
            return Err(PinParseError::InvalidIndex);
        }

        Ok(Pin::new(port, index))
    }
}
