use std::fmt;

use clap::ValueEnum;

use crate::error::PsuError;

pub(crate) mod command;
pub mod status;

/// The two programmable quantities of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Voltage,
    Current,
}

impl Quantity {
    /// Mnemonic prefix used by the command set (`VSET`, `ISET`, ...)
    pub(crate) fn prefix(self) -> char {
        match self {
            Quantity::Voltage => 'V',
            Quantity::Current => 'I',
        }
    }

    /// Decimal places the firmware accepts for this quantity
    pub(crate) fn decimals(self) -> usize {
        match self {
            Quantity::Voltage => 2,
            Quantity::Current => 3,
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Quantity::Voltage => "voltage",
            Quantity::Current => "current",
        }
    }
}

/// Renders the milli-unit symbol, e.g. `mV`
impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantity::Voltage => write!(f, "mV"),
            Quantity::Current => write!(f, "mA"),
        }
    }
}

/// Output coupling on multi-channel units
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TrackingMode {
    Independent = 0,
    Series = 1,
    Parallel = 2,
}

impl TryFrom<u8> for TrackingMode {
    type Error = PsuError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TrackingMode::Independent),
            1 => Ok(TrackingMode::Series),
            2 => Ok(TrackingMode::Parallel),
            other => Err(PsuError::Validation(format!(
                "Tracking mode {} not valid. Use one of: 0 (Independent), 1 (Series), 2 (Parallel)",
                other
            ))),
        }
    }
}

impl fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingMode::Independent => write!(f, "Independent"),
            TrackingMode::Series => write!(f, "Tracking Series"),
            TrackingMode::Parallel => write!(f, "Tracking Parallel"),
        }
    }
}

/// Convert a finite, non-negative reading in volts/amps to the nearest milli-unit
pub(crate) fn to_milli(value: f64) -> u32 {
    (value * 1000.0).round() as u32
}
