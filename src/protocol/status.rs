use std::fmt;

use super::TrackingMode;

/// Bit layout of the `STATUS?` reply byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLayout {
    /// bit 0/1: CH1/CH2 CV, bits 2-3: tracking (00 independent, 01 series,
    /// 11 parallel), bit 4: beep, bit 5: lock, bit 6: output
    SingleChannel,
    /// bit 0/1: CH1/CH2 CV, bits 2-3: tracking (00 independent, 01 series,
    /// 10 parallel), bit 6: output 1, bit 7: output 2
    MultiChannel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegulationMode {
    ConstantVoltage,
    ConstantCurrent,
}

impl RegulationMode {
    fn from_bit(set: bool) -> Self {
        if set {
            RegulationMode::ConstantVoltage
        } else {
            RegulationMode::ConstantCurrent
        }
    }
}

impl fmt::Display for RegulationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegulationMode::ConstantVoltage => write!(f, "C.V"),
            RegulationMode::ConstantCurrent => write!(f, "C.C"),
        }
    }
}

/// Decoded status byte. Flags a layout does not carry are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub ch1_mode: RegulationMode,
    pub ch2_mode: RegulationMode,
    /// `None` when the tracking bits hold a reserved pattern
    pub tracking: Option<TrackingMode>,
    pub beep_enabled: Option<bool>,
    pub lock_enabled: Option<bool>,
    /// True when any output is on
    pub out_enabled: bool,
    pub out1_enabled: Option<bool>,
    pub out2_enabled: Option<bool>,
}

impl Status {
    pub fn parse(layout: StatusLayout, status: u8) -> Status {
        let bit = |mask: u8| status & mask != 0;
        let tracking_bits = (status & 0x0C) >> 2;

        match layout {
            StatusLayout::SingleChannel => Status {
                ch1_mode: RegulationMode::from_bit(bit(0x01)),
                ch2_mode: RegulationMode::from_bit(bit(0x02)),
                tracking: match tracking_bits {
                    0 => Some(TrackingMode::Independent),
                    1 => Some(TrackingMode::Series),
                    3 => Some(TrackingMode::Parallel),
                    _ => None,
                },
                beep_enabled: Some(bit(0x10)),
                lock_enabled: Some(bit(0x20)),
                out_enabled: bit(0x40),
                out1_enabled: None,
                out2_enabled: None,
            },
            StatusLayout::MultiChannel => Status {
                ch1_mode: RegulationMode::from_bit(bit(0x01)),
                ch2_mode: RegulationMode::from_bit(bit(0x02)),
                tracking: match tracking_bits {
                    0 => Some(TrackingMode::Independent),
                    1 => Some(TrackingMode::Series),
                    2 => Some(TrackingMode::Parallel),
                    _ => None,
                },
                beep_enabled: None,
                lock_enabled: None,
                out_enabled: bit(0x40) || bit(0x80),
                out1_enabled: Some(bit(0x40)),
                out2_enabled: Some(bit(0x80)),
            },
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ch1Mode: {}", self.ch1_mode)?;
        writeln!(f, "ch2Mode: {}", self.ch2_mode)?;
        match self.tracking {
            Some(mode) => writeln!(f, "Tracking: {}", mode)?,
            None => writeln!(f, "Tracking: Unknown")?,
        }
        if let Some(beep) = self.beep_enabled {
            writeln!(f, "BeepEnabled: {}", beep)?;
        }
        if let Some(lock) = self.lock_enabled {
            writeln!(f, "lockEnabled: {}", lock)?;
        }
        if let (Some(out1), Some(out2)) = (self.out1_enabled, self.out2_enabled) {
            writeln!(f, "out1Enabled: {}", out1)?;
            writeln!(f, "out2Enabled: {}", out2)?;
        }
        write!(f, "outEnabled: {}", self.out_enabled)
    }
}
