use super::{Quantity, TrackingMode};
use crate::constants::ALL_OUTPUTS_ADDRESS;
use crate::models::{Addressing, Policy};

/// On/off switches that take a single `0`/`1` argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flag {
    Ocp,
    Ovp,
    Beep,
    Lock,
}

impl Flag {
    pub(crate) fn mnemonic(self) -> &'static str {
        match self {
            Flag::Ocp => "OCP",
            Flag::Ovp => "OVP",
            Flag::Beep => "BEEP",
            Flag::Lock => "LOCK",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepDirection {
    Up,
    Down,
}

/// Formats request strings in the dialect of one policy. Values are taken
/// in milli-units and rendered in volts/amps.
pub(crate) struct CommandSet<'p> {
    policy: &'p Policy,
}

fn units(milli: u32, quantity: Quantity) -> String {
    format!(
        "{:.*}",
        quantity.decimals(),
        f64::from(milli) / 1000.0
    )
}

fn flag_value(enable: bool) -> u8 {
    if enable { 1 } else { 0 }
}

impl<'p> CommandSet<'p> {
    pub(crate) fn new(policy: &'p Policy) -> Self {
        CommandSet { policy }
    }

    /// `VSET1?` / `ISET1?`: programmed value
    pub(crate) fn query_setting(&self, quantity: Quantity, channel: u8) -> String {
        format!("{}SET{}?", quantity.prefix(), channel)
    }

    /// `VOUT1?` / `IOUT1?`: measured output
    pub(crate) fn query_output(&self, quantity: Quantity, channel: u8) -> String {
        format!("{}OUT{}?", quantity.prefix(), channel)
    }

    pub(crate) fn set(&self, quantity: Quantity, channel: u8, milli: u32) -> String {
        format!(
            "{}SET{}{}{}",
            quantity.prefix(),
            channel,
            self.policy.separator,
            units(milli, quantity)
        )
    }

    pub(crate) fn save(&self, slot: u8) -> String {
        format!("SAV{}", slot)
    }

    pub(crate) fn recall(&self, slot: u8) -> String {
        format!("RCL{}", slot)
    }

    pub(crate) fn flag(&self, flag: Flag, enable: bool) -> String {
        format!("{}{}", flag.mnemonic(), flag_value(enable))
    }

    /// Output switch. `channel == None` addresses every output the firmware
    /// can switch at once.
    pub(crate) fn output(&self, channel: Option<u8>, enable: bool) -> String {
        match self.policy.addressing {
            Addressing::Implicit => format!("OUT{}", flag_value(enable)),
            Addressing::PerChannel => {
                let address = match channel {
                    Some(channel) => channel.to_string(),
                    None => ALL_OUTPUTS_ADDRESS.to_owned(),
                };
                format!(
                    "OUT{}{}{}",
                    address,
                    self.policy.separator,
                    flag_value(enable)
                )
            }
        }
    }

    pub(crate) fn tracking(&self, mode: TrackingMode) -> String {
        format!("TRACK{}", mode as u8)
    }

    /// `VSTEP1:0.50`: size of a manual step
    pub(crate) fn manual_step(&self, quantity: Quantity, channel: u8, step: u32) -> String {
        format!(
            "{}STEP{}{}{}",
            quantity.prefix(),
            channel,
            self.policy.separator,
            units(step, quantity)
        )
    }

    pub(crate) fn step(&self, quantity: Quantity, channel: u8, direction: StepDirection) -> String {
        let verb = match direction {
            StepDirection::Up => "UP",
            StepDirection::Down => "DOWN",
        };
        format!("{}{}{}", quantity.prefix(), verb, channel)
    }

    /// `VASTEP1:1.00,5.00,0.50,2`: ramp from start to stop every `seconds`
    pub(crate) fn auto_step(
        &self,
        quantity: Quantity,
        channel: u8,
        start: u32,
        stop: u32,
        step: u32,
        seconds: u32,
    ) -> String {
        let prefix = quantity.prefix();
        let separator = self.policy.separator;
        let (start, stop, step) = (
            units(start, quantity),
            units(stop, quantity),
            units(step, quantity),
        );
        format!("{prefix}ASTEP{channel}{separator}{start},{stop},{step},{seconds}")
    }

    pub(crate) fn stop_auto_step(&self, quantity: Quantity, channel: u8) -> String {
        format!("{}ASTOP{}", quantity.prefix(), channel)
    }
}
