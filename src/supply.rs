use tracing::{debug, info};

use crate::constants::{CMD_IDENTITY, CMD_STATUS};
use crate::error::{PsuError, PsuResult};
use crate::interface::serialport::SerialPortOpener;
use crate::interface::{ConnectionParams, PortOpener};
use crate::models::{Model, Policy, policy_for};
use crate::protocol::command::{CommandSet, Flag, StepDirection};
use crate::protocol::status::Status;
use crate::protocol::{Quantity, TrackingMode, to_milli};
use crate::transport::Transport;

/// A connected power supply.
///
/// Holds no channel state of its own: the unit is the source of truth and
/// every getter goes to the wire. Values are passed in millivolts and
/// milliamps and returned in volts and amps, as the device reports them.
pub struct PowerSupply {
    transport: Transport,
    policy: &'static Policy,
}

impl PowerSupply {
    /// Open `params.port`, identify the unit and bind the matching policy
    pub fn detect(params: ConnectionParams) -> PsuResult<Self> {
        crate::detect::detect_with(Box::new(SerialPortOpener), params)
    }

    /// Skip detection and talk to `params.port` as a known model
    pub fn with_model(model: Model, params: ConnectionParams) -> PsuResult<Self> {
        Self::with_policy(policy_for(model), Box::new(SerialPortOpener), params)
    }

    pub fn with_policy(
        policy: &'static Policy,
        opener: Box<dyn PortOpener>,
        params: ConnectionParams,
    ) -> PsuResult<Self> {
        let transport = Transport::open(opener, params, policy.terminator)?;
        Ok(Self::from_parts(transport, policy))
    }

    pub(crate) fn from_parts(transport: Transport, policy: &'static Policy) -> Self {
        PowerSupply { transport, policy }
    }

    pub fn policy(&self) -> &'static Policy {
        self.policy
    }

    pub fn port(&self) -> &str {
        self.transport.port()
    }

    /// Point the controller at a different device node
    pub fn set_port(&mut self, port: &str) -> PsuResult<()> {
        self.transport.reopen(port)
    }

    pub fn close(&mut self) {
        self.transport.close();
    }

    fn commands(&self) -> CommandSet<'static> {
        CommandSet::new(self.policy)
    }

    fn check_channel(&self, channel: u8) -> PsuResult<()> {
        if channel == 0 || channel > self.policy.channel_count {
            return Err(PsuError::Validation(format!(
                "Channel CH{} not in range ({} channels supported)",
                channel, self.policy.channel_count
            )));
        }
        Ok(())
    }

    fn check_value(&self, quantity: Quantity, channel: u8, value: u32) -> PsuResult<()> {
        let max = match quantity {
            Quantity::Voltage => self.policy.max_millivolts,
            Quantity::Current => self.policy.max_milliamps,
        };
        if value > max {
            return Err(PsuError::Validation(format!(
                "Trying to set CH{} {} to {}{}, the maximum is {}{}",
                channel,
                quantity.name(),
                value,
                quantity,
                max,
                quantity
            )));
        }
        Ok(())
    }

    /// Channel range plus the auxiliary channel's restrictions on current
    fn check_quantity_channel(&self, quantity: Quantity, channel: u8) -> PsuResult<()> {
        self.check_channel(channel)?;
        if quantity == Quantity::Current && self.policy.is_aux_channel(channel) {
            return Err(PsuError::Validation(format!(
                "Channel CH{} does not support current",
                channel
            )));
        }
        Ok(())
    }

    fn check_slot(&self, slot: u8) -> PsuResult<()> {
        if slot == 0 || slot > self.policy.memory_slot_count {
            return Err(PsuError::Validation(format!(
                "Memory slot M{} not in range ({} slots available on {})",
                slot, self.policy.memory_slot_count, self.policy.name
            )));
        }
        Ok(())
    }

    fn require(&self, supported: bool, operation: &str) -> PsuResult<()> {
        if !supported {
            return Err(PsuError::Unsupported(format!(
                "{} is not supported by {}",
                operation, self.policy.name
            )));
        }
        Ok(())
    }

    /// Parse a numeric reply; an empty or garbled reply fails verification
    fn read_number(&mut self, quantity: Quantity, command: &str) -> PsuResult<f64> {
        let reply = self.transport.read_text()?;
        let field = match (quantity, self.policy.current_reply_width) {
            (Quantity::Current, Some(width)) => reply.get(..width).unwrap_or(reply.as_str()),
            _ => reply.as_str(),
        };
        let field = field.trim();

        if field.is_empty() {
            return Err(PsuError::Verification(format!("No response to {}", command)));
        }
        match field.parse::<f64>() {
            Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
            _ => Err(PsuError::Verification(format!(
                "Could not parse {:?} in response to {}",
                reply, command
            ))),
        }
    }

    fn query_number(&mut self, quantity: Quantity, command: String) -> PsuResult<f64> {
        self.transport.send(&command)?;
        self.read_number(quantity, &command)
    }

    /// Raw identity string, e.g. `TENMA 72-2540 V2.1`
    pub fn identity(&mut self) -> PsuResult<String> {
        self.transport.send(CMD_IDENTITY)?;
        self.transport.read_text()
    }

    pub fn status(&mut self) -> PsuResult<Status> {
        self.transport.send(CMD_STATUS)?;
        let bytes = self.transport.read_bytes()?;
        // Newline-terminated firmware sends a trailing '\n' after the status byte
        let status = bytes
            .first()
            .ok_or_else(|| PsuError::Verification("No response to STATUS?".to_string()))?;
        Ok(Status::parse(self.policy.status_layout, *status))
    }

    /// Programmed voltage of `channel`, in volts
    pub fn read_voltage(&mut self, channel: u8) -> PsuResult<f64> {
        self.check_quantity_channel(Quantity::Voltage, channel)?;
        let command = self.commands().query_setting(Quantity::Voltage, channel);
        self.query_number(Quantity::Voltage, command)
    }

    /// Programmed current limit of `channel`, in amps
    pub fn read_current(&mut self, channel: u8) -> PsuResult<f64> {
        self.check_quantity_channel(Quantity::Current, channel)?;
        let command = self.commands().query_setting(Quantity::Current, channel);
        self.query_number(Quantity::Current, command)
    }

    /// Measured output voltage of `channel`, in volts
    pub fn read_output_voltage(&mut self, channel: u8) -> PsuResult<f64> {
        self.check_quantity_channel(Quantity::Voltage, channel)?;
        let command = self.commands().query_output(Quantity::Voltage, channel);
        self.query_number(Quantity::Voltage, command)
    }

    /// Measured output current of `channel`, in amps
    pub fn read_output_current(&mut self, channel: u8) -> PsuResult<f64> {
        self.check_quantity_channel(Quantity::Current, channel)?;
        let command = self.commands().query_output(Quantity::Current, channel);
        self.query_number(Quantity::Current, command)
    }

    /// Program the voltage of `channel` and verify it by reading it back.
    /// Returns the read-back value in volts.
    pub fn set_voltage(&mut self, channel: u8, millivolts: u32) -> PsuResult<f64> {
        self.check_quantity_channel(Quantity::Voltage, channel)?;
        self.check_value(Quantity::Voltage, channel, millivolts)?;
        if let Some(aux) = self.policy.aux_channel {
            if aux.channel == channel && !aux.voltage_presets_mv.contains(&millivolts) {
                return Err(PsuError::Validation(format!(
                    "Channel CH{} can only be set to one of {:?}mV",
                    channel, aux.voltage_presets_mv
                )));
            }
        }
        self.set_and_verify(Quantity::Voltage, channel, millivolts)
    }

    /// Program the current limit of `channel` and verify it by reading it
    /// back. Returns the read-back value in amps.
    pub fn set_current(&mut self, channel: u8, milliamps: u32) -> PsuResult<f64> {
        self.check_quantity_channel(Quantity::Current, channel)?;
        self.check_value(Quantity::Current, channel, milliamps)?;
        self.set_and_verify(Quantity::Current, channel, milliamps)
    }

    fn set_and_verify(
        &mut self,
        quantity: Quantity,
        channel: u8,
        requested: u32,
    ) -> PsuResult<f64> {
        let command = self.commands().set(quantity, channel, requested);
        self.transport.send(&command)?;

        let query = self.commands().query_setting(quantity, channel);
        let read_back = self.query_number(quantity, query)?;
        let observed = to_milli(read_back);

        if observed != requested {
            return Err(PsuError::Mismatch {
                quantity,
                requested,
                observed,
            });
        }
        Ok(read_back)
    }

    /// Send `SAV{slot}`. Most firmware commits the *active* slot regardless
    /// of the argument; see [`Self::save_conf_flow`].
    pub fn save_conf(&mut self, slot: u8) -> PsuResult<()> {
        self.check_slot(slot)?;
        let command = self.commands().save(slot);
        self.transport.send(&command)
    }

    /// Store the present voltage and current of `channel` into `slot`.
    ///
    /// The output is switched off, the settings are read, `slot` is recalled
    /// to make it the active one, the settings are written back and then
    /// committed with `SAV`.
    pub fn save_conf_flow(&mut self, slot: u8, channel: u8) -> PsuResult<()> {
        self.check_slot(slot)?;
        self.check_quantity_channel(Quantity::Current, channel)?;

        if self.policy.capabilities.direct_save {
            return self.save_conf(slot);
        }

        self.off(None)?;

        let volts = self.read_voltage(channel)?;
        let amps = self.read_current(channel)?;

        self.recall_conf(slot)?;

        self.set_voltage(channel, to_milli(volts))?;
        self.set_current(channel, to_milli(amps))?;

        self.save_conf(slot)?;
        debug!("Saved {}V {}A to M{}", volts, amps, slot);
        Ok(())
    }

    /// Load a memory slot, same as pressing its button on the front panel
    pub fn recall_conf(&mut self, slot: u8) -> PsuResult<()> {
        self.check_slot(slot)?;
        let command = self.commands().recall(slot);
        self.transport.send(&command)
    }

    fn set_flag(&mut self, flag: Flag, supported: bool, enable: bool) -> PsuResult<()> {
        self.require(supported, flag.mnemonic())?;
        let command = self.commands().flag(flag, enable);
        // There is no feedback on whether the flag took effect
        self.transport.send(&command)
    }

    pub fn set_ocp(&mut self, enable: bool) -> PsuResult<()> {
        self.set_flag(Flag::Ocp, self.policy.capabilities.ocp, enable)
    }

    pub fn set_ovp(&mut self, enable: bool) -> PsuResult<()> {
        self.set_flag(Flag::Ovp, self.policy.capabilities.ovp, enable)
    }

    pub fn set_beep(&mut self, enable: bool) -> PsuResult<()> {
        self.set_flag(Flag::Beep, self.policy.capabilities.beep, enable)
    }

    /// Front-panel key lock
    pub fn set_lock(&mut self, enable: bool) -> PsuResult<()> {
        self.set_flag(Flag::Lock, self.policy.capabilities.lock, enable)
    }

    fn set_output(&mut self, channel: Option<u8>, enable: bool) -> PsuResult<()> {
        if let Some(channel) = channel {
            self.check_channel(channel)?;
        }
        let command = self.commands().output(channel, enable);
        self.transport.send(&command)
    }

    /// Turn on one output, or all of them when `channel` is `None`
    pub fn on(&mut self, channel: Option<u8>) -> PsuResult<()> {
        self.set_output(channel, true)
    }

    /// Turn off one output, or all of them when `channel` is `None`
    pub fn off(&mut self, channel: Option<u8>) -> PsuResult<()> {
        self.set_output(channel, false)
    }

    pub fn set_tracking(&mut self, mode: TrackingMode) -> PsuResult<()> {
        self.require(self.policy.capabilities.tracking, "Tracking")?;
        let command = self.commands().tracking(mode);
        self.transport.send(&command)?;
        info!("Tracking set to {}", mode);
        Ok(())
    }

    fn set_manual_step(&mut self, quantity: Quantity, channel: u8, step: u32) -> PsuResult<()> {
        self.require(self.policy.capabilities.stepping, "Stepping")?;
        self.check_quantity_channel(quantity, channel)?;
        self.check_value(quantity, channel, step)?;
        let command = self.commands().manual_step(quantity, channel, step);
        self.transport.send(&command)
    }

    fn step(&mut self, quantity: Quantity, channel: u8, direction: StepDirection) -> PsuResult<()> {
        self.require(self.policy.capabilities.stepping, "Stepping")?;
        self.check_quantity_channel(quantity, channel)?;
        let command = self.commands().step(quantity, channel, direction);
        self.transport.send(&command)
    }

    fn start_auto_step(
        &mut self,
        quantity: Quantity,
        channel: u8,
        start: u32,
        stop: u32,
        step: u32,
        seconds: u32,
    ) -> PsuResult<()> {
        self.require(self.policy.capabilities.stepping, "Stepping")?;
        self.check_quantity_channel(quantity, channel)?;
        self.check_value(quantity, channel, start)?;
        self.check_value(quantity, channel, stop)?;

        let span = start.abs_diff(stop);
        if step == 0 || step > span {
            return Err(PsuError::Validation(format!(
                "Channel CH{} {} step {}{} must be between 1{} and the ramp span {}{}",
                channel,
                quantity.name(),
                step,
                quantity,
                quantity,
                span,
                quantity
            )));
        }

        let command = self
            .commands()
            .auto_step(quantity, channel, start, stop, step, seconds);
        self.transport.send(&command)
    }

    fn stop_auto_step(&mut self, quantity: Quantity, channel: u8) -> PsuResult<()> {
        self.require(self.policy.capabilities.stepping, "Stepping")?;
        self.check_quantity_channel(quantity, channel)?;
        let command = self.commands().stop_auto_step(quantity, channel);
        self.transport.send(&command)
    }

    /// Size of the step applied by [`Self::step_voltage_up`]/[`Self::step_voltage_down`]
    pub fn set_manual_voltage_step(&mut self, channel: u8, millivolts: u32) -> PsuResult<()> {
        self.set_manual_step(Quantity::Voltage, channel, millivolts)
    }

    pub fn step_voltage_up(&mut self, channel: u8) -> PsuResult<()> {
        self.step(Quantity::Voltage, channel, StepDirection::Up)
    }

    pub fn step_voltage_down(&mut self, channel: u8) -> PsuResult<()> {
        self.step(Quantity::Voltage, channel, StepDirection::Down)
    }

    /// Size of the step applied by [`Self::step_current_up`]/[`Self::step_current_down`]
    pub fn set_manual_current_step(&mut self, channel: u8, milliamps: u32) -> PsuResult<()> {
        self.set_manual_step(Quantity::Current, channel, milliamps)
    }

    pub fn step_current_up(&mut self, channel: u8) -> PsuResult<()> {
        self.step(Quantity::Current, channel, StepDirection::Up)
    }

    pub fn step_current_down(&mut self, channel: u8) -> PsuResult<()> {
        self.step(Quantity::Current, channel, StepDirection::Down)
    }

    /// Ramp the voltage from `start` to `stop` mV by `step` mV every `seconds`
    pub fn start_auto_voltage_step(
        &mut self,
        channel: u8,
        start: u32,
        stop: u32,
        step: u32,
        seconds: u32,
    ) -> PsuResult<()> {
        self.start_auto_step(Quantity::Voltage, channel, start, stop, step, seconds)
    }

    pub fn stop_auto_voltage_step(&mut self, channel: u8) -> PsuResult<()> {
        self.stop_auto_step(Quantity::Voltage, channel)
    }

    /// Ramp the current from `start` to `stop` mA by `step` mA every `seconds`
    pub fn start_auto_current_step(
        &mut self,
        channel: u8,
        start: u32,
        stop: u32,
        step: u32,
        seconds: u32,
    ) -> PsuResult<()> {
        self.start_auto_step(Quantity::Current, channel, start, stop, step, seconds)
    }

    pub fn stop_auto_current_step(&mut self, channel: u8) -> PsuResult<()> {
        self.stop_auto_step(Quantity::Current, channel)
    }
}
