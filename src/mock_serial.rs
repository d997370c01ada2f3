//! A simulated power supply used by the unit tests. It speaks the same ASCII
//! dialect as the real firmware and keeps its own channel and memory state.

use std::cell::{Ref, RefCell, RefMut};
use std::io;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{PsuError, PsuResult};
use crate::interface::{ConnectionParams, DeviceInterface, PortOpener};
use crate::protocol::status::StatusLayout;

pub(crate) fn test_params() -> ConnectionParams {
    ConnectionParams::new("/dev/ttyMOCK0").with_settle_delay(Duration::ZERO)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ChannelState {
    pub voltage_mv: u32,
    pub current_ma: u32,
    pub output: bool,
    pub voltage_step_mv: u32,
    pub current_step_ma: u32,
}

pub(crate) struct SimState {
    pub identity: String,
    pub status_layout: StatusLayout,
    /// Appended to every text reply
    pub reply_suffix: &'static str,
    /// Ignore commands that do not end in a newline
    pub requires_newline: bool,
    /// Answer setting queries one resolution step above the real value
    pub off_by_one: bool,
    /// Append a stray byte to current replies
    pub stray_current_byte: bool,
    /// `SAV{n}` writes slot n rather than the active slot
    pub direct_save: bool,
    /// Refuse to open the port
    pub fail_open: bool,
    /// Answer every text query with these bytes instead
    pub reply_override: Option<Vec<u8>>,

    pub channels: Vec<ChannelState>,
    pub memory: Vec<Vec<ChannelState>>,
    pub active_slot: usize,
    pub beep: bool,
    pub lock: bool,
    pub ocp: bool,
    pub ovp: bool,
    pub tracking: u8,

    pub raw_writes: Vec<String>,
    pub commands: Vec<String>,
    pub opened_ports: Vec<String>,
    pub open_handles: usize,
    pending: Vec<u8>,
}

impl SimState {
    fn new(identity: &str) -> Self {
        SimState {
            identity: identity.to_owned(),
            status_layout: StatusLayout::SingleChannel,
            reply_suffix: "",
            requires_newline: false,
            off_by_one: false,
            stray_current_byte: false,
            direct_save: false,
            fail_open: false,
            reply_override: None,
            channels: vec![ChannelState::default(); 3],
            memory: vec![vec![ChannelState::default(); 3]; 11],
            active_slot: 1,
            beep: false,
            lock: false,
            ocp: false,
            ovp: false,
            tracking: 0,
            raw_writes: Vec::new(),
            commands: Vec::new(),
            opened_ports: Vec::new(),
            open_handles: 0,
            pending: Vec::new(),
        }
    }

    fn reply(&mut self, text: &str) {
        match &self.reply_override {
            Some(bytes) => self.pending.extend_from_slice(bytes),
            None => self.pending.extend_from_slice(text.as_bytes()),
        }
        self.pending.extend_from_slice(self.reply_suffix.as_bytes());
    }

    fn channel(&mut self, index: &str) -> Option<&mut ChannelState> {
        let index: usize = index.parse().ok()?;
        self.channels.get_mut(index.checked_sub(1)?)
    }

    fn status_byte(&self) -> u8 {
        let mut status = 0x01 | 0x02;
        match self.status_layout {
            StatusLayout::SingleChannel => {
                let tracking: u8 = match self.tracking {
                    1 => 0b01,
                    2 => 0b11,
                    _ => 0b00,
                };
                status |= tracking << 2;
                if self.beep {
                    status |= 0x10;
                }
                if self.lock {
                    status |= 0x20;
                }
                if self.channels[0].output {
                    status |= 0x40;
                }
            }
            StatusLayout::MultiChannel => {
                status |= (self.tracking & 0b11) << 2;
                if self.channels[0].output {
                    status |= 0x40;
                }
                if self.channels[1].output {
                    status |= 0x80;
                }
            }
        }
        status
    }

    fn handle(&mut self, command: &str) {
        let off_by_one = self.off_by_one;

        if command == "*IDN?" {
            let identity = self.identity.clone();
            self.reply(&identity);
        } else if command == "STATUS?" {
            let status = self.status_byte();
            self.pending.push(status);
            self.pending.extend_from_slice(self.reply_suffix.as_bytes());
        } else if let Some(rest) = command.strip_prefix("VSET") {
            if let Some(channel) = rest.strip_suffix('?') {
                if let Some(state) = self.channel(channel) {
                    let mv = state.voltage_mv + if off_by_one { 10 } else { 0 };
                    self.reply(&format!("{:05.2}", f64::from(mv) / 1000.0));
                }
            } else if let Some((channel, value)) = rest.split_once(':') {
                if let Some(state) = self.channel(channel) {
                    state.voltage_mv = milli(value);
                }
            }
        } else if let Some(rest) = command.strip_prefix("ISET") {
            if let Some(channel) = rest.strip_suffix('?') {
                let stray = self.stray_current_byte;
                if let Some(state) = self.channel(channel) {
                    let ma = state.current_ma + if off_by_one { 1 } else { 0 };
                    let mut text = format!("{:.3}", f64::from(ma) / 1000.0);
                    if stray {
                        text.push('K');
                    }
                    self.reply(&text);
                }
            } else if let Some((channel, value)) = rest.split_once(':') {
                if let Some(state) = self.channel(channel) {
                    state.current_ma = milli(value);
                }
            }
        } else if let Some(channel) = command
            .strip_prefix("VOUT")
            .and_then(|rest| rest.strip_suffix('?'))
        {
            if let Some(state) = self.channel(channel) {
                let mv = if state.output { state.voltage_mv } else { 0 };
                self.reply(&format!("{:05.2}", f64::from(mv) / 1000.0));
            }
        } else if let Some(channel) = command
            .strip_prefix("IOUT")
            .and_then(|rest| rest.strip_suffix('?'))
        {
            if self.channel(channel).is_some() {
                self.reply("0.000");
            }
        } else if let Some(rest) = command.strip_prefix("OUT") {
            match rest.split_once(':') {
                Some(("12", flag)) => {
                    self.channels[0].output = flag == "1";
                    self.channels[1].output = flag == "1";
                }
                Some((channel, flag)) => {
                    if let Some(state) = self.channel(channel) {
                        state.output = flag == "1";
                    }
                }
                None => self.channels[0].output = rest == "1",
            }
        } else if let Some(slot) = command.strip_prefix("SAV") {
            if let Ok(slot) = slot.parse::<usize>() {
                let target = if self.direct_save {
                    slot
                } else {
                    self.active_slot
                };
                if target < self.memory.len() {
                    self.memory[target] = self.channels.clone();
                }
            }
        } else if let Some(slot) = command.strip_prefix("RCL") {
            if let Ok(slot) = slot.parse::<usize>() {
                if slot < self.memory.len() {
                    self.active_slot = slot;
                    self.channels = self.memory[slot].clone();
                }
            }
        } else if let Some(flag) = command.strip_prefix("OCP") {
            self.ocp = flag == "1";
        } else if let Some(flag) = command.strip_prefix("OVP") {
            self.ovp = flag == "1";
        } else if let Some(flag) = command.strip_prefix("BEEP") {
            self.beep = flag == "1";
        } else if let Some(flag) = command.strip_prefix("LOCK") {
            self.lock = flag == "1";
        } else if let Some(mode) = command.strip_prefix("TRACK") {
            self.tracking = mode.parse().unwrap_or(0);
        } else if let Some((channel, value)) = command
            .strip_prefix("VSTEP")
            .and_then(|rest| rest.split_once(':'))
        {
            if let Some(state) = self.channel(channel) {
                state.voltage_step_mv = milli(value);
            }
        } else if let Some((channel, value)) = command
            .strip_prefix("ISTEP")
            .and_then(|rest| rest.split_once(':'))
        {
            if let Some(state) = self.channel(channel) {
                state.current_step_ma = milli(value);
            }
        } else if let Some(channel) = command.strip_prefix("VUP") {
            if let Some(state) = self.channel(channel) {
                state.voltage_mv += state.voltage_step_mv;
            }
        } else if let Some(channel) = command.strip_prefix("VDOWN") {
            if let Some(state) = self.channel(channel) {
                state.voltage_mv = state.voltage_mv.saturating_sub(state.voltage_step_mv);
            }
        } else if let Some(channel) = command.strip_prefix("IUP") {
            if let Some(state) = self.channel(channel) {
                state.current_ma += state.current_step_ma;
            }
        } else if let Some(channel) = command.strip_prefix("IDOWN") {
            if let Some(state) = self.channel(channel) {
                state.current_ma = state.current_ma.saturating_sub(state.current_step_ma);
            }
        }
        // VASTEP/IASTEP/VASTOP/IASTOP are only recorded
    }
}

fn milli(value: &str) -> u32 {
    value
        .parse::<f64>()
        .map(|v| (v * 1000.0).round() as u32)
        .unwrap_or(0)
}

/// Log sink shared between a scoped subscriber and the test reading it
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` under a subscriber that records every event, and return the output
pub(crate) fn capture_logs(f: impl FnOnce()) -> String {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .finish();

    tracing::subscriber::with_default(subscriber, f);
    let bytes = buffer.0.lock().unwrap().clone();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Shared handle to the simulated unit. Clones see the same state.
#[derive(Clone)]
pub(crate) struct SimulatedPsu {
    state: Rc<RefCell<SimState>>,
}

impl SimulatedPsu {
    /// Single-channel unit without line terminator
    pub fn new(identity: &str) -> Self {
        SimulatedPsu {
            state: Rc::new(RefCell::new(SimState::new(identity))),
        }
    }

    /// Three-channel unit that only answers newline-terminated commands
    pub fn multi_channel(identity: &str) -> Self {
        let sim = Self::new(identity);
        {
            let mut state = sim.state_mut();
            state.status_layout = StatusLayout::MultiChannel;
            state.reply_suffix = "\n";
            state.requires_newline = true;
        }
        sim
    }

    pub fn configure(self, f: impl FnOnce(&mut SimState)) -> Self {
        f(&mut *self.state.borrow_mut());
        self
    }

    pub fn opener(&self) -> Box<dyn PortOpener> {
        Box::new(self.clone())
    }

    pub fn state(&self) -> Ref<'_, SimState> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> RefMut<'_, SimState> {
        self.state.borrow_mut()
    }

    /// Commands as understood by the unit, terminator stripped
    pub fn commands(&self) -> Vec<String> {
        self.state().commands.clone()
    }

    /// Exact strings written to the port
    pub fn raw_writes(&self) -> Vec<String> {
        self.state().raw_writes.clone()
    }

    pub fn clear_commands(&self) {
        let mut state = self.state_mut();
        state.commands.clear();
        state.raw_writes.clear();
    }

    pub fn opened_ports(&self) -> Vec<String> {
        self.state().opened_ports.clone()
    }

    pub fn open_handles(&self) -> usize {
        self.state().open_handles
    }

    pub fn channel(&self, channel: usize) -> ChannelState {
        self.state().channels[channel - 1]
    }

    pub fn set_channel(&self, channel: usize, voltage_mv: u32, current_ma: u32) {
        let mut state = self.state_mut();
        state.channels[channel - 1].voltage_mv = voltage_mv;
        state.channels[channel - 1].current_ma = current_ma;
    }
}

impl PortOpener for SimulatedPsu {
    fn open(&self, params: &ConnectionParams) -> PsuResult<Box<dyn DeviceInterface>> {
        let mut state = self.state_mut();
        if state.fail_open {
            return Err(PsuError::Communication(format!(
                "Could not open {}: No such file or directory",
                params.port
            )));
        }
        state.opened_ports.push(params.port.clone());
        state.open_handles += 1;

        Ok(Box::new(MockDevice {
            state: Rc::clone(&self.state),
        }))
    }
}

/// One open handle on the simulated unit
struct MockDevice {
    state: Rc<RefCell<SimState>>,
}

impl DeviceInterface for MockDevice {
    fn send(&mut self, bytes: &[u8]) -> PsuResult<()> {
        let mut state = self.state.borrow_mut();
        let text = String::from_utf8_lossy(bytes).into_owned();
        state.raw_writes.push(text.clone());

        let command = if let Some(command) = text.strip_suffix('\n') {
            command.to_owned()
        } else if state.requires_newline {
            return Ok(());
        } else {
            text
        };
        state.commands.push(command.clone());
        state.handle(&command);
        Ok(())
    }

    fn receive(&mut self) -> PsuResult<Vec<u8>> {
        Ok(std::mem::take(&mut self.state.borrow_mut().pending))
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.state.borrow_mut().open_handles -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(sim: &SimulatedPsu, command: &str) -> String {
        let mut device = sim.opener().open(&test_params()).unwrap();
        device.send(command.as_bytes()).unwrap();
        String::from_utf8(device.receive().unwrap()).unwrap()
    }

    #[test]
    fn test_setting_round_trip() {
        let sim = SimulatedPsu::new("TENMA 72-2540 V2.1");
        exchange(&sim, "VSET1:12.34");
        exchange(&sim, "ISET1:1.250");

        assert_eq!(exchange(&sim, "VSET1?"), "12.34");
        assert_eq!(exchange(&sim, "ISET1?"), "1.250");
        assert_eq!(exchange(&sim, "VSET9?"), "");
    }

    #[test]
    fn test_requires_newline() {
        let sim = SimulatedPsu::multi_channel("TENMA 72-13330 V1.0");
        assert_eq!(exchange(&sim, "*IDN?"), "");
        assert_eq!(exchange(&sim, "*IDN?\n"), "TENMA 72-13330 V1.0\n");
    }

    #[test]
    fn test_save_commits_active_slot() {
        let sim = SimulatedPsu::new("TENMA 72-2540 V2.1");
        sim.set_channel(1, 5000, 100);
        exchange(&sim, "SAV4");

        assert_eq!(sim.state().memory[1][0].voltage_mv, 5000);
        assert_eq!(sim.state().memory[4][0].voltage_mv, 0);
    }

    #[test]
    fn test_handles_are_counted() {
        let sim = SimulatedPsu::new("TENMA 72-2540 V2.1");
        let device = sim.opener().open(&test_params()).unwrap();
        assert_eq!(sim.open_handles(), 1);
        drop(device);
        assert_eq!(sim.open_handles(), 0);
    }
}
