pub mod serialport;

use std::time::Duration;

use crate::constants::{DEFAULT_BAUD_RATE, SERIAL_TIMEOUT_MS, SETTLE_DELAY_MS};
use crate::error::PsuResult;

/// Raw byte link to a power supply
pub trait DeviceInterface {
    /// Write bytes to the device
    fn send(&mut self, bytes: &[u8]) -> PsuResult<()>;

    /// Drain every byte currently waiting on the input buffer.
    /// An empty vector means the device has not answered.
    fn receive(&mut self) -> PsuResult<Vec<u8>>;
}

/// Opens a [`DeviceInterface`] for a given set of connection parameters.
/// Kept separate from the link itself so a transport can be re-opened on a
/// different port.
pub trait PortOpener {
    fn open(&self, params: &ConnectionParams) -> PsuResult<Box<dyn DeviceInterface>>;
}

pub type ComPort = String;
pub type BaudRate = u32;

/// Serial connection settings. Data bits, parity and stop bits are fixed at 8N1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub port: ComPort,
    pub baud: BaudRate,
    /// Wait after every command before the response is drained
    pub settle_delay: Duration,
    /// Timeout for a single blocking read on the port
    pub read_timeout: Duration,
}

impl ConnectionParams {
    pub fn new(port: impl Into<ComPort>) -> Self {
        ConnectionParams {
            port: port.into(),
            baud: DEFAULT_BAUD_RATE,
            settle_delay: Duration::from_millis(SETTLE_DELAY_MS),
            read_timeout: Duration::from_millis(SERIAL_TIMEOUT_MS),
        }
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }
}
