use tracing::{debug, info};

use crate::error::{PsuError, PsuResult};
use crate::interface::{ConnectionParams, DeviceInterface, PortOpener};

/// ASCII command transport on top of a [`DeviceInterface`].
///
/// Every command gets the model's line terminator appended and is followed
/// by a fixed settle delay; there is no response-ready detection, so a slow
/// device simply yields an empty read.
pub struct Transport {
    opener: Box<dyn PortOpener>,
    params: ConnectionParams,
    terminator: &'static str,
    device: Option<Box<dyn DeviceInterface>>,
}

impl Transport {
    pub fn open(
        opener: Box<dyn PortOpener>,
        params: ConnectionParams,
        terminator: &'static str,
    ) -> PsuResult<Self> {
        let device = opener.open(&params)?;
        info!("Opened {} at {} baud", params.port, params.baud);

        Ok(Transport {
            opener,
            params,
            terminator,
            device: Some(device),
        })
    }

    pub fn port(&self) -> &str {
        &self.params.port
    }

    pub(crate) fn set_terminator(&mut self, terminator: &'static str) {
        self.terminator = terminator;
    }

    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    fn device(&mut self) -> PsuResult<&mut Box<dyn DeviceInterface>> {
        let port = &self.params.port;
        self.device
            .as_mut()
            .ok_or_else(|| PsuError::Communication(format!("Port {} is closed", port)))
    }

    /// Send a command with the configured terminator and wait for the device to settle
    pub fn send(&mut self, command: &str) -> PsuResult<()> {
        self.send_with_terminator(command, self.terminator)
    }

    pub fn send_with_terminator(&mut self, command: &str, terminator: &str) -> PsuResult<()> {
        debug!(">> {}", command);
        let framed = format!("{}{}", command, terminator);
        self.device()?.send(framed.as_bytes())?;

        // Give the firmware time to process and answer
        if !self.params.settle_delay.is_zero() {
            std::thread::sleep(self.params.settle_delay);
        }
        Ok(())
    }

    /// Drain the input buffer as ASCII text. Empty means no response.
    /// Bytes outside ASCII come back as U+FFFD.
    pub fn read_text(&mut self) -> PsuResult<String> {
        let bytes = self.device()?.receive()?;
        let text: String = String::from_utf8_lossy(&bytes)
            .chars()
            .map(|c| if c.is_ascii() { c } else { char::REPLACEMENT_CHARACTER })
            .collect();
        debug!("<< {}", text.trim());
        Ok(text)
    }

    /// Drain the input buffer as raw bytes, for binary status replies
    pub fn read_bytes(&mut self) -> PsuResult<Vec<u8>> {
        let bytes = self.device()?.receive()?;
        debug!(
            "<< {:?}",
            bytes
                .iter()
                .map(|b| format!("0x{:02x}", b))
                .collect::<Vec<_>>()
        );
        Ok(bytes)
    }

    /// Close the current handle and open `port` with the same line settings
    pub fn reopen(&mut self, port: &str) -> PsuResult<()> {
        self.close();
        self.params.port = port.to_owned();
        self.device = Some(self.opener.open(&self.params)?);
        info!("Reopened {} at {} baud", self.params.port, self.params.baud);
        Ok(())
    }

    pub fn close(&mut self) {
        if self.device.take().is_some() {
            info!("Closed {}", self.params.port);
        }
    }
}
