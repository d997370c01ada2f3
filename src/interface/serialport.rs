use tracing::trace;

use super::{ConnectionParams, DeviceInterface, PortOpener};
use crate::constants::MAX_RESPONSE_SIZE;

use crate::error::{PsuError, PsuResult};
use std::io::{Read, Write};

/// Serial port device_interface layer
pub(crate) struct SerialPortDevice {
    serial_port: Box<dyn serialport::SerialPort>,
}

impl SerialPortDevice {
    pub fn new(params: &ConnectionParams) -> PsuResult<SerialPortDevice> {
        let serial_port = serialport::new(params.port.as_str(), params.baud)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .timeout(params.read_timeout)
            .open()
            .map_err(|e| {
                PsuError::Communication(format!("Could not open {}: {:?}", params.port, e))
            })?;

        Ok(SerialPortDevice { serial_port })
    }
}

impl DeviceInterface for SerialPortDevice {
    fn send(&mut self, bytes: &[u8]) -> PsuResult<()> {
        self.serial_port
            .write_all(bytes)
            .map_err(|e| PsuError::Communication(format!("{:?}", e)))?;
        self.serial_port
            .flush()
            .map_err(|e| PsuError::Communication(format!("Failed to flush: {:?}", e)))?;
        trace!("Sent {} bytes", bytes.len());
        Ok(())
    }

    fn receive(&mut self) -> PsuResult<Vec<u8>> {
        let mut buffer: Vec<u8> = Vec::new();

        loop {
            let waiting = self
                .serial_port
                .bytes_to_read()
                .map_err(|e| PsuError::Communication(format!("{:?}", e)))?
                as usize;
            if waiting == 0 {
                break;
            }

            let mut chunk = vec![0; waiting.min(MAX_RESPONSE_SIZE)];
            let size = self
                .serial_port
                .read(&mut chunk)
                // Timeout error is fine, just continue
                .or_else(|e| {
                    if e.kind() == std::io::ErrorKind::TimedOut {
                        Ok(0)
                    } else {
                        Err(e)
                    }
                })
                .map_err(|e| PsuError::Communication(format!("{:?}", e)))?;

            if size == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..size]);
        }

        trace!("Received {} bytes", buffer.len());
        Ok(buffer)
    }
}

/// Opens real serial ports through the `serialport` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialPortOpener;

impl PortOpener for SerialPortOpener {
    fn open(&self, params: &ConnectionParams) -> PsuResult<Box<dyn DeviceInterface>> {
        Ok(Box::new(SerialPortDevice::new(params)?))
    }
}
