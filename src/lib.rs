//! Driver for Tenma 72-series (and rebadged Korad) programmable DC power
//! supplies using the ASCII serial protocol.
//!
//! ```no_run
//! # fn main() -> tenma_serial::error::PsuResult<()> {
//! let mut psu = tenma_serial::open("/dev/ttyUSB0")?;
//! println!("{}", psu.identity()?);
//! psu.set_voltage(1, 12000)?;
//! psu.set_current(1, 500)?;
//! psu.on(None)?;
//! psu.close();
//! # Ok(())
//! # }
//! ```
//!
//! The serial line is fixed at 9600 baud, 8 data bits, no parity, one stop
//! bit. Every command is followed by a fixed settle delay before the reply
//! is read, so a setter that verifies its value costs two round trips.

pub use models::{Model, Policy};
pub use protocol::TrackingMode;
pub use protocol::status::Status;
pub use supply::PowerSupply;

pub(crate) mod constants;
pub mod detect;
pub mod error;
pub mod interface;
pub mod models;
pub mod protocol;
pub mod supply;
pub mod transport;

#[cfg(test)]
mod mock_serial;

use error::PsuResult;
use interface::ConnectionParams;

/// Detect the power supply on `port` using default connection settings
pub fn open(port: &str) -> PsuResult<PowerSupply> {
    PowerSupply::detect(ConnectionParams::new(port))
}
