pub(crate) const DEFAULT_BAUD_RATE: u32 = 9600;
pub(crate) const SETTLE_DELAY_MS: u64 = 200;
pub(crate) const SERIAL_TIMEOUT_MS: u64 = 50;
pub(crate) const MAX_RESPONSE_SIZE: usize = 1024;

/// Line terminator used while probing an unknown unit
pub(crate) const BASE_TERMINATOR: &str = "";
/// Some firmware only answers commands ending in a newline
pub(crate) const ALTERNATE_TERMINATOR: &str = "\n";

pub(crate) const CMD_IDENTITY: &str = "*IDN?";
pub(crate) const CMD_STATUS: &str = "STATUS?";

/// Address used by per-channel firmware to switch outputs 1 and 2 together
pub(crate) const ALL_OUTPUTS_ADDRESS: &str = "12";
