use tracing::{info, warn};

use crate::constants::{ALTERNATE_TERMINATOR, BASE_TERMINATOR, CMD_IDENTITY};
use crate::error::PsuResult;
use crate::interface::{ConnectionParams, PortOpener};
use crate::models::{Policy, default_policy, match_identity};
use crate::supply::PowerSupply;
use crate::transport::Transport;

/// Identify the unit on `params.port` and return a controller bound to its
/// policy.
///
/// An unrecognised identity is not an error: the default policy is used and
/// a warning is logged. Only failing to open the port is reported.
pub fn detect_with(
    opener: Box<dyn PortOpener>,
    params: ConnectionParams,
) -> PsuResult<PowerSupply> {
    let port = params.port.clone();
    let mut transport = Transport::open(opener, params, BASE_TERMINATOR)?;

    let identity = probe_identity(&mut transport)?;
    transport.close();

    let policy = select_policy(&identity);
    transport.set_terminator(policy.terminator);
    transport.reopen(&port)?;

    Ok(PowerSupply::from_parts(transport, policy))
}

/// Ask for `*IDN?`, retrying once with a newline for firmware that ignores
/// unterminated commands
pub(crate) fn probe_identity(transport: &mut Transport) -> PsuResult<String> {
    transport.send(CMD_IDENTITY)?;
    let identity = transport.read_text()?;
    if !identity.is_empty() {
        return Ok(identity);
    }

    warn!("No identity response, retrying with newline terminator");
    transport.send_with_terminator(CMD_IDENTITY, ALTERNATE_TERMINATOR)?;
    transport.read_text()
}

pub fn select_policy(identity: &str) -> &'static Policy {
    match match_identity(identity) {
        Some(policy) => {
            info!("Detected {} from {:?}", policy.name, identity.trim());
            policy
        }
        None => {
            let policy = default_policy();
            warn!(
                "Could not detect power supply model from {:?}, assuming {}",
                identity.trim(),
                policy.name
            );
            policy
        }
    }
}
