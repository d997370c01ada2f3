use clap::Parser;
use tenma_serial::{
    Model, PowerSupply, TrackingMode, error::PsuResult, interface::ConnectionParams,
};
use tracing::info;

/// Control a Tenma 72-series power supply connected to a serial port
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub(crate) struct ControlOptions {
    /// Serial port
    #[clap(default_value = "/dev/ttyUSB0")]
    port: String,

    /// Skip detection and assume this model
    #[clap(short, long)]
    model: Option<Model>,

    /// Set voltage in mV
    #[clap(short, long)]
    voltage: Option<u32>,

    /// Set current in mA
    #[clap(short, long)]
    current: Option<u32>,

    /// Channel to act on
    #[clap(short = 'C', long, default_value_t = 1)]
    channel: u8,

    /// Save current configuration to memory slot
    #[clap(short, long)]
    save: Option<u8>,

    /// Load configuration from memory slot
    #[clap(short, long)]
    recall: Option<u8>,

    /// Retrieve and print system status
    #[clap(short = 'S', long, default_value_t = false)]
    status: bool,

    #[clap(long, default_value_t = false, conflicts_with = "ocp_disable")]
    ocp_enable: bool,

    #[clap(long, default_value_t = false)]
    ocp_disable: bool,

    #[clap(long, default_value_t = false, conflicts_with = "ovp_disable")]
    ovp_enable: bool,

    #[clap(long, default_value_t = false)]
    ovp_disable: bool,

    #[clap(long, default_value_t = false, conflicts_with = "beep_disable")]
    beep_enable: bool,

    #[clap(long, default_value_t = false)]
    beep_disable: bool,

    /// Lock the front panel
    #[clap(long, default_value_t = false, conflicts_with = "unlock")]
    lock: bool,

    #[clap(long, default_value_t = false)]
    unlock: bool,

    /// Output coupling on multi-channel units
    #[clap(long)]
    tracking: Option<TrackingMode>,

    /// Set output to ON
    #[clap(long, default_value_t = false)]
    on: bool,

    /// Set output to OFF
    #[clap(long, default_value_t = false)]
    off: bool,

    /// Print the measured output voltage
    #[clap(long, default_value_t = false)]
    actual_voltage: bool,

    /// Print the measured output current
    #[clap(long, default_value_t = false)]
    actual_current: bool,

    /// Only print query results, no identity banner
    #[clap(long, default_value_t = false)]
    script: bool,

    /// Log serial commands
    #[clap(long, default_value_t = false)]
    pub(crate) debug: bool,

    /// Log raw byte counts as well
    #[clap(long, default_value_t = false)]
    pub(crate) trace: bool,
}

pub(crate) fn handle_control(opts: ControlOptions) -> PsuResult<()> {
    let params = ConnectionParams::new(opts.port.clone());
    let mut psu = match opts.model {
        Some(model) => PowerSupply::with_model(model, params)?,
        None => PowerSupply::detect(params)?,
    };

    let result = run(&mut psu, &opts);

    info!("Closing connection");
    psu.close();
    result
}

fn run(psu: &mut PowerSupply, opts: &ControlOptions) -> PsuResult<()> {
    let channel = opts.channel;

    if !opts.script {
        println!("VERSION: {}", psu.identity()?.trim());
    }

    if opts.ocp_enable || opts.ocp_disable {
        psu.set_ocp(opts.ocp_enable)?;
    }
    if opts.ovp_enable || opts.ovp_disable {
        psu.set_ovp(opts.ovp_enable)?;
    }
    if opts.beep_enable || opts.beep_disable {
        psu.set_beep(opts.beep_enable)?;
    }
    if opts.lock || opts.unlock {
        psu.set_lock(opts.lock)?;
    }
    if let Some(mode) = opts.tracking {
        psu.set_tracking(mode)?;
    }

    if let Some(millivolts) = opts.voltage {
        info!("Setting voltage to {}mV", millivolts);
        psu.set_voltage(channel, millivolts)?;
    }
    if let Some(milliamps) = opts.current {
        info!("Setting current to {}mA", milliamps);
        psu.set_current(channel, milliamps)?;
    }

    if let Some(slot) = opts.save {
        info!("Saving to memory {}", slot);
        psu.save_conf_flow(slot, channel)?;
    }
    if let Some(slot) = opts.recall {
        psu.recall_conf(slot)?;
        let volts = psu.read_voltage(channel)?;
        let amps = psu.read_current(channel)?;

        println!("Loaded from Memory: {}", slot);
        println!("Voltage: {}", volts);
        println!("Current: {}", amps);
    }

    if opts.off {
        psu.off(None)?;
    }
    if opts.on {
        psu.on(None)?;
    }

    if opts.status {
        println!("{}", psu.status()?);
    }
    if opts.actual_current {
        println!("{}", psu.read_output_current(channel)?);
    }
    if opts.actual_voltage {
        println!("{}", psu.read_output_voltage(channel)?);
    }

    Ok(())
}
