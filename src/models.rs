use clap::ValueEnum;

use crate::constants::{ALTERNATE_TERMINATOR, BASE_TERMINATOR};
use crate::protocol::status::StatusLayout;

/// Model enum includes every power supply with a known policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Model {
    /// 30V 3A, single channel
    #[value(name = "72-2535")]
    Tenma72_2535,

    /// 30V 5A, single channel
    #[value(name = "72-2540")]
    Tenma72_2540,

    /// 60V 2A, single channel
    #[value(name = "72-2545")]
    Tenma72_2545,

    /// 60V 3A, single channel. Also sold as Korad KA6003P
    #[value(name = "72-2550")]
    Tenma72_2550,

    /// 31V 3.1A, single channel
    #[value(name = "72-2705")]
    Tenma72_2705,

    /// 30V 10A, single channel
    #[value(name = "72-2930")]
    Tenma72_2930,

    /// 60V 5A, single channel
    #[value(name = "72-2940")]
    Tenma72_2940,

    /// 2x30V 3A plus a fixed-voltage auxiliary output
    #[value(name = "72-13320")]
    Tenma72_13320,

    /// 2x30V 5A plus a fixed-voltage auxiliary output
    #[value(name = "72-13330")]
    Tenma72_13330,
}

/// How a command names the channel it acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// Output commands carry no channel (`OUT1` switches the only output)
    Implicit,
    /// Output commands are prefixed with the channel (`OUT2:1`)
    PerChannel,
}

/// Operations only some firmware implements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub ocp: bool,
    pub ovp: bool,
    pub beep: bool,
    pub lock: bool,
    pub tracking: bool,
    pub stepping: bool,
    /// `SAV{n}` stores straight into slot n instead of the active slot
    pub direct_save: bool,
}

/// Fixed-voltage output found on 3-channel units. It cannot report or
/// program current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuxChannel {
    pub channel: u8,
    pub voltage_presets_mv: &'static [u32],
}

/// Immutable per-model limits, dialect and capabilities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub model: Model,
    pub name: &'static str,
    /// Substrings looked for in the `*IDN?` response
    pub signatures: &'static [&'static str],
    pub channel_count: u8,
    pub memory_slot_count: u8,
    pub max_milliamps: u32,
    pub max_millivolts: u32,
    pub terminator: &'static str,
    /// Placed between the channel and the argument of a setter (`VSET1:12.00`)
    pub separator: &'static str,
    pub addressing: Addressing,
    pub status_layout: StatusLayout,
    /// Current replies are cut to this many characters before parsing.
    /// Works around firmware that appends a stray byte to `ISET?` answers.
    pub current_reply_width: Option<usize>,
    pub aux_channel: Option<AuxChannel>,
    pub capabilities: Capabilities,
}

const SINGLE_CHANNEL: Capabilities = Capabilities {
    ocp: true,
    ovp: true,
    beep: true,
    lock: false,
    tracking: false,
    stepping: false,
    direct_save: false,
};

const MULTI_CHANNEL: Capabilities = Capabilities {
    ocp: false,
    ovp: false,
    beep: true,
    lock: true,
    tracking: true,
    stepping: true,
    direct_save: false,
};

const AUX_CHANNEL_3: AuxChannel = AuxChannel {
    channel: 3,
    voltage_presets_mv: &[2500, 3300, 5000],
};

/// Single-channel units share one firmware family; only limits differ
const fn single_channel(
    model: Model,
    name: &'static str,
    signatures: &'static [&'static str],
    max_milliamps: u32,
    max_millivolts: u32,
) -> Policy {
    Policy {
        model,
        name,
        signatures,
        channel_count: 1,
        memory_slot_count: 5,
        max_milliamps,
        max_millivolts,
        terminator: BASE_TERMINATOR,
        separator: ":",
        addressing: Addressing::Implicit,
        status_layout: StatusLayout::SingleChannel,
        current_reply_width: Some(5),
        aux_channel: None,
        capabilities: SINGLE_CHANNEL,
    }
}

const fn multi_channel(
    model: Model,
    name: &'static str,
    signatures: &'static [&'static str],
    max_milliamps: u32,
    max_millivolts: u32,
) -> Policy {
    Policy {
        model,
        name,
        signatures,
        channel_count: 3,
        // Ten slots exist but none are reachable from the front panel
        memory_slot_count: 0,
        max_milliamps,
        max_millivolts,
        terminator: ALTERNATE_TERMINATOR,
        separator: ":",
        addressing: Addressing::PerChannel,
        status_layout: StatusLayout::MultiChannel,
        current_reply_width: None,
        aux_channel: Some(AUX_CHANNEL_3),
        capabilities: MULTI_CHANNEL,
    }
}

/// Every known model, in matching order. The first policy with a signature
/// contained in the identity string wins, so more specific signatures must
/// come before broader ones.
static REGISTRY: [Policy; 9] = [
    multi_channel(Model::Tenma72_13330, "72-13330", &["72-13330"], 5000, 30000),
    multi_channel(Model::Tenma72_13320, "72-13320", &["72-13320"], 3000, 30000),
    single_channel(Model::Tenma72_2540, "72-2540", &["72-2540"], 5000, 30000),
    single_channel(Model::Tenma72_2535, "72-2535", &["72-2535"], 3000, 30000),
    DEFAULT_POLICY,
    single_channel(
        Model::Tenma72_2550,
        "72-2550",
        &["72-2550", "KORADKA6003P"],
        3000,
        60000,
    ),
    single_channel(Model::Tenma72_2930, "72-2930", &["72-2930"], 10000, 30000),
    single_channel(Model::Tenma72_2705, "72-2705", &["72-2705"], 3100, 31000),
    single_channel(Model::Tenma72_2940, "72-2940", &["72-2940"], 5000, 60000),
];

/// Policy assumed when the identity string matches nothing
const DEFAULT_POLICY: Policy =
    single_channel(Model::Tenma72_2545, "72-2545", &["72-2545"], 2000, 60000);

pub fn registry() -> &'static [Policy] {
    &REGISTRY
}

pub fn policy_for(model: Model) -> &'static Policy {
    REGISTRY
        .iter()
        .find(|policy| policy.model == model)
        // Every Model variant has exactly one registry entry
        .unwrap_or(&DEFAULT_POLICY)
}

/// Registry entry of the model assumed when the identity matches nothing
pub fn default_policy() -> &'static Policy {
    policy_for(DEFAULT_POLICY.model)
}

/// First policy in registry order with a signature found in `identity`
pub fn match_identity(identity: &str) -> Option<&'static Policy> {
    REGISTRY.iter().find(|policy| {
        policy
            .signatures
            .iter()
            .any(|signature| identity.contains(signature))
    })
}

impl Policy {
    pub fn supports_memory(&self) -> bool {
        self.memory_slot_count > 0
    }

    pub(crate) fn is_aux_channel(&self, channel: u8) -> bool {
        self.aux_channel.is_some_and(|aux| aux.channel == channel)
    }
}
