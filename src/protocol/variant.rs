//! Per-family protocol parameters.
//!
//! A [`ProtocolVariant`] is an immutable description of one robot
//! generation: its framing, GATT layout, unlock handshake, command table
//! and decoder registry.  Sessions and the state machine are generic over
//! it and never branch on the family themselves.

use super::codec::{Framing, PacketCodec};
use super::commands::{self, Command, CommandSpec, CommandTable, classic_ids, v2_ids};
use super::registry::{DecoderRegistry, RegistryEntry, ResponseKey};
use super::responses;

// ---------------------------------------------------------------------------
// GATT UUIDs
// ---------------------------------------------------------------------------

/// Classic robots: `22bb746f-XXXX-7554-2d6f-726568705327`.
pub mod classic_uuids {
    pub const RADIO_SERVICE: u128 = 0x22bb746f_2bb0_7554_2d6f_726568705327;
    pub const TX_POWER: u128 = 0x22bb746f_2bb2_7554_2d6f_726568705327;
    pub const RSSI: u128 = 0x22bb746f_2bb6_7554_2d6f_726568705327;
    pub const ANTI_DOS: u128 = 0x22bb746f_2bbd_7554_2d6f_726568705327;
    pub const WAKE: u128 = 0x22bb746f_2bbf_7554_2d6f_726568705327;

    pub const CONTROL_SERVICE: u128 = 0x22bb746f_2ba0_7554_2d6f_726568705327;
    pub const COMMANDS: u128 = 0x22bb746f_2ba1_7554_2d6f_726568705327;
    pub const RESPONSES: u128 = 0x22bb746f_2ba6_7554_2d6f_726568705327;
}

/// V2 robots: `000X000Y-574f-4f20-5370-6865726f2121`.
pub mod v2_uuids {
    pub const API_SERVICE: u128 = 0x00010001_574f_4f20_5370_6865726f2121;
    pub const API: u128 = 0x00010002_574f_4f20_5370_6865726f2121;

    pub const DFU_SERVICE: u128 = 0x00020001_574f_4f20_5370_6865726f2121;
    pub const ANTI_DOS: u128 = 0x00020005_574f_4f20_5370_6865726f2121;
}

// ---------------------------------------------------------------------------
// Variant
// ---------------------------------------------------------------------------

/// One fixed write of the unlock sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeStep {
    pub name: &'static str,
    pub service: u128,
    pub characteristic: u128,
    pub payload: &'static [u8],
}

#[derive(Debug)]
pub struct ProtocolVariant {
    pub name: &'static str,
    pub framing: Framing,
    /// Advertised-name prefixes that select this variant.
    pub name_prefixes: &'static [&'static str],
    /// Executed strictly in order before the control channel is used.
    pub handshake: &'static [HandshakeStep],
    pub control_service: u128,
    pub command_characteristic: u128,
    pub response_characteristic: u128,
    /// Characteristic whose notifications carry the link RSSI.
    pub rssi_characteristic: Option<u128>,
    /// Non-frame byte sequences the radio interleaves with notifications.
    pub prompt_artifacts: &'static [&'static [u8]],
    /// Sent once on entering `Ready`.
    pub baseline_query: Command,
    pub commands: CommandTable,
    pub registry: DecoderRegistry,
}

impl ProtocolVariant {
    pub const fn codec(&self) -> PacketCodec {
        PacketCodec::new(self.framing)
    }

    /// Inbound header size before the payload length is known.
    pub const fn header_size(&self) -> usize {
        self.framing.min_header()
    }

    pub fn command(&self, cmd: &Command) -> Option<CommandSpec> {
        (self.commands)(cmd)
    }

    /// Every service discovery must find for the session to proceed.
    pub fn required_services(&self) -> impl Iterator<Item = u128> + '_ {
        self.handshake
            .iter()
            .map(|s| s.service)
            .chain(core::iter::once(self.control_service))
    }

    /// Select the variant for an advertised device name.
    pub fn for_device_name(name: &str) -> Option<&'static ProtocolVariant> {
        ALL_VARIANTS
            .iter()
            .copied()
            .find(|v| v.name_prefixes.iter().any(|p| name.starts_with(p)))
    }
}

pub static ALL_VARIANTS: [&ProtocolVariant; 2] = [&SPHERO_CLASSIC, &SPHERO_V2];

// ── Classic ──────────────────────────────────────────────────

static CLASSIC_HANDSHAKE: [HandshakeStep; 3] = [
    HandshakeStep {
        name: "anti-dos",
        service: classic_uuids::RADIO_SERVICE,
        characteristic: classic_uuids::ANTI_DOS,
        payload: b"011i3",
    },
    HandshakeStep {
        name: "tx-power",
        service: classic_uuids::RADIO_SERVICE,
        characteristic: classic_uuids::TX_POWER,
        payload: &[0x07],
    },
    HandshakeStep {
        name: "wake",
        service: classic_uuids::RADIO_SERVICE,
        characteristic: classic_uuids::WAKE,
        payload: &[0x01],
    },
];

static CLASSIC_REGISTRY: [RegistryEntry; 19] = {
    use classic_ids::*;
    [
        RegistryEntry::new(ResponseKey::ack(CORE, PING), "ping", None),
        RegistryEntry::new(
            ResponseKey::ack(CORE, GET_POWER_STATE),
            "power-state",
            Some(responses::power_state),
        ),
        RegistryEntry::new(ResponseKey::ack(CORE, SET_POWER_NOTIFY), "set-power-notify", None),
        RegistryEntry::new(ResponseKey::ack(CORE, SLEEP), "sleep", None),
        RegistryEntry::new(
            ResponseKey::ack(CORE, SET_INACTIVE_TIMEOUT),
            "set-inactive-timeout",
            None,
        ),
        RegistryEntry::new(ResponseKey::ack(SPHERO, SET_HEADING), "set-heading", None),
        RegistryEntry::new(
            ResponseKey::ack(SPHERO, SET_STABILIZATION),
            "set-stabilization",
            None,
        ),
        RegistryEntry::new(
            ResponseKey::ack(SPHERO, SET_DATA_STREAMING),
            "set-data-streaming",
            None,
        ),
        RegistryEntry::new(
            ResponseKey::ack(SPHERO, CONFIGURE_LOCATOR),
            "configure-locator",
            None,
        ),
        RegistryEntry::new(
            ResponseKey::ack(SPHERO, GET_LOCATOR_DATA),
            "locator",
            Some(responses::locator),
        ),
        RegistryEntry::new(ResponseKey::ack(SPHERO, SET_RGB_LED), "set-rgb-led", None),
        RegistryEntry::new(ResponseKey::ack(SPHERO, SET_BACK_LED), "set-back-led", None),
        RegistryEntry::new(ResponseKey::ack(SPHERO, ROLL), "roll", None),
        RegistryEntry::new(
            ResponseKey::notification(0, NOTIFY_POWER),
            "power-notification",
            Some(responses::power_notification),
        ),
        RegistryEntry::new(
            ResponseKey::notification(0, NOTIFY_SENSOR_STREAM),
            "sensor-stream",
            Some(responses::sensor_stream),
        ),
        RegistryEntry::new(
            ResponseKey::notification(0, NOTIFY_SLEEPING_SOON),
            "sleeping-in-10s",
            None,
        ),
        RegistryEntry::new(ResponseKey::notification(0, NOTIFY_COLLISION), "collision", None),
        RegistryEntry::new(
            ResponseKey::notification(0, NOTIFY_SELF_LEVEL_COMPLETE),
            "self-level-complete",
            None,
        ),
        RegistryEntry::new(ResponseKey::notification(0, 0x14), "sleep", None),
    ]
};

pub static SPHERO_CLASSIC: ProtocolVariant = ProtocolVariant {
    name: "sphero-classic",
    framing: Framing::Plain,
    name_prefixes: &["BB-", "2B-", "Sphero"],
    handshake: &CLASSIC_HANDSHAKE,
    control_service: classic_uuids::CONTROL_SERVICE,
    command_characteristic: classic_uuids::COMMANDS,
    response_characteristic: classic_uuids::RESPONSES,
    rssi_characteristic: Some(classic_uuids::RSSI),
    // ASCII shell prompt echoed by the radio module.
    prompt_artifacts: &[b"\r\n>"],
    baseline_query: Command::GetLocatorData,
    commands: commands::classic_command,
    registry: DecoderRegistry::new(&CLASSIC_REGISTRY),
};

// ── V2 ───────────────────────────────────────────────────────

static V2_HANDSHAKE: [HandshakeStep; 1] = [HandshakeStep {
    name: "anti-dos",
    service: v2_uuids::DFU_SERVICE,
    characteristic: v2_uuids::ANTI_DOS,
    payload: b"usetheforce...band",
}];

static V2_REGISTRY: [RegistryEntry; 7] = {
    use v2_ids::*;
    [
        RegistryEntry::new(ResponseKey::ack(PING_PONG, PING), "ping", None),
        RegistryEntry::new(ResponseKey::ack(MAIN_SYSTEM, LIGHT_SLEEP), "sleep", None),
        RegistryEntry::new(ResponseKey::ack(MAIN_SYSTEM, WAKE), "wake", None),
        RegistryEntry::new(
            ResponseKey::ack(MAIN_SYSTEM, GET_BATTERY_VOLTAGE),
            "battery-voltage",
            Some(responses::battery_voltage),
        ),
        RegistryEntry::new(ResponseKey::ack(DRIVING, DRIVE), "drive", None),
        RegistryEntry::new(ResponseKey::ack(AV_CONTROL, SET_LED), "set-led", None),
        RegistryEntry::new(ResponseKey::ack(AV_CONTROL, PLAY_ANIMATION), "play-animation", None),
    ]
};

pub static SPHERO_V2: ProtocolVariant = ProtocolVariant {
    name: "sphero-v2",
    framing: Framing::Escaped,
    name_prefixes: &["SM-", "D2-", "Q5-", "GB-"],
    handshake: &V2_HANDSHAKE,
    control_service: v2_uuids::API_SERVICE,
    command_characteristic: v2_uuids::API,
    response_characteristic: v2_uuids::API,
    rssi_characteristic: None,
    prompt_artifacts: &[],
    baseline_query: Command::GetBatteryVoltage,
    commands: commands::v2_command,
    registry: DecoderRegistry::new(&V2_REGISTRY),
};
