//! Command catalog.
//!
//! Application intent is a [`Command`] value.  Each device family maps a
//! command to a [`CommandSpec`] (device id, command id, whether the robot
//! should acknowledge it, and the big-endian payload) through a plain
//! lookup function.  Commands a family does not implement map to `None`.

// ---------------------------------------------------------------------------
// Ids
// ---------------------------------------------------------------------------

/// Classic device ids.
pub mod classic_ids {
    pub const CORE: u8 = 0x00;
    pub const SPHERO: u8 = 0x02;

    pub const PING: u8 = 0x01;
    pub const GET_POWER_STATE: u8 = 0x20;
    pub const SET_POWER_NOTIFY: u8 = 0x21;
    pub const SLEEP: u8 = 0x22;
    /// Shares its id with `SLEEP` on this firmware family.
    pub const SET_INACTIVE_TIMEOUT: u8 = 0x22;

    pub const SET_HEADING: u8 = 0x01;
    pub const SET_STABILIZATION: u8 = 0x02;
    pub const SET_DATA_STREAMING: u8 = 0x11;
    pub const CONFIGURE_LOCATOR: u8 = 0x13;
    pub const GET_LOCATOR_DATA: u8 = 0x15;
    pub const SET_RGB_LED: u8 = 0x20;
    pub const SET_BACK_LED: u8 = 0x21;
    pub const ROLL: u8 = 0x30;

    pub const NOTIFY_POWER: u8 = 0x01;
    pub const NOTIFY_SENSOR_STREAM: u8 = 0x03;
    pub const NOTIFY_SLEEPING_SOON: u8 = 0x05;
    pub const NOTIFY_COLLISION: u8 = 0x07;
    pub const NOTIFY_SELF_LEVEL_COMPLETE: u8 = 0x0B;
}

/// V2 device ids.
pub mod v2_ids {
    pub const PING_PONG: u8 = 0x10;
    pub const DRIVING: u8 = 0x12;
    pub const MAIN_SYSTEM: u8 = 0x13;
    pub const AV_CONTROL: u8 = 0x1A;

    pub const PING: u8 = 0x00;
    pub const LIGHT_SLEEP: u8 = 0x01;
    pub const GET_BATTERY_VOLTAGE: u8 = 0x03;
    pub const WAKE: u8 = 0x0D;
    pub const DRIVE: u8 = 0x07;
    pub const PLAY_ANIMATION: u8 = 0x05;
    pub const SET_LED: u8 = 0x0E;
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollMode {
    Brake = 0,
    Roll = 1,
    Calibrate = 2,
}

/// Sensor streaming request (classic).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamingConfig {
    /// Divisor of the 400 Hz sample rate.
    pub rate_divisor: u16,
    pub frames_per_packet: u16,
    pub mask: u32,
    /// `0` streams until told otherwise.
    pub packet_count: u8,
    /// Second mask word, firmware 1.17 and later.
    pub mask_high: Option<u32>,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            rate_divisor: 10,
            frames_per_packet: 1,
            mask: u32::MAX,
            packet_count: 0,
            mask_high: Some(u32::MAX),
        }
    }
}

/// Everything the application can ask a robot to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ping,
    GetPowerState,
    SetPowerNotify { enabled: bool },
    Sleep { wake_interval_secs: u16, wake_macro: u8, wake_script_line: u16 },
    SetInactiveTimeout { seconds: u16 },
    SetHeading { degrees: u16 },
    SetStabilization { enabled: bool },
    SetRgbLed { red: u8, green: u8, blue: u8, persist: bool },
    SetBackLed { brightness: u8 },
    Roll { speed: u8, heading: u16, mode: RollMode },
    GetLocatorData,
    ConfigureLocator { auto_yaw_correction: bool, x: i16, y: i16, yaw_tare: i16 },
    SetDataStreaming(StreamingConfig),
    Wake,
    GetBatteryVoltage,
    Drive { speed: u8, heading: u16, flags: u8 },
    SetLed { mask: u16, red: u8, green: u8, blue: u8 },
    PlayAnimation { animation: u16 },
}

impl Command {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ping => "Ping",
            Self::GetPowerState => "GetPowerState",
            Self::SetPowerNotify { .. } => "SetPowerNotify",
            Self::Sleep { .. } => "Sleep",
            Self::SetInactiveTimeout { .. } => "SetInactiveTimeout",
            Self::SetHeading { .. } => "SetHeading",
            Self::SetStabilization { .. } => "SetStabilization",
            Self::SetRgbLed { .. } => "SetRgbLed",
            Self::SetBackLed { .. } => "SetBackLed",
            Self::Roll { .. } => "Roll",
            Self::GetLocatorData => "GetLocatorData",
            Self::ConfigureLocator { .. } => "ConfigureLocator",
            Self::SetDataStreaming(_) => "SetDataStreaming",
            Self::Wake => "Wake",
            Self::GetBatteryVoltage => "GetBatteryVoltage",
            Self::Drive { .. } => "Drive",
            Self::SetLed { .. } => "SetLed",
            Self::PlayAnimation { .. } => "PlayAnimation",
        }
    }
}

/// Wire-level description of one command for one device family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub target: u8,
    pub id: u8,
    /// Robot answers with an acknowledgment.
    pub synchronous: bool,
    pub payload: Vec<u8>,
}

impl CommandSpec {
    fn sync(name: &'static str, target: u8, id: u8, payload: Vec<u8>) -> Self {
        Self {
            name,
            target,
            id,
            synchronous: true,
            payload,
        }
    }
}

/// Per-family command lookup.
pub type CommandTable = fn(&Command) -> Option<CommandSpec>;

/// Append big-endian fields.
#[derive(Default)]
struct PayloadWriter(Vec<u8>);

impl PayloadWriter {
    fn u8(mut self, v: u8) -> Self {
        self.0.push(v);
        self
    }

    fn u16(mut self, v: u16) -> Self {
        self.0.extend_from_slice(&v.to_be_bytes());
        self
    }

    fn i16(mut self, v: i16) -> Self {
        self.0.extend_from_slice(&v.to_be_bytes());
        self
    }

    fn u32(mut self, v: u32) -> Self {
        self.0.extend_from_slice(&v.to_be_bytes());
        self
    }

    fn finish(self) -> Vec<u8> {
        self.0
    }
}

fn w() -> PayloadWriter {
    PayloadWriter::default()
}

// ── Classic ──────────────────────────────────────────────────

pub fn classic_command(cmd: &Command) -> Option<CommandSpec> {
    use classic_ids::*;

    let name = cmd.name();
    let spec = match *cmd {
        Command::Ping => CommandSpec::sync(name, CORE, PING, Vec::new()),
        Command::GetPowerState => CommandSpec::sync(name, CORE, GET_POWER_STATE, Vec::new()),
        Command::SetPowerNotify { enabled } => {
            CommandSpec::sync(name, CORE, SET_POWER_NOTIFY, vec![u8::from(enabled)])
        }
        Command::Sleep {
            wake_interval_secs,
            wake_macro,
            wake_script_line,
        } => CommandSpec::sync(
            name,
            CORE,
            SLEEP,
            w().u16(wake_interval_secs)
                .u8(wake_macro)
                .u16(wake_script_line)
                .finish(),
        ),
        Command::SetInactiveTimeout { seconds } => {
            CommandSpec::sync(name, CORE, SET_INACTIVE_TIMEOUT, w().u16(seconds).finish())
        }
        Command::SetHeading { degrees } => {
            CommandSpec::sync(name, SPHERO, SET_HEADING, w().u16(degrees % 360).finish())
        }
        Command::SetStabilization { enabled } => {
            CommandSpec::sync(name, SPHERO, SET_STABILIZATION, vec![u8::from(enabled)])
        }
        Command::SetRgbLed {
            red,
            green,
            blue,
            persist,
        } => CommandSpec::sync(
            name,
            SPHERO,
            SET_RGB_LED,
            vec![red, green, blue, u8::from(persist)],
        ),
        Command::SetBackLed { brightness } => {
            CommandSpec::sync(name, SPHERO, SET_BACK_LED, vec![brightness])
        }
        Command::Roll {
            speed,
            heading,
            mode,
        } => CommandSpec::sync(
            name,
            SPHERO,
            ROLL,
            w().u8(speed).u16(heading % 360).u8(mode as u8).finish(),
        ),
        Command::GetLocatorData => CommandSpec::sync(name, SPHERO, GET_LOCATOR_DATA, Vec::new()),
        Command::ConfigureLocator {
            auto_yaw_correction,
            x,
            y,
            yaw_tare,
        } => CommandSpec::sync(
            name,
            SPHERO,
            CONFIGURE_LOCATOR,
            w().u8(u8::from(auto_yaw_correction))
                .i16(x)
                .i16(y)
                .i16(yaw_tare)
                .finish(),
        ),
        Command::SetDataStreaming(cfg) => {
            let mut payload = w()
                .u16(cfg.rate_divisor)
                .u16(cfg.frames_per_packet)
                .u32(cfg.mask)
                .u8(cfg.packet_count);
            if let Some(high) = cfg.mask_high {
                payload = payload.u32(high);
            }
            // Streaming is fire-and-forget; samples arrive as notifications.
            CommandSpec {
                name,
                target: SPHERO,
                id: SET_DATA_STREAMING,
                synchronous: false,
                payload: payload.finish(),
            }
        }
        Command::Wake
        | Command::GetBatteryVoltage
        | Command::Drive { .. }
        | Command::SetLed { .. }
        | Command::PlayAnimation { .. } => return None,
    };
    Some(spec)
}

// ── V2 ───────────────────────────────────────────────────────

pub fn v2_command(cmd: &Command) -> Option<CommandSpec> {
    use v2_ids::*;

    let name = cmd.name();
    let spec = match *cmd {
        Command::Ping => CommandSpec::sync(name, PING_PONG, PING, Vec::new()),
        // Light sleep takes no wake schedule.
        Command::Sleep {
            wake_interval_secs: 0,
            wake_macro: 0,
            wake_script_line: 0,
        } => CommandSpec::sync(name, MAIN_SYSTEM, LIGHT_SLEEP, Vec::new()),
        Command::Sleep { .. } => return None,
        Command::Wake => CommandSpec::sync(name, MAIN_SYSTEM, WAKE, Vec::new()),
        Command::GetBatteryVoltage => {
            CommandSpec::sync(name, MAIN_SYSTEM, GET_BATTERY_VOLTAGE, Vec::new())
        }
        Command::Drive {
            speed,
            heading,
            flags,
        } => CommandSpec::sync(
            name,
            DRIVING,
            DRIVE,
            w().u8(speed).u16(heading % 360).u8(flags).finish(),
        ),
        Command::SetLed {
            mask,
            red,
            green,
            blue,
        } => CommandSpec::sync(
            name,
            AV_CONTROL,
            SET_LED,
            // Trailing 0xFF pads the colour to a 32-bit word.
            w().u16(mask).u8(red).u8(green).u8(blue).u8(0xFF).finish(),
        ),
        Command::PlayAnimation { animation } => {
            CommandSpec::sync(name, AV_CONTROL, PLAY_ANIMATION, w().u16(animation).finish())
        }
        Command::GetPowerState
        | Command::SetPowerNotify { .. }
        | Command::SetInactiveTimeout { .. }
        | Command::SetHeading { .. }
        | Command::SetStabilization { .. }
        | Command::SetRgbLed { .. }
        | Command::SetBackLed { .. }
        | Command::Roll { .. }
        | Command::GetLocatorData
        | Command::ConfigureLocator { .. }
        | Command::SetDataStreaming(_) => return None,
    };
    Some(spec)
}
