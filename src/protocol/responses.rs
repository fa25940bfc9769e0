//! Typed responses and their payload decoders.
//!
//! Every record is read field by field in big-endian order through a
//! bounds-checked [`ByteReader`]; the payload length is checked against
//! the record size before any field is touched.  Values keep the robot's
//! raw fixed-point scale.

use crate::error::PayloadError;

use super::registry::ResponseKey;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Battery charge state reported by classic robots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeState {
    Charging,
    Ok,
    Low,
    Critical,
    Unknown(u8),
}

impl From<u8> for ChargeState {
    fn from(raw: u8) -> Self {
        match raw {
            0x01 => Self::Charging,
            0x02 => Self::Ok,
            0x03 => Self::Low,
            0x04 => Self::Critical,
            other => Self::Unknown(other),
        }
    }
}

/// Answer to GetPowerState (8 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerStatus {
    pub record_version: u8,
    pub state: ChargeState,
    /// Hundredths of a volt.
    pub battery_voltage: u16,
    pub charge_count: u16,
    pub seconds_since_charge: u16,
}

impl PowerStatus {
    pub const WIRE_LEN: usize = 8;
}

/// Answer to GetLocatorData (7 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatorRecord {
    pub calibrated: bool,
    pub x: i16,
    pub y: i16,
    pub tilt: i16,
}

impl LocatorRecord {
    pub const WIRE_LEN: usize = 7;
    const FLAG_CALIBRATED: u8 = 0x01;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Axis3 {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Attitude {
    pub pitch: i16,
    pub roll: i16,
    pub yaw: i16,
}

/// Left/right motor pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotorPair {
    pub left: i16,
    pub right: i16,
}

/// One sample of the periodic sensor stream (82-byte payload).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorStreamRecord {
    pub accel_raw: Axis3,
    pub gyro_raw: Axis3,
    pub back_emf_raw: MotorPair,
    pub pwm_raw: MotorPair,
    pub attitude: Attitude,
    pub accelerometer: Axis3,
    pub gyroscope: Axis3,
    pub back_emf: MotorPair,
    /// q0..q3
    pub quaternion: [i16; 4],
    pub odometer_x: i16,
    pub odometer_y: i16,
    pub acceleration: i16,
    pub velocity_x: i16,
    pub velocity_y: i16,
}

impl SensorStreamRecord {
    pub const WIRE_LEN: usize = 82;
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Power(PowerStatus),
    PowerNotification(ChargeState),
    /// Battery voltage in hundredths of a volt (v2 robots).
    BatteryVoltage(u16),
    Locator(LocatorRecord),
    SensorStream(SensorStreamRecord),
    /// Last value read from the radio's RSSI characteristic.
    SignalStrength(i8),
    /// Successful acknowledgment with no typed payload.
    Ack {
        key: ResponseKey,
        name: &'static str,
        sequence: Option<u8>,
        payload: Vec<u8>,
    },
    /// Acknowledgment with a non-zero status code.
    AckError {
        key: Option<ResponseKey>,
        sequence: Option<u8>,
        status: u8,
    },
    /// Known notification with no typed payload.
    Notification {
        key: ResponseKey,
        name: &'static str,
        payload: Vec<u8>,
    },
    /// Several registry entries claim this key.
    Ambiguous {
        key: ResponseKey,
        candidates: Vec<&'static str>,
        payload: Vec<u8>,
    },
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Big-endian cursor that fails instead of reading past the end.
pub(crate) struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Check the whole payload against a fixed record size.
    pub(crate) fn exact(buf: &'a [u8], expected: usize) -> Result<Self, PayloadError> {
        if buf.len() == expected {
            Ok(Self::new(buf))
        } else {
            Err(PayloadError::UnexpectedLength {
                expected,
                actual: buf.len(),
            })
        }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], PayloadError> {
        let end = self.pos + N;
        let bytes = self.buf.get(self.pos..end).ok_or(PayloadError::Truncated {
            offset: self.pos,
            wanted: N,
        })?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        self.pos = end;
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, PayloadError> {
        self.take::<1>().map(|[b]| b)
    }

    pub(crate) fn u16(&mut self) -> Result<u16, PayloadError> {
        self.take::<2>().map(u16::from_be_bytes)
    }

    pub(crate) fn i16(&mut self) -> Result<i16, PayloadError> {
        self.take::<2>().map(i16::from_be_bytes)
    }

    pub(crate) fn skip(&mut self, n: usize) -> Result<(), PayloadError> {
        if self.pos + n > self.buf.len() {
            return Err(PayloadError::Truncated {
                offset: self.pos,
                wanted: n,
            });
        }
        self.pos += n;
        Ok(())
    }

    fn axis3(&mut self) -> Result<Axis3, PayloadError> {
        Ok(Axis3 {
            x: self.i16()?,
            y: self.i16()?,
            z: self.i16()?,
        })
    }

    fn motors(&mut self) -> Result<MotorPair, PayloadError> {
        Ok(MotorPair {
            left: self.i16()?,
            right: self.i16()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Decoders
// ---------------------------------------------------------------------------

pub fn power_state(payload: &[u8]) -> Result<Response, PayloadError> {
    let mut r = ByteReader::exact(payload, PowerStatus::WIRE_LEN)?;
    Ok(Response::Power(PowerStatus {
        record_version: r.u8()?,
        state: ChargeState::from(r.u8()?),
        battery_voltage: r.u16()?,
        charge_count: r.u16()?,
        seconds_since_charge: r.u16()?,
    }))
}

pub fn power_notification(payload: &[u8]) -> Result<Response, PayloadError> {
    let mut r = ByteReader::exact(payload, 1)?;
    Ok(Response::PowerNotification(ChargeState::from(r.u8()?)))
}

pub fn battery_voltage(payload: &[u8]) -> Result<Response, PayloadError> {
    let mut r = ByteReader::exact(payload, 2)?;
    Ok(Response::BatteryVoltage(r.u16()?))
}

pub fn locator(payload: &[u8]) -> Result<Response, PayloadError> {
    let mut r = ByteReader::exact(payload, LocatorRecord::WIRE_LEN)?;
    let flags = r.u8()?;
    Ok(Response::Locator(LocatorRecord {
        calibrated: flags & LocatorRecord::FLAG_CALIBRATED != 0,
        x: r.i16()?,
        y: r.i16()?,
        tilt: r.i16()?,
    }))
}

pub fn sensor_stream(payload: &[u8]) -> Result<Response, PayloadError> {
    let mut r = ByteReader::exact(payload, SensorStreamRecord::WIRE_LEN)?;
    let accel_raw = r.axis3()?;
    let gyro_raw = r.axis3()?;
    r.skip(6)?;
    let back_emf_raw = r.motors()?;
    let pwm_raw = r.motors()?;
    let attitude = Attitude {
        pitch: r.i16()?,
        roll: r.i16()?,
        yaw: r.i16()?,
    };
    let accelerometer = r.axis3()?;
    let gyroscope = r.axis3()?;
    r.skip(6)?;
    let back_emf = r.motors()?;
    r.skip(10)?;
    let quaternion = [r.i16()?, r.i16()?, r.i16()?, r.i16()?];
    Ok(Response::SensorStream(SensorStreamRecord {
        accel_raw,
        gyro_raw,
        back_emf_raw,
        pwm_raw,
        attitude,
        accelerometer,
        gyroscope,
        back_emf,
        quaternion,
        odometer_x: r.i16()?,
        odometer_y: r.i16()?,
        acceleration: r.i16()?,
        velocity_x: r.i16()?,
        velocity_y: r.i16()?,
    }))
}
