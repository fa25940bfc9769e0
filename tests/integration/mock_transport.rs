//! Mock GATT adapter for integration tests.
//!
//! Records every transport call so tests can assert on the full write
//! history without a radio.  A shared timeline interleaves transport calls
//! with emitted events to check their relative order.

use std::cell::RefCell;
use std::rc::Rc;

use spherolink::app::ports::{CharacteristicRef, EventSink, GattService, GattTransport, TransportEvent};
use spherolink::error::TransportError;
use spherolink::protocol::codec::checksum;
use spherolink::protocol::variant::ProtocolVariant;
use spherolink::{ConnectionState, ConnectionStateMachine, ProtocolEvent};

// ── Call record ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Connect,
    DiscoverServices,
    Write { target: CharacteristicRef, data: Vec<u8> },
    WriteDescriptor { target: CharacteristicRef, data: Vec<u8> },
    Disconnect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trace {
    Call(TransportCall),
    Event(ProtocolEvent),
}

pub type Timeline = Rc<RefCell<Vec<Trace>>>;

// ── MockTransport ─────────────────────────────────────────────

#[derive(Default)]
pub struct MockTransport {
    pub calls: Vec<TransportCall>,
    /// Characteristic whose writes are refused synchronously.
    pub refuse_writes_to: Option<u128>,
    pub refuse_connect: bool,
    pub timeline: Timeline,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<(CharacteristicRef, Vec<u8>)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                TransportCall::Write { target, data } => Some((*target, data.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn last_write(&self) -> Option<(CharacteristicRef, Vec<u8>)> {
        self.writes().pop()
    }

    pub fn disconnects(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| **c == TransportCall::Disconnect)
            .count()
    }

    fn record(&mut self, call: TransportCall) {
        self.timeline.borrow_mut().push(Trace::Call(call.clone()));
        self.calls.push(call);
    }
}

impl GattTransport for MockTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        if self.refuse_connect {
            return Err(TransportError::Io(-5));
        }
        self.record(TransportCall::Connect);
        Ok(())
    }

    fn discover_services(&mut self) -> Result<(), TransportError> {
        self.record(TransportCall::DiscoverServices);
        Ok(())
    }

    fn write_characteristic(
        &mut self,
        target: CharacteristicRef,
        data: &[u8],
    ) -> Result<(), TransportError> {
        if self.refuse_writes_to == Some(target.characteristic) {
            return Err(TransportError::Refused);
        }
        self.record(TransportCall::Write {
            target,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn write_descriptor(
        &mut self,
        target: CharacteristicRef,
        data: &[u8],
    ) -> Result<(), TransportError> {
        self.record(TransportCall::WriteDescriptor {
            target,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        self.record(TransportCall::Disconnect);
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<ProtocolEvent>,
    pub timeline: Timeline,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn responses(&self) -> Vec<&spherolink::Response> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ProtocolEvent::Response(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn frame_errors(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, ProtocolEvent::FrameError(_)))
            .count()
    }

    pub fn disconnects(&self) -> Vec<&ProtocolEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e, ProtocolEvent::Disconnected { .. }))
            .collect()
    }

    pub fn states(&self) -> Vec<ConnectionState> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ProtocolEvent::StateChanged { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &ProtocolEvent) {
        self.timeline.borrow_mut().push(Trace::Event(event.clone()));
        self.events.push(event.clone());
    }
}

// ── Fixtures ──────────────────────────────────────────────────

/// Everything discovery would report for a healthy robot of `variant`.
pub fn services_for(variant: &ProtocolVariant) -> Vec<GattService> {
    let mut services: Vec<GattService> = Vec::new();
    let mut add = |service: u128, characteristic: u128| {
        match services.iter_mut().find(|s| s.uuid == service) {
            Some(s) if !s.characteristics.contains(&characteristic) => {
                s.characteristics.push(characteristic);
            }
            Some(_) => {}
            None => services.push(GattService {
                uuid: service,
                characteristics: vec![characteristic],
            }),
        }
    };
    for step in variant.handshake {
        add(step.service, step.characteristic);
    }
    add(variant.control_service, variant.command_characteristic);
    add(variant.control_service, variant.response_characteristic);
    services
}

pub struct Rig {
    pub machine: ConnectionStateMachine,
    pub transport: MockTransport,
    pub sink: RecordingSink,
}

#[allow(dead_code)]
impl Rig {
    pub fn new(variant: &'static ProtocolVariant) -> Self {
        let timeline = Timeline::default();
        Self {
            machine: ConnectionStateMachine::new(variant, spherolink::EngineConfig::default()),
            transport: MockTransport {
                timeline: timeline.clone(),
                ..MockTransport::default()
            },
            sink: RecordingSink {
                timeline,
                ..RecordingSink::default()
            },
        }
    }

    pub fn with_config(variant: &'static ProtocolVariant, config: spherolink::EngineConfig) -> Self {
        let mut rig = Self::new(variant);
        rig.machine = ConnectionStateMachine::new(variant, config);
        rig
    }

    pub fn event(&mut self, event: TransportEvent) {
        self.machine
            .handle_event(event, &mut self.transport, &mut self.sink);
    }

    pub fn connect(&mut self) {
        self.machine.connect(&mut self.transport, &mut self.sink);
    }

    pub fn disconnect(&mut self) {
        self.machine.disconnect(&mut self.transport, &mut self.sink);
    }

    /// Run the whole handshake, confirming every write as the robot would.
    pub fn drive_to_ready(&mut self) {
        let variant = self.machine.variant();
        self.connect();
        self.event(TransportEvent::Connected);
        self.event(TransportEvent::ServicesDiscovered(services_for(variant)));
        for step in variant.handshake {
            self.event(TransportEvent::CharacteristicWritten {
                characteristic: step.characteristic,
            });
        }
        self.event(TransportEvent::DescriptorWritten {
            characteristic: variant.response_characteristic,
        });
        assert_eq!(self.machine.state(), ConnectionState::Ready);
    }

    pub fn notify(&mut self, data: &[u8]) {
        let characteristic = self.machine.variant().response_characteristic;
        self.event(TransportEvent::Notification {
            characteristic,
            data: data.to_vec(),
        });
    }
}

// ── Classic frame builders ────────────────────────────────────

/// `FF FF status seq dlen data chk`
#[allow(dead_code)]
pub fn classic_ack(status: u8, seq: u8, data: &[u8]) -> Vec<u8> {
    let mut f = vec![0xFF, 0xFF, status, seq, data.len() as u8 + 1];
    f.extend_from_slice(data);
    f.push(checksum(&f[2..]));
    f
}

/// `FF FE id dlen_hi dlen_lo data chk`
#[allow(dead_code)]
pub fn classic_async(id: u8, data: &[u8]) -> Vec<u8> {
    let len = (data.len() + 1) as u16;
    let mut f = vec![0xFF, 0xFE, id];
    f.extend_from_slice(&len.to_be_bytes());
    f.extend_from_slice(data);
    f.push(checksum(&f[2..]));
    f
}
