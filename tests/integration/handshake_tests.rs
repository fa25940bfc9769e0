//! Integration tests for the connect → handshake → ready lifecycle.
//!
//! Drives `ConnectionStateMachine` through a recording mock transport and
//! checks the exact write sequence each device family sees.

use crate::mock_transport::{Rig, Trace, TransportCall, services_for};

use spherolink::app::ports::{CharacteristicRef, GattService, TransportEvent};
use spherolink::error::{FailureReason, TransportError};
use spherolink::protocol::variant::{classic_uuids, v2_uuids};
use spherolink::{ConnectionState, EngineConfig, ProtocolEvent, SPHERO_CLASSIC, SPHERO_V2};

fn radio(characteristic: u128) -> CharacteristicRef {
    CharacteristicRef {
        service: classic_uuids::RADIO_SERVICE,
        characteristic,
    }
}

// ── Happy path ────────────────────────────────────────────────

#[test]
fn classic_handshake_writes_steps_in_order() {
    let mut rig = Rig::new(&SPHERO_CLASSIC);
    rig.drive_to_ready();

    let calls = &rig.transport.calls;
    assert_eq!(calls[0], TransportCall::Connect);
    assert_eq!(calls[1], TransportCall::DiscoverServices);
    assert_eq!(
        calls[2],
        TransportCall::Write {
            target: radio(classic_uuids::ANTI_DOS),
            data: b"011i3".to_vec(),
        }
    );
    assert_eq!(
        calls[3],
        TransportCall::Write {
            target: radio(classic_uuids::TX_POWER),
            data: vec![0x07],
        }
    );
    assert_eq!(
        calls[4],
        TransportCall::Write {
            target: radio(classic_uuids::WAKE),
            data: vec![0x01],
        }
    );
    assert_eq!(
        calls[5],
        TransportCall::WriteDescriptor {
            target: CharacteristicRef {
                service: classic_uuids::CONTROL_SERVICE,
                characteristic: classic_uuids::RESPONSES,
            },
            data: vec![0x01, 0x00],
        }
    );

    // Baseline locator query, sequence 0, synchronous with reset-timeout.
    let TransportCall::Write { target, data } = &calls[6] else {
        panic!("expected baseline query, got {:?}", calls[6]);
    };
    assert_eq!(target.characteristic, classic_uuids::COMMANDS);
    assert_eq!(data[..6], [0xFF, 0xFF, 0x02, 0x15, 0x00, 0x01]);
    assert_eq!(calls.len(), 7);

    assert_eq!(
        rig.sink.states(),
        vec![
            ConnectionState::Connecting,
            ConnectionState::DiscoveringControlService,
            ConnectionState::RunningHandshake,
            ConnectionState::SubscribingNotifications,
            ConnectionState::Ready,
        ]
    );
}

#[test]
fn v2_handshake_uses_dfu_service_and_api_characteristic() {
    let mut rig = Rig::new(&SPHERO_V2);
    rig.drive_to_ready();

    let writes = rig.transport.writes();
    assert_eq!(
        writes[0],
        (
            CharacteristicRef {
                service: v2_uuids::DFU_SERVICE,
                characteristic: v2_uuids::ANTI_DOS,
            },
            b"usetheforce...band".to_vec(),
        )
    );
    // Baseline battery query goes out escaped on the API characteristic.
    let (target, data) = &writes[1];
    assert_eq!(target.characteristic, v2_uuids::API);
    assert_eq!(data.first(), Some(&0x8D));
    assert_eq!(data.last(), Some(&0xD8));
}

#[test]
fn baseline_query_precedes_ready_event() {
    let mut rig = Rig::new(&SPHERO_CLASSIC);
    rig.drive_to_ready();

    let timeline = rig.sink.timeline.borrow();
    let query = timeline
        .iter()
        .position(|t| {
            matches!(t, Trace::Call(TransportCall::Write { target, .. })
                if target.characteristic == classic_uuids::COMMANDS)
        })
        .expect("baseline query written");
    let ready = timeline
        .iter()
        .position(|t| {
            *t == Trace::Event(ProtocolEvent::StateChanged {
                from: ConnectionState::SubscribingNotifications,
                to: ConnectionState::Ready,
            })
        })
        .expect("ready announced");
    assert!(query < ready);
}

#[test]
fn baseline_query_can_be_disabled() {
    let config = EngineConfig {
        baseline_query: false,
        ..EngineConfig::default()
    };
    let mut rig = Rig::with_config(&SPHERO_CLASSIC, config);
    rig.drive_to_ready();
    assert!(
        rig.transport
            .writes()
            .iter()
            .all(|(t, _)| t.characteristic != classic_uuids::COMMANDS)
    );
}

#[test]
fn next_step_waits_for_confirmation() {
    let mut rig = Rig::new(&SPHERO_CLASSIC);
    rig.connect();
    rig.event(TransportEvent::Connected);
    rig.event(TransportEvent::ServicesDiscovered(services_for(&SPHERO_CLASSIC)));
    assert_eq!(rig.transport.writes().len(), 1);

    // Unrelated confirmations and notifications do not advance.
    rig.event(TransportEvent::CharacteristicWritten {
        characteristic: classic_uuids::WAKE,
    });
    rig.notify(&[0xFF, 0xFF, 0x00, 0x00, 0x01, 0xFE]);
    assert_eq!(rig.transport.writes().len(), 1);
    assert_eq!(rig.machine.state(), ConnectionState::RunningHandshake);
    assert!(rig.sink.responses().is_empty());
}

// ── Failure paths ─────────────────────────────────────────────

#[test]
fn refused_step_reports_index_and_disconnects() {
    let mut rig = Rig::new(&SPHERO_CLASSIC);
    rig.connect();
    rig.event(TransportEvent::Connected);
    rig.event(TransportEvent::ServicesDiscovered(services_for(&SPHERO_CLASSIC)));
    rig.event(TransportEvent::CharacteristicWritten {
        characteristic: classic_uuids::ANTI_DOS,
    });
    rig.event(TransportEvent::CharacteristicWritten {
        characteristic: classic_uuids::TX_POWER,
    });
    rig.event(TransportEvent::WriteFailed {
        characteristic: classic_uuids::WAKE,
        error: TransportError::Io(3),
    });

    assert_eq!(rig.machine.state(), ConnectionState::Failed);
    assert!(rig.machine.session().is_none());
    assert_eq!(
        rig.sink.disconnects(),
        vec![&ProtocolEvent::Disconnected {
            reason: FailureReason::HandshakeStepFailed { step: 2 },
        }]
    );
    assert_eq!(rig.transport.disconnects(), 1);
}

#[test]
fn synchronously_refused_step_fails_the_same_way() {
    let mut rig = Rig::new(&SPHERO_CLASSIC);
    rig.transport.refuse_writes_to = Some(classic_uuids::TX_POWER);
    rig.connect();
    rig.event(TransportEvent::Connected);
    rig.event(TransportEvent::ServicesDiscovered(services_for(&SPHERO_CLASSIC)));
    rig.event(TransportEvent::CharacteristicWritten {
        characteristic: classic_uuids::ANTI_DOS,
    });
    assert_eq!(rig.machine.state(), ConnectionState::Failed);
    assert_eq!(
        rig.sink.disconnects(),
        vec![&ProtocolEvent::Disconnected {
            reason: FailureReason::HandshakeStepFailed { step: 1 },
        }]
    );
}

#[test]
fn subscription_failure_fails_session() {
    let mut rig = Rig::new(&SPHERO_V2);
    rig.connect();
    rig.event(TransportEvent::Connected);
    rig.event(TransportEvent::ServicesDiscovered(services_for(&SPHERO_V2)));
    rig.event(TransportEvent::CharacteristicWritten {
        characteristic: v2_uuids::ANTI_DOS,
    });
    rig.event(TransportEvent::WriteFailed {
        characteristic: v2_uuids::API,
        error: TransportError::Refused,
    });
    assert_eq!(rig.machine.state(), ConnectionState::Failed);
    assert_eq!(
        rig.sink.disconnects(),
        vec![&ProtocolEvent::Disconnected {
            reason: FailureReason::SubscriptionFailed,
        }]
    );
}

#[test]
fn missing_control_service_is_reported() {
    let mut rig = Rig::new(&SPHERO_CLASSIC);
    rig.connect();
    rig.event(TransportEvent::Connected);
    rig.event(TransportEvent::ServicesDiscovered(vec![GattService {
        uuid: classic_uuids::RADIO_SERVICE,
        characteristics: vec![
            classic_uuids::ANTI_DOS,
            classic_uuids::TX_POWER,
            classic_uuids::WAKE,
        ],
    }]));
    assert_eq!(
        rig.sink.disconnects(),
        vec![&ProtocolEvent::Disconnected {
            reason: FailureReason::MissingService(classic_uuids::CONTROL_SERVICE),
        }]
    );
    assert!(rig.transport.writes().is_empty());
}

#[test]
fn missing_response_characteristic_is_reported() {
    let mut rig = Rig::new(&SPHERO_CLASSIC);
    let mut services = services_for(&SPHERO_CLASSIC);
    for s in &mut services {
        s.characteristics.retain(|c| *c != classic_uuids::RESPONSES);
    }
    rig.connect();
    rig.event(TransportEvent::Connected);
    rig.event(TransportEvent::ServicesDiscovered(services));
    assert_eq!(
        rig.sink.disconnects(),
        vec![&ProtocolEvent::Disconnected {
            reason: FailureReason::MissingCharacteristic(classic_uuids::RESPONSES),
        }]
    );
}

#[test]
fn link_loss_mid_handshake_clears_session() {
    let mut rig = Rig::new(&SPHERO_CLASSIC);
    rig.connect();
    rig.event(TransportEvent::Connected);
    rig.event(TransportEvent::ServicesDiscovered(services_for(&SPHERO_CLASSIC)));
    assert!(rig.machine.session().is_some());

    rig.event(TransportEvent::Disconnected);
    assert_eq!(rig.machine.state(), ConnectionState::Failed);
    assert!(rig.machine.session().is_none());
    assert_eq!(
        rig.sink.disconnects(),
        vec![&ProtocolEvent::Disconnected {
            reason: FailureReason::TransportDisconnected,
        }]
    );
    // The link is already gone.
    assert_eq!(rig.transport.disconnects(), 0);

    // Late callbacks are ignored; no second disconnect event.
    rig.event(TransportEvent::Disconnected);
    rig.event(TransportEvent::CharacteristicWritten {
        characteristic: classic_uuids::ANTI_DOS,
    });
    assert_eq!(rig.sink.disconnects().len(), 1);
    assert_eq!(rig.machine.state(), ConnectionState::Failed);
}

#[test]
fn refused_connect_fails_immediately() {
    let mut rig = Rig::new(&SPHERO_V2);
    rig.transport.refuse_connect = true;
    rig.connect();
    assert_eq!(rig.machine.state(), ConnectionState::Failed);
    assert_eq!(
        rig.sink.disconnects(),
        vec![&ProtocolEvent::Disconnected {
            reason: FailureReason::Transport(TransportError::Io(-5)),
        }]
    );
}

#[test]
fn ready_session_survives_until_service_error() {
    let mut rig = Rig::new(&SPHERO_V2);
    rig.drive_to_ready();
    rig.event(TransportEvent::Error(19));
    assert_eq!(rig.machine.state(), ConnectionState::Failed);
    assert_eq!(
        rig.sink.disconnects(),
        vec![&ProtocolEvent::Disconnected {
            reason: FailureReason::TransportError(19),
        }]
    );
    assert_eq!(rig.transport.disconnects(), 1);
}

// ── Reconnect and teardown ────────────────────────────────────

#[test]
fn reconnect_after_failure_starts_fresh_session() {
    let mut rig = Rig::new(&SPHERO_CLASSIC);
    rig.drive_to_ready();
    let first_seq = rig
        .machine
        .send(&spherolink::Command::Ping, &mut rig.transport)
        .unwrap();
    assert_eq!(first_seq, 1);

    rig.event(TransportEvent::Disconnected);
    assert_eq!(rig.machine.state(), ConnectionState::Failed);

    rig.drive_to_ready();
    // The baseline query took sequence 0 again.
    assert_eq!(rig.machine.session().map(|s| s.next_sequence()), Some(1));
}

#[test]
fn application_disconnect_returns_to_idle() {
    let mut rig = Rig::new(&SPHERO_CLASSIC);
    rig.drive_to_ready();
    rig.sink.clear();

    rig.disconnect();
    assert_eq!(rig.machine.state(), ConnectionState::Disconnected);
    assert_eq!(rig.transport.calls.last(), Some(&TransportCall::Disconnect));
    assert!(rig.machine.session().is_none());
    assert_eq!(
        rig.sink.events,
        vec![ProtocolEvent::StateChanged {
            from: ConnectionState::Ready,
            to: ConnectionState::Disconnected,
        }]
    );

    // Disconnecting again is a no-op.
    rig.disconnect();
    assert_eq!(rig.transport.disconnects(), 1);
}
