//! Integration tests for the Ready-state data path: commands out,
//! notification chunks in, typed events to the application.

use crate::mock_transport::{Rig, classic_ack, classic_async};

use spherolink::app::ports::TransportEvent;
use spherolink::error::{FrameError, SessionError, TransportError};
use spherolink::protocol::codec::PacketCodec;
use spherolink::protocol::commands::{RollMode, StreamingConfig};
use spherolink::protocol::frame::{Frame, PacketFlags};
use spherolink::protocol::registry::ResponseKey;
use spherolink::protocol::responses::{ChargeState, LocatorRecord, SensorStreamRecord};
use spherolink::protocol::variant::{classic_uuids, v2_uuids};
use spherolink::{Command, ConnectionState, ProtocolEvent, Response, SPHERO_CLASSIC, SPHERO_V2};

fn ready_classic() -> Rig {
    let mut rig = Rig::new(&SPHERO_CLASSIC);
    rig.drive_to_ready();
    rig.sink.clear();
    rig
}

fn sensor_payload() -> Vec<u8> {
    (0..41i16).flat_map(i16::to_be_bytes).collect()
}

// ── Baseline and acknowledgments ─────────────────────────────

#[test]
fn baseline_locator_answer_is_first_response() {
    let mut rig = ready_classic();
    rig.notify(&classic_ack(0x00, 0, &[0x00, 0x00, 0x0A, 0x00, 0x14, 0xFF, 0xFF]));
    assert_eq!(
        rig.sink.events,
        vec![ProtocolEvent::Response(Response::Locator(LocatorRecord {
            calibrated: false,
            x: 10,
            y: 20,
            tilt: -1,
        }))]
    );
}

#[test]
fn fragmented_acknowledgment_is_decoded_once() {
    let mut rig = ready_classic();
    let frame = classic_ack(0x00, 0, &[0x01, 0x00, 0x01, 0x00, 0x02, 0x00, 0x03]);
    for byte in &frame {
        rig.notify(&[*byte]);
    }
    assert_eq!(rig.sink.responses().len(), 1);
    assert!(matches!(rig.sink.responses()[0], Response::Locator(l) if l.calibrated));
}

#[test]
fn sent_command_acknowledgment_is_named() {
    let mut rig = ready_classic();
    let seq = rig
        .machine
        .send(
            &Command::Roll {
                speed: 0x80,
                heading: 450,
                mode: RollMode::Roll,
            },
            &mut rig.transport,
        )
        .unwrap();
    assert_eq!(seq, 1);

    let (target, bytes) = rig.transport.last_write().unwrap();
    assert_eq!(target.characteristic, classic_uuids::COMMANDS);
    assert_eq!(bytes[2..10], [0x02, 0x30, 0x01, 0x05, 0x80, 0x00, 0x5A, 0x01]);

    rig.notify(&classic_ack(0x00, seq, &[]));
    match rig.sink.responses().as_slice() {
        [Response::Ack { name, sequence, .. }] => {
            assert_eq!(*name, "roll");
            assert_eq!(*sequence, Some(1));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn error_status_is_surfaced() {
    let mut rig = ready_classic();
    let seq = rig.machine.send(&Command::GetPowerState, &mut rig.transport).unwrap();
    rig.notify(&classic_ack(0x03, seq, &[]));
    assert_eq!(
        rig.sink.events,
        vec![ProtocolEvent::Response(Response::AckError {
            key: Some(ResponseKey::ack(0x00, 0x20)),
            sequence: Some(seq),
            status: 0x03,
        })]
    );
}

#[test]
fn conflicting_id_is_reported_as_ambiguous() {
    let mut rig = ready_classic();
    let seq = rig
        .machine
        .send(&Command::SetInactiveTimeout { seconds: 300 }, &mut rig.transport)
        .unwrap();
    rig.notify(&classic_ack(0x00, seq, &[]));
    assert!(matches!(
        rig.sink.responses().as_slice(),
        [Response::Ambiguous { candidates, .. }] if candidates.len() == 2
    ));
}

// ── Notifications ─────────────────────────────────────────────

#[test]
fn sensor_stream_split_across_chunks() {
    let mut rig = ready_classic();
    rig.machine
        .send(&Command::SetDataStreaming(StreamingConfig::default()), &mut rig.transport)
        .unwrap();

    let frame = classic_async(0x03, &sensor_payload());
    rig.notify(&frame[..20]);
    rig.notify(&frame[20..40]);
    assert!(rig.sink.events.is_empty());
    rig.notify(&frame[40..]);

    let responses = rig.sink.responses();
    let [Response::SensorStream(SensorStreamRecord { attitude, quaternion, .. })] =
        responses.as_slice()
    else {
        panic!("expected one sensor sample, got {:?}", rig.sink.events);
    };
    assert_eq!((attitude.pitch, attitude.roll, attitude.yaw), (13, 14, 15));
    assert_eq!(*quaternion, [32, 33, 34, 35]);
}

#[test]
fn several_frames_in_one_chunk_keep_order() {
    let mut rig = ready_classic();
    let mut chunk = classic_async(0x01, &[0x02]);
    chunk.extend(classic_async(0x01, &[0x04]));
    rig.notify(&chunk);
    assert_eq!(
        rig.sink.events,
        vec![
            ProtocolEvent::Response(Response::PowerNotification(ChargeState::Ok)),
            ProtocolEvent::Response(Response::PowerNotification(ChargeState::Critical)),
        ]
    );
}

#[test]
fn corrupt_frame_is_skipped_and_session_continues() {
    let mut rig = ready_classic();
    let mut bad = classic_async(0x01, &[0x02]);
    bad[5] ^= 0x40;
    rig.notify(&bad);
    rig.notify(&classic_async(0x01, &[0x03]));

    assert_eq!(rig.sink.frame_errors(), 1);
    assert_eq!(
        rig.sink.events.last(),
        Some(&ProtocolEvent::Response(Response::PowerNotification(ChargeState::Low)))
    );
    assert_eq!(rig.machine.state(), ConnectionState::Ready);
}

#[test]
fn unknown_notification_is_a_frame_error() {
    let mut rig = ready_classic();
    rig.notify(&classic_async(0x0E, &[1, 2, 3]));
    assert_eq!(
        rig.sink.events,
        vec![ProtocolEvent::FrameError(FrameError::UnknownResponseType(
            ResponseKey::notification(0, 0x0E)
        ))]
    );
}

#[test]
fn prompt_artifact_before_frame_is_ignored() {
    let mut rig = ready_classic();
    let mut chunk = b"\r\n>".to_vec();
    chunk.extend(classic_async(0x01, &[0x01]));
    rig.notify(&chunk);
    assert_eq!(
        rig.sink.events,
        vec![ProtocolEvent::Response(Response::PowerNotification(ChargeState::Charging))]
    );
}

#[test]
fn signal_strength_notification() {
    let mut rig = ready_classic();
    rig.event(TransportEvent::Notification {
        characteristic: classic_uuids::RSSI,
        data: vec![0xC4],
    });
    assert_eq!(
        rig.sink.events,
        vec![ProtocolEvent::Response(Response::SignalStrength(-60))]
    );
}

#[test]
fn events_reach_a_channel() {
    use std::sync::mpsc;

    let mut rig = ready_classic();
    let (mut tx, rx) = mpsc::channel();
    rig.machine.handle_event(
        TransportEvent::Notification {
            characteristic: classic_uuids::RESPONSES,
            data: classic_async(0x01, &[0x02]),
        },
        &mut rig.transport,
        &mut tx,
    );
    assert_eq!(
        rx.try_recv(),
        Ok(ProtocolEvent::Response(Response::PowerNotification(ChargeState::Ok)))
    );
}

// ── Sending ───────────────────────────────────────────────────

#[test]
fn unsupported_command_is_rejected_without_writing() {
    let mut rig = ready_classic();
    let before = rig.transport.calls.len();
    assert!(matches!(
        rig.machine.send(&Command::Wake, &mut rig.transport),
        Err(SessionError::Encode(_))
    ));
    assert_eq!(rig.transport.calls.len(), before);
}

#[test]
fn refused_command_write_keeps_session_ready() {
    let mut rig = ready_classic();
    rig.transport.refuse_writes_to = Some(classic_uuids::COMMANDS);
    assert_eq!(
        rig.machine.send(&Command::Ping, &mut rig.transport),
        Err(SessionError::Transport(TransportError::Refused))
    );
    assert_eq!(rig.machine.state(), ConnectionState::Ready);
}

#[test]
fn raw_command_uses_next_sequence() {
    let mut rig = ready_classic();
    let seq = rig
        .machine
        .send_raw(0x02, 0x20, &[0xFF, 0x00, 0x00, 0x00], true, &mut rig.transport)
        .unwrap();
    assert_eq!(seq, 1);
    assert_eq!(rig.machine.session().unwrap().pending_acks().outstanding(), 2);
}

// ── V2 ────────────────────────────────────────────────────────

#[test]
fn v2_battery_voltage_from_escaped_response() {
    let mut rig = Rig::new(&SPHERO_V2);
    rig.drive_to_ready();
    rig.sink.clear();

    // 0x8D in the payload has to travel escaped.
    let mut reply = Frame::command(0x13, 0x03, PacketFlags::RESPONSE, 0, &[0x0D, 0x8D]);
    reply.error_code = Some(0);
    let wire = PacketCodec::new(SPHERO_V2.framing).encode(&reply).unwrap();
    let (head, tail) = wire.split_at(wire.len() / 2);
    rig.event(TransportEvent::Notification {
        characteristic: v2_uuids::API,
        data: head.to_vec(),
    });
    rig.event(TransportEvent::Notification {
        characteristic: v2_uuids::API,
        data: tail.to_vec(),
    });
    assert_eq!(
        rig.sink.events,
        vec![ProtocolEvent::Response(Response::BatteryVoltage(0x0D8D))]
    );
}

#[test]
fn v2_drive_command_is_escaped_on_the_wire() {
    let mut rig = Rig::new(&SPHERO_V2);
    rig.drive_to_ready();
    rig.machine
        .send(
            &Command::Drive {
                speed: 0xAB,
                heading: 0,
                flags: 0,
            },
            &mut rig.transport,
        )
        .unwrap();
    let (_, bytes) = rig.transport.last_write().unwrap();
    let frame = PacketCodec::new(SPHERO_V2.framing).decode(&bytes).unwrap();
    assert_eq!((frame.target, frame.command, frame.sequence), (0x12, 0x07, 1));
    assert_eq!(frame.payload, vec![0xAB, 0x00, 0x00, 0x00]);
    // Payload 0xAB must have been escaped.
    assert!(bytes.windows(2).any(|w| w == [0xAB, 0x23]));
}
