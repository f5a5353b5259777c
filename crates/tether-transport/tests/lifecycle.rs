//! Lifecycle tests for the transport state machine.

use bytes::Bytes;
use std::time::Duration;
use tether_transport::{
    Driver, DriverHandle, ErrorKind, Packet, PacketType, Payload, RawData, ReadyState, Transport,
    TransportError, TransportEvent, TransportOptions, UsageError,
};

/// Driver that records every call and lets the test decide outcomes.
#[derive(Default)]
struct RecordingDriver {
    connects: usize,
    disconnects: usize,
    writes: Vec<Vec<Packet>>,
    handle: Option<DriverHandle>,
    fail_write: bool,
    fail_disconnect: bool,
}

impl Driver for RecordingDriver {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn connect(
        &mut self,
        _options: &TransportOptions,
        handle: DriverHandle,
    ) -> Result<(), TransportError> {
        self.connects += 1;
        self.handle = Some(handle);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        self.disconnects += 1;
        if self.fail_disconnect {
            return Err(TransportError::transport("disconnect error", None));
        }
        Ok(())
    }

    fn write(&mut self, packets: Vec<Packet>) -> Result<(), TransportError> {
        if self.fail_write {
            return Err(TransportError::transport("write error", Some("broken pipe".into())));
        }
        self.writes.push(packets);
        Ok(())
    }
}

fn open_transport() -> (Transport<RecordingDriver>, tether_transport::Listener) {
    let mut transport = Transport::new(TransportOptions::default(), RecordingDriver::default());
    let events = transport.subscribe();
    transport.open().on_open();
    (transport, events)
}

#[test]
fn test_open_invokes_connect_once() {
    let mut transport = Transport::new(TransportOptions::default(), RecordingDriver::default());
    let mut events = transport.subscribe();

    transport.open();
    assert_eq!(transport.ready_state(), ReadyState::Opening);
    assert_eq!(transport.driver().connects, 1);
    assert!(!transport.is_writable());

    // Repeated opens while opening change nothing.
    transport.open().open();
    assert_eq!(transport.ready_state(), ReadyState::Opening);
    assert_eq!(transport.driver().connects, 1);
    assert!(events.drain().is_empty());
}

#[test]
fn test_connect_success_opens() {
    let mut transport = Transport::new(TransportOptions::default(), RecordingDriver::default());
    let mut events = transport.subscribe();

    transport.open();
    let handle = transport.driver().handle.clone().unwrap();
    assert!(handle.opened());
    assert_eq!(transport.process_pending(), 1);

    assert_eq!(transport.ready_state(), ReadyState::Open);
    assert!(transport.is_writable());
    assert_eq!(events.drain(), vec![TransportEvent::Open]);

    // Open while open is a no-op too.
    transport.open();
    assert_eq!(transport.driver().connects, 1);
    assert!(events.drain().is_empty());
}

#[test]
fn test_send_passes_packets_in_order() {
    let (mut transport, _events) = open_transport();
    let p1 = Packet::message("first");
    let p2 = Packet::ping();

    transport.send(vec![p1.clone(), p2.clone()]).unwrap();
    assert_eq!(transport.driver().writes, vec![vec![p1, p2]]);
}

#[test]
fn test_send_when_not_open_fails() {
    let mut transport = Transport::new(TransportOptions::default(), RecordingDriver::default());

    assert_eq!(
        transport.send(vec![Packet::ping()]),
        Err(UsageError::NotOpen(ReadyState::Unopened))
    );

    transport.open();
    assert_eq!(
        transport.send(vec![Packet::ping()]),
        Err(UsageError::NotOpen(ReadyState::Opening))
    );

    transport.on_open();
    transport.close();
    assert_eq!(
        transport.send(vec![Packet::ping()]),
        Err(UsageError::NotOpen(ReadyState::Closed))
    );

    assert!(transport.driver().writes.is_empty());
}

#[test]
fn test_write_failure_is_reported() {
    let (mut transport, mut events) = open_transport();
    events.drain();
    transport.driver_mut().fail_write = true;

    assert!(transport.send(vec![Packet::ping()]).is_ok());
    match events.drain().as_slice() {
        [TransportEvent::Error(e)] => {
            assert_eq!(e.kind, ErrorKind::Transport);
            assert_eq!(e.message, "write error");
            assert_eq!(e.description.as_deref(), Some("broken pipe"));
        }
        other => panic!("Expected one error event, got {:?}", other),
    }
    assert_eq!(transport.ready_state(), ReadyState::Open);
}

#[test]
fn test_valid_data_yields_one_packet() {
    let (mut transport, mut events) = open_transport();
    events.drain();

    transport.on_data(RawData::from("4hello"));
    assert_eq!(
        events.drain(),
        vec![TransportEvent::Packet(Packet::message("hello"))]
    );
}

#[test]
fn test_corrupt_data_yields_one_error() {
    let (mut transport, mut events) = open_transport();
    events.drain();

    transport.on_data(RawData::from("x-not-a-packet"));
    let drained = events.drain();
    assert_eq!(drained.len(), 1);
    match &drained[0] {
        TransportEvent::Error(e) => {
            assert_eq!(e.kind, ErrorKind::Decode);
            assert!(e.description.is_some());
        }
        other => panic!("Expected error event, got {:?}", other),
    }
    assert_eq!(transport.ready_state(), ReadyState::Open);

    // Later data still decodes.
    transport.on_data(RawData::from("3"));
    assert_eq!(events.drain(), vec![TransportEvent::Packet(Packet::pong())]);
}

#[test]
fn test_binary_type_follows_context() {
    let (mut transport, mut events) = open_transport();
    events.drain();

    let raw = RawData::Binary(Bytes::from_static(&[4, 0xde, 0xad]));
    transport.on_data(raw.clone());
    transport
        .options()
        .context
        .set_binary_type(tether_transport::BinaryType::Base64);
    transport.on_data(raw);

    let payloads: Vec<_> = events
        .drain()
        .into_iter()
        .map(|e| match e {
            TransportEvent::Packet(p) => p.payload,
            other => panic!("Expected packet, got {:?}", other),
        })
        .collect();
    assert_eq!(
        payloads,
        vec![
            Some(Payload::Binary(Bytes::from_static(&[0xde, 0xad]))),
            Some(Payload::Base64("3q0=".to_string())),
        ]
    );
}

#[test]
fn test_close_invokes_disconnect_once() {
    let (mut transport, mut events) = open_transport();

    transport.close();
    assert_eq!(transport.driver().disconnects, 1);
    assert_eq!(transport.ready_state(), ReadyState::Closed);
    assert!(!transport.is_writable());

    // Nothing happens on further closes, and nothing follows the close.
    transport.close().close();
    transport.on_data(RawData::from("3"));
    transport.on_error("late", None);

    assert_eq!(transport.driver().disconnects, 1);
    assert_eq!(events.drain(), vec![TransportEvent::Open, TransportEvent::Close]);
}

#[test]
fn test_close_when_never_opened_is_noop() {
    let mut transport = Transport::new(TransportOptions::default(), RecordingDriver::default());
    let mut events = transport.subscribe();

    transport.close();
    assert_eq!(transport.ready_state(), ReadyState::Unopened);
    assert_eq!(transport.driver().disconnects, 0);
    assert!(events.drain().is_empty());
}

#[test]
fn test_close_while_opening_cancels() {
    let mut transport = Transport::new(TransportOptions::default(), RecordingDriver::default());
    let mut events = transport.subscribe();

    transport.open();
    let handle = transport.driver().handle.clone().unwrap();
    transport.close();
    assert_eq!(transport.driver().disconnects, 1);

    // The connect completes after cancellation and is ignored.
    handle.opened();
    transport.process_pending();

    assert_eq!(transport.ready_state(), ReadyState::Closed);
    assert_eq!(events.drain(), vec![TransportEvent::Close]);
}

#[test]
fn test_stale_signals_do_not_reach_next_cycle() {
    let (mut transport, mut events) = open_transport();
    let first = transport.driver().handle.clone().unwrap();

    // Queued by the first connection but never applied.
    first.closed();
    transport.close();
    transport.open();
    assert!(!first.data("4stale"));

    let second = transport.driver().handle.clone().unwrap();
    second.opened();
    transport.process_pending();

    assert_eq!(transport.ready_state(), ReadyState::Open);
    assert_eq!(transport.driver().connects, 2);
    assert_eq!(transport.driver().disconnects, 1);
    assert_eq!(
        events.drain(),
        vec![TransportEvent::Open, TransportEvent::Close, TransportEvent::Open]
    );
}

#[test]
fn test_corrupt_data_while_opening_yields_one_error() {
    let mut transport = Transport::new(TransportOptions::default(), RecordingDriver::default());
    let mut events = transport.subscribe();

    transport.open();
    transport.on_data(RawData::from("x-corrupt"));

    assert_eq!(transport.ready_state(), ReadyState::Opening);
    let drained = events.drain();
    assert_eq!(drained.len(), 1);
    match &drained[0] {
        TransportEvent::Error(e) => assert_eq!(e.kind, ErrorKind::Decode),
        other => panic!("Expected decode error, got {:?}", other),
    }
}

#[test]
fn test_disconnect_error_precedes_close() {
    let (mut transport, mut events) = open_transport();
    events.drain();
    transport.driver_mut().fail_disconnect = true;

    transport.close();
    let drained = events.drain();
    assert_eq!(drained.len(), 2);
    assert!(matches!(drained[0], TransportEvent::Error(_)));
    assert_eq!(drained[1], TransportEvent::Close);
}

#[test]
fn test_on_error_keeps_state() {
    let (mut transport, mut events) = open_transport();
    events.drain();

    transport
        .on_error("poll error", Some("status 500".into()))
        .on_error("second", None);

    assert_eq!(transport.ready_state(), ReadyState::Open);
    let kinds: Vec<_> = events
        .drain()
        .into_iter()
        .map(|e| match e {
            TransportEvent::Error(e) => (e.kind, e.message),
            other => panic!("Expected error, got {:?}", other),
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            (ErrorKind::Transport, "poll error".to_string()),
            (ErrorKind::Transport, "second".to_string()),
        ]
    );
}

#[test]
fn test_unsubscribed_listener_gets_nothing() {
    let mut transport = Transport::new(TransportOptions::default(), RecordingDriver::default());
    let mut kept = transport.subscribe();
    let mut removed = transport.subscribe();

    assert!(transport.unsubscribe(removed.id()));
    transport.open().on_open();

    assert_eq!(kept.drain(), vec![TransportEvent::Open]);
    assert_eq!(removed.try_recv(), None);
}

#[test]
fn test_end_to_end_scenario() {
    let options = TransportOptions::new("example.com", 80, "/rt");
    let mut transport = Transport::new(options, RecordingDriver::default());
    let mut events = transport.subscribe();

    transport.open();
    let handle = transport.driver().handle.clone().unwrap();
    handle.opened();
    transport.process_pending();
    assert_eq!(transport.ready_state(), ReadyState::Open);
    assert!(transport.is_writable());

    let hi = Packet::with_payload(PacketType::Message, "hi");
    transport.send(vec![hi.clone()]).unwrap();
    assert_eq!(transport.driver().writes, vec![vec![hi]]);

    handle.data(RawData::Binary(Bytes::from_static(&[3])));
    transport.process_pending();

    transport.close();
    assert_eq!(transport.driver().disconnects, 1);
    assert_eq!(transport.ready_state(), ReadyState::Closed);

    let drained = events.drain();
    assert_eq!(drained.len(), 3);
    assert_eq!(drained[0], TransportEvent::Open);
    match &drained[1] {
        TransportEvent::Packet(p) => assert_eq!(p.packet_type, PacketType::Pong),
        other => panic!("Expected pong packet, got {:?}", other),
    }
    assert_eq!(drained[2], TransportEvent::Close);
}

#[tokio::test]
async fn test_async_driver_signals() {
    let mut transport = Transport::new(TransportOptions::default(), RecordingDriver::default());
    let mut events = transport.subscribe();
    transport.open();

    let handle = transport.driver().handle.clone().unwrap();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        handle.opened();
        handle.data("4async");
        handle.closed();
    });

    for _ in 0..3 {
        tokio::time::timeout(Duration::from_secs(1), transport.next_signal())
            .await
            .expect("signal timed out")
            .expect("signal channel closed");
    }

    assert_eq!(events.recv().await, Some(TransportEvent::Open));
    assert_eq!(
        events.recv().await,
        Some(TransportEvent::Packet(Packet::message("async")))
    );
    assert_eq!(events.recv().await, Some(TransportEvent::Close));
    assert_eq!(transport.ready_state(), ReadyState::Closed);
}
