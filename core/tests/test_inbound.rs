// Integration test for the inbound side and a sender/receiver loopback
//
// Packets sent by one service are carried to a second service over an
// in-memory link, the way a central and a peripheral would see them.

use std::collections::VecDeque;

use fts_core::{
    Channel, ConnectionHandle, Event, EventKind, EventLog, FileTransferService, FtsError,
    PacketTransport, TransportBusy,
};

/// One direction of an in-memory link
#[derive(Default)]
struct LinkTransport {
    queue: VecDeque<(Channel, Vec<u8>)>,
}

impl PacketTransport for LinkTransport {
    fn send_packet(&mut self, channel: Channel, data: &[u8]) -> Result<(), TransportBusy> {
        self.queue.push_back((channel, data.to_vec()));
        Ok(())
    }

    fn has_tx_capacity(&self) -> bool {
        self.queue.len() < 4
    }

    fn current_max_packet_length(&self) -> u16 {
        20
    }
}

fn connected_receiver() -> FileTransferService<LinkTransport, EventLog> {
    let mut receiver = FileTransferService::new(LinkTransport::default(), EventLog::new());
    receiver.on_connected(ConnectionHandle(0x20));
    receiver
}

#[test]
fn test_command_packet_reported_whole() {
    let mut receiver = connected_receiver();

    receiver
        .on_packet_received(Channel::IncomingCommand, &[0x01, 0x00, 0x10, 0x00, 0x00])
        .expect("Command accepted");

    let record = receiver.handler().records().last().expect("Event");
    assert_eq!(record.kind, EventKind::InCmdReceived);
    assert_eq!(record.data.as_deref(), Some(&[0x01, 0x00, 0x10, 0x00, 0x00][..]));
    assert_eq!(record.connection_handle, Some(ConnectionHandle(0x20)));
}

#[test]
fn test_data_packets_without_implicit_completion() {
    let mut receiver = connected_receiver();

    for chunk in [&[1u8; 20][..], &[2u8; 20][..], &[3u8; 5][..]] {
        receiver
            .on_packet_received(Channel::IncomingData, chunk)
            .expect("Data accepted");
    }

    assert_eq!(receiver.handler().count(EventKind::InDataReceived), 3);
    assert_eq!(receiver.handler().count(EventKind::InDataComplete), 0);

    let summary = receiver.signal_rx_complete().expect("Connected");
    assert_eq!(summary.chunks, 3);
    assert_eq!(summary.bytes, 45);
    assert_eq!(receiver.handler().count(EventKind::InDataComplete), 1);
    assert_eq!(receiver.stats().bytes_received, 45);
}

#[test]
fn test_packet_on_outgoing_channel_rejected() {
    let mut receiver = connected_receiver();
    let events_before = receiver.handler().records().len();

    let result = receiver.on_packet_received(Channel::OutgoingData, b"nope");

    assert!(matches!(result, Err(FtsError::InvalidArgument(_))));
    assert_eq!(receiver.handler().records().len(), events_before);
}

#[test]
fn test_disconnect_discards_partial_inbound_file() {
    let mut receiver = connected_receiver();
    receiver
        .on_packet_received(Channel::IncomingData, &[9u8; 20])
        .expect("Data accepted");

    receiver.on_disconnected();
    receiver.on_connected(ConnectionHandle(0x21));

    let summary = receiver.signal_rx_complete().expect("Connected");
    assert_eq!(summary.chunks, 0);
    assert_eq!(
        receiver.handler().kinds(),
        vec![
            EventKind::Connected,
            EventKind::InDataReceived,
            EventKind::Disconnected,
            EventKind::Connected,
            EventKind::InDataComplete,
        ]
    );
}

#[test]
fn test_closure_handler_sees_borrowed_payload() {
    let mut lengths = Vec::new();
    {
        let handler = |event: &Event<'_>| {
            if event.kind == EventKind::InDataReceived {
                lengths.push(event.data_len());
            }
        };
        let mut receiver = FileTransferService::new(LinkTransport::default(), handler);
        receiver.on_connected(ConnectionHandle(1));
        receiver
            .on_packet_received(Channel::IncomingData, &[0u8; 7])
            .expect("Data accepted");
        receiver
            .on_packet_received(Channel::IncomingData, &[0u8; 3])
            .expect("Data accepted");
    }
    assert_eq!(lengths, vec![7, 3]);
}

#[test]
fn test_loopback_file_transfer() {
    let file: Vec<u8> = (0..1000u32).map(|i| (i * 7 % 251) as u8).collect();
    let length_command = {
        let mut cmd = vec![0x01];
        cmd.extend_from_slice(&(file.len() as u32).to_le_bytes());
        cmd
    };

    let mut sender = FileTransferService::new(LinkTransport::default(), EventLog::new());
    let mut receiver = connected_receiver();
    sender.on_connected(ConnectionHandle(0x20));
    sender.on_subscription_changed(Channel::OutgoingCommand, true);
    sender.on_subscription_changed(Channel::OutgoingData, true);

    sender.send_command(&length_command).expect("Length command");
    let mut transfer = sender.send_file(&file, file.len() as u32, 20).expect("Start transfer");

    let mut received = Vec::new();
    let mut expected_len = None;
    let mut guard = 0;
    while transfer.is_active() || !transfer.transport().queue.is_empty() {
        transfer.pump_all().expect("Pump");
        while let Some((channel, packet)) = transfer.transport_mut().queue.pop_front() {
            receiver
                .on_packet_received(channel.peer_channel(), &packet)
                .expect("Delivered");
            match channel.peer_channel() {
                Channel::IncomingCommand if packet[0] == 0x01 => {
                    let mut len = [0u8; 4];
                    len.copy_from_slice(&packet[1..5]);
                    expected_len = Some(u32::from_le_bytes(len) as usize);
                }
                Channel::IncomingData => received.extend_from_slice(&packet),
                _ => {}
            }
        }
        if Some(received.len()) == expected_len {
            receiver.signal_rx_complete().expect("Connected");
            expected_len = None;
        }
        guard += 1;
        assert!(guard < 1000, "transfer stalled");
    }
    drop(transfer);

    assert_eq!(received, file);
    assert_eq!(sender.handler().count(EventKind::OutDataComplete), 1);
    assert_eq!(receiver.handler().count(EventKind::InCmdReceived), 1);
    assert_eq!(receiver.handler().count(EventKind::InDataReceived), 50);
    assert_eq!(receiver.handler().count(EventKind::InDataComplete), 1);

    println!("✓ Loopback transfer of {} bytes", file.len());
}
