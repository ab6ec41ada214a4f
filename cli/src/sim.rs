// Loopback simulation — two file transfer services joined by an in-memory link
//
// The sender announces the file length with a command, then pumps the file
// through its data channel. The receiver's application layer uses the length
// to decide when the inbound file is complete.

use anyhow::{Context, Result};
use fts_core::transport::ble::max_packet_length_for_mtu;
use fts_core::{
    Channel, ConnectionHandle, Event, EventHandler, EventKind, FileTransferService, FtsConfig,
    PacketTransport, PumpOutcome, ServiceStats, TransportBusy,
};
use std::collections::VecDeque;

/// Application opcode announcing the length of the next file
pub const OPCODE_FILE_LENGTH: u8 = 0x01;

/// Rounds without progress before the simulation gives up
const MAX_IDLE_ROUNDS: u32 = 16;

#[derive(Debug, Clone)]
pub struct SimOptions {
    pub att_mtu: u16,
    pub fragment_cap: u32,
    pub tx_buffer_slots: usize,
    pub max_command_len: Option<u16>,
    /// Peer drops its data subscription for one round after this many fragments
    pub pause_after: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct SimReport {
    pub bytes: usize,
    pub rounds: u32,
    pub paused_rounds: u32,
    pub max_data_len: u16,
    pub sender: ServiceStats,
    pub receiver: ServiceStats,
    pub sent_digest: String,
    pub received_digest: String,
}

impl SimReport {
    pub fn verified(&self) -> bool {
        self.sent_digest == self.received_digest
    }
}

/// Simulated radio: queues packets until the other side drains them
struct LoopbackTransport {
    queue: VecDeque<(Channel, Vec<u8>)>,
    slots: usize,
    max_packet: u16,
}

impl LoopbackTransport {
    fn new(att_mtu: u16, slots: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            slots,
            max_packet: max_packet_length_for_mtu(att_mtu),
        }
    }
}

impl PacketTransport for LoopbackTransport {
    fn send_packet(&mut self, channel: Channel, data: &[u8]) -> Result<(), TransportBusy> {
        if self.queue.len() >= self.slots {
            return Err(TransportBusy { channel });
        }
        self.queue.push_back((channel, data.to_vec()));
        Ok(())
    }

    fn has_tx_capacity(&self) -> bool {
        self.queue.len() < self.slots
    }

    fn current_max_packet_length(&self) -> u16 {
        self.max_packet
    }
}

/// Receiver application: rebuilds the file from data events
#[derive(Debug, Default)]
struct FileSink {
    data: Vec<u8>,
    expected: Option<usize>,
    completed: bool,
}

impl FileSink {
    fn is_ready(&self) -> bool {
        !self.completed && self.expected == Some(self.data.len())
    }
}

impl EventHandler for FileSink {
    fn on_event(&mut self, event: &Event<'_>) {
        match (event.kind, event.data) {
            (EventKind::InCmdReceived, Some(cmd)) if cmd.len() >= 5 && cmd[0] == OPCODE_FILE_LENGTH => {
                let mut len = [0u8; 4];
                len.copy_from_slice(&cmd[1..5]);
                self.expected = Some(u32::from_le_bytes(len) as usize);
                self.data.clear();
                self.completed = false;
            }
            (EventKind::InDataReceived, Some(chunk)) => self.data.extend_from_slice(chunk),
            (EventKind::InDataComplete, _) => self.completed = true,
            _ => {}
        }
    }
}

/// Sender application: logs lifecycle events
struct SenderLog;

impl EventHandler for SenderLog {
    fn on_event(&mut self, event: &Event<'_>) {
        tracing::debug!(
            event = %event.kind,
            len = event.data_len(),
            max_data_len = event.max_data_len,
            "sender event"
        );
    }
}

fn service_config(options: &SimOptions) -> FtsConfig {
    let config = FtsConfig::new();
    match options.max_command_len {
        Some(len) => config.with_max_command_len(len),
        None => config,
    }
}

/// Run one file through a sender/receiver pair
pub fn run(file: &[u8], options: &SimOptions) -> Result<SimReport> {
    let total_length = u32::try_from(file.len()).context("File larger than 4 GiB")?;
    let handle = ConnectionHandle(0x0001);

    let mut sender = FileTransferService::initialize(
        LoopbackTransport::new(options.att_mtu, options.tx_buffer_slots),
        service_config(options),
        SenderLog,
    )?;
    let mut receiver = FileTransferService::initialize(
        LoopbackTransport::new(options.att_mtu, options.tx_buffer_slots),
        service_config(options),
        FileSink::default(),
    )?;

    sender.on_connected(handle);
    receiver.on_connected(handle);
    sender.on_subscription_changed(Channel::OutgoingCommand, true);
    sender.on_subscription_changed(Channel::OutgoingData, true);

    let mut announce = vec![OPCODE_FILE_LENGTH];
    announce.extend_from_slice(&total_length.to_le_bytes());
    sender
        .send_command(&announce)
        .context("Failed to announce file length")?;
    let mut transfer = sender
        .send_file(file, total_length, options.fragment_cap)
        .context("Failed to start transfer")?;

    let mut rounds = 0;
    let mut paused_rounds = 0;
    let mut idle_rounds = 0;
    let mut paused = false;

    while transfer.is_active() || !transfer.transport().queue.is_empty() {
        rounds += 1;

        if paused {
            transfer.on_subscription_changed(Channel::OutgoingData, true);
            paused = false;
        } else if let Some(limit) = options.pause_after {
            if paused_rounds == 0 && transfer.stats().fragments_sent >= limit {
                transfer.on_subscription_changed(Channel::OutgoingData, false);
                paused = true;
                paused_rounds += 1;
            }
        }

        let mut progressed = false;
        loop {
            match transfer.pump() {
                Ok(PumpOutcome::Sent { .. }) => progressed = true,
                Ok(PumpOutcome::Completed { .. }) => {
                    progressed = true;
                    break;
                }
                Ok(PumpOutcome::Idle | PumpOutcome::Blocked) => break,
                Err(err) if err.is_recoverable() => {
                    tracing::debug!(error = %err, "pump deferred");
                    break;
                }
                Err(err) => return Err(err.into()),
            }
        }

        while let Some((channel, packet)) = transfer.transport_mut().queue.pop_front() {
            progressed = true;
            receiver
                .on_packet_received(channel.peer_channel(), &packet)
                .context("Receiver rejected packet")?;
        }

        if receiver.handler().is_ready() {
            let summary = receiver.signal_rx_complete()?;
            tracing::info!(chunks = summary.chunks, bytes = summary.bytes, "receiver complete");
        }

        if let Some(progress) = transfer.progress() {
            tracing::debug!(
                round = rounds,
                offset = progress.offset,
                percent = progress.percent(),
                "round finished"
            );
        }

        if progressed || paused {
            idle_rounds = 0;
        } else {
            idle_rounds += 1;
            if idle_rounds >= MAX_IDLE_ROUNDS {
                anyhow::bail!("Transfer stalled after {} rounds", rounds);
            }
        }
    }

    drop(transfer);

    let max_data_len = sender.max_data_len();
    sender.on_disconnected();
    receiver.on_disconnected();

    let sink = receiver.handler();
    if !sink.completed {
        anyhow::bail!(
            "Receiver got {} of {} bytes",
            sink.data.len(),
            file.len()
        );
    }

    Ok(SimReport {
        bytes: file.len(),
        rounds,
        paused_rounds,
        max_data_len,
        sender: sender.stats(),
        receiver: receiver.stats(),
        sent_digest: blake3::hash(file).to_hex().to_string(),
        received_digest: blake3::hash(&sink.data).to_hex().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> SimOptions {
        SimOptions {
            att_mtu: 23,
            fragment_cap: 20,
            tx_buffer_slots: 4,
            max_command_len: Some(20),
            pause_after: None,
        }
    }

    #[test]
    fn test_loopback_small_file() {
        let file: Vec<u8> = (0..45).collect();
        let report = run(&file, &options()).unwrap();

        assert!(report.verified());
        assert_eq!(report.bytes, 45);
        assert_eq!(report.sender.fragments_sent, 3);
        assert_eq!(report.sender.files_sent, 1);
        assert_eq!(report.receiver.bytes_received, 45 + 5);
    }

    #[test]
    fn test_loopback_with_pause() {
        let file = vec![0xA5u8; 500];
        let mut opts = options();
        opts.pause_after = Some(5);

        let report = run(&file, &opts).unwrap();
        assert!(report.verified());
        assert_eq!(report.paused_rounds, 1);
        assert_eq!(report.sender.fragments_sent, 25);
    }

    #[test]
    fn test_loopback_large_mtu() {
        let file = vec![0x5Au8; 4096];
        let mut opts = options();
        opts.att_mtu = 247;
        opts.fragment_cap = 1000;

        let report = run(&file, &opts).unwrap();
        assert!(report.verified());
        assert_eq!(report.max_data_len, 244);
        assert_eq!(report.sender.fragments_sent, 17);
    }
}
