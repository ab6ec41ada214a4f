//! File transfer service
//!
//! Ties the BLE engine pieces together behind the entry points the radio
//! stack and the application call. One instance serves one connection; it
//! holds no global state and runs entirely on the caller's event context.

use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::config::FtsConfig;
use crate::transport::ble::{
    Channel, ChannelGate, ConnectionHandle, ConnectionState, EventDispatcher, EventHandler,
    EventKind, InboundReassembler, InboundSummary, PacketTransport, PumpOutcome, TransferEngine,
    TransferId, TransferProgress, TransferState,
};
use crate::FtsError;

/// Cumulative counters for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStats {
    pub files_sent: u64,
    pub files_aborted: u64,
    pub fragments_sent: u64,
    pub commands_sent: u64,
    pub transient_failures: u64,
    pub packets_received: u64,
    pub bytes_received: u64,
}

/// File transfer service bound to one transport and one event handler.
///
/// The service never holds the file buffer itself. [`send_file`] hands back
/// an [`ActiveTransfer`] that borrows the buffer for that one transfer only.
///
/// [`send_file`]: FileTransferService::send_file
pub struct FileTransferService<T, H> {
    transport: T,
    config: FtsConfig,
    gate: ChannelGate,
    engine: TransferEngine,
    reassembler: InboundReassembler,
    dispatcher: EventDispatcher<H>,
    stats: ServiceStats,
}

impl<T, H> FileTransferService<T, H>
where
    T: PacketTransport,
    H: EventHandler,
{
    /// Create a service with the default configuration
    pub fn new(transport: T, handler: H) -> Self {
        let config = FtsConfig::default();
        let reassembler = InboundReassembler::new(config.command_limit(u16::MAX));
        Self {
            transport,
            config,
            gate: ChannelGate::new(),
            engine: TransferEngine::new(),
            reassembler,
            dispatcher: EventDispatcher::new(handler),
            stats: ServiceStats::default(),
        }
    }

    /// Create a service and register its event handler
    pub fn initialize(transport: T, config: FtsConfig, handler: H) -> Result<Self, FtsError> {
        config.validate()?;
        let mut service = Self::new(transport, handler);
        service.reassembler.set_max_command_len(config.command_limit(u16::MAX));
        service.config = config;
        tracing::debug!(config = ?service.config, "file transfer service initialized");
        Ok(service)
    }

    // ------------------------------------------------------------------
    // Radio stack notifications
    // ------------------------------------------------------------------

    /// A peer attached. Any previous peer is treated as gone.
    pub fn on_connected(&mut self, handle: ConnectionHandle) {
        if let Some(previous) = self.gate.connection_handle() {
            tracing::warn!(%previous, %handle, "connect without disconnect, dropping previous peer");
            self.abort_transfer();
            self.reassembler.reset();
        }
        self.gate.connect(handle);
        tracing::info!(%handle, max_data_len = self.max_data_len(), "peer connected");
        self.emit(EventKind::Connected, None);
    }

    /// The peer went away: abort any transfer and close every channel.
    /// `Disconnected` is emitted even when no peer was attached.
    pub fn on_disconnected(&mut self) {
        let handle = self.gate.connection_handle();
        self.abort_transfer();
        self.reassembler.reset();
        self.gate.disconnect();
        match handle {
            Some(handle) => tracing::info!(%handle, "peer disconnected"),
            None => tracing::debug!("disconnect while not connected"),
        }
        let max_data_len = self.max_data_len();
        self.dispatcher
            .emit(EventKind::Disconnected, handle, max_data_len, None);
    }

    /// The peer changed its notification subscription on `channel`
    pub fn on_subscription_changed(&mut self, channel: Channel, enabled: bool) {
        if enabled {
            self.gate.mark_enabled(channel);
        } else {
            self.gate.mark_disabled(channel);
        }
        tracing::debug!(%channel, enabled, "subscription changed");
    }

    /// The link renegotiated its MTU. Fragments are sized from the
    /// transport on every pump, so this only records the change.
    pub fn on_mtu_changed(&mut self) {
        tracing::info!(max_data_len = self.max_data_len(), "packet length updated");
    }

    /// A packet arrived on `channel`
    pub fn on_packet_received(&mut self, channel: Channel, data: &[u8]) -> Result<(), FtsError> {
        if !self.gate.is_connected() {
            return Err(FtsError::NotConnected);
        }
        let kind = self.reassembler.on_packet(channel, data)?;
        self.stats.packets_received += 1;
        self.stats.bytes_received += data.len() as u64;
        self.emit(kind, Some(data));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Application entry points
    // ------------------------------------------------------------------

    /// Start sending `buffer[..total_length]` in fragments of at most
    /// `fragment_cap` bytes (further clamped to the packet length).
    ///
    /// The returned handle drives the transfer and keeps `buffer` borrowed
    /// until it is dropped.
    pub fn send_file<'buf>(
        &mut self,
        buffer: &'buf [u8],
        total_length: u32,
        fragment_cap: u32,
    ) -> Result<ActiveTransfer<'_, 'buf, T, H>, FtsError> {
        if self.engine.is_busy() {
            return Err(FtsError::Busy);
        }
        if total_length > self.config.max_file_len {
            return Err(FtsError::InvalidArgument(format!(
                "file of {} bytes exceeds limit of {}",
                total_length, self.config.max_file_len
            )));
        }
        let id = self.engine.start(buffer, total_length, fragment_cap)?;
        tracing::info!(id = id.0, total_length, fragment_cap, "file transfer started");
        self.emit(EventKind::OutDataReady, None);
        Ok(ActiveTransfer {
            service: self,
            buffer,
            id,
        })
    }

    /// Send the whole of `buffer` with the configured default fragment cap
    pub fn send_file_default<'buf>(&mut self, buffer: &'buf [u8]) -> Result<ActiveTransfer<'_, 'buf, T, H>, FtsError> {
        let total_length = u32::try_from(buffer.len())
            .map_err(|_| FtsError::InvalidArgument("buffer exceeds 4 GiB".to_string()))?;
        self.send_file(buffer, total_length, self.config.default_fragment_cap)
    }

    /// Send one command packet. Commands never fragment.
    pub fn send_command(&mut self, command: &[u8]) -> Result<(), FtsError> {
        self.send_single(Channel::OutgoingCommand, command)?;
        self.stats.commands_sent += 1;
        self.emit(EventKind::OutCmdReady, Some(command));
        Ok(())
    }

    /// Send one raw data packet outside of a file transfer
    pub fn send_data(&mut self, data: &[u8]) -> Result<(), FtsError> {
        if self.engine.is_busy() {
            return Err(FtsError::Busy);
        }
        self.send_single(Channel::OutgoingData, data)?;
        self.emit(EventKind::OutDataReady, Some(data));
        Ok(())
    }

    /// The application has everything it expects of the inbound file
    pub fn signal_rx_complete(&mut self) -> Result<InboundSummary, FtsError> {
        if !self.gate.is_connected() {
            return Err(FtsError::NotConnected);
        }
        let summary = self.reassembler.complete();
        tracing::info!(chunks = summary.chunks, bytes = summary.bytes, "inbound file complete");
        self.emit(EventKind::InDataComplete, None);
        Ok(summary)
    }

    /// Drop the active transfer, if any. Emits no event.
    pub fn abort(&mut self) -> Option<TransferProgress> {
        self.abort_transfer()
    }

    /// True iff a file transfer is in flight
    pub fn is_busy(&self) -> bool {
        self.engine.is_busy()
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn state(&self) -> TransferState {
        self.engine.state()
    }

    pub fn progress(&self) -> Option<TransferProgress> {
        self.engine.progress()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.gate.state()
    }

    /// Whether `channel` would admit a send right now
    pub fn can_send(&self, channel: Channel) -> bool {
        self.gate.can_send(channel, &self.transport)
    }

    /// Current per-packet payload capacity
    pub fn max_data_len(&self) -> u16 {
        self.transport.current_max_packet_length()
    }

    pub fn stats(&self) -> ServiceStats {
        self.stats
    }

    pub fn config(&self) -> &FtsConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn handler(&self) -> &H {
        self.dispatcher.handler()
    }

    pub fn handler_mut(&mut self) -> &mut H {
        self.dispatcher.handler_mut()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn pump_buffer(&mut self, buffer: &[u8]) -> Result<PumpOutcome, FtsError> {
        let outcome = match self.engine.pump(buffer, &self.gate, &mut self.transport) {
            Ok(outcome) => outcome,
            Err(err) => {
                if err == FtsError::TransientFailure {
                    self.stats.transient_failures += 1;
                }
                return Err(err);
            }
        };

        match outcome {
            PumpOutcome::Sent { .. } => self.stats.fragments_sent += 1,
            PumpOutcome::Completed {
                total_length,
                fragments,
                ..
            } => {
                self.stats.fragments_sent += 1;
                self.stats.files_sent += 1;
                tracing::info!(total_length, fragments, "file transfer complete");
                self.emit(EventKind::OutDataComplete, None);
            }
            PumpOutcome::Idle | PumpOutcome::Blocked => {}
        }
        Ok(outcome)
    }

    fn send_single(&mut self, channel: Channel, payload: &[u8]) -> Result<(), FtsError> {
        if !self.gate.is_connected() {
            return Err(FtsError::NotConnected);
        }
        if payload.is_empty() {
            return Err(FtsError::InvalidArgument("empty payload".to_string()));
        }
        let max_packet = self.max_data_len();
        let max = match channel {
            Channel::OutgoingCommand => self.config.command_limit(max_packet),
            _ => max_packet,
        };
        if payload.len() > usize::from(max) {
            return Err(FtsError::PayloadTooLarge {
                len: payload.len(),
                max,
            });
        }
        if !self.gate.can_send(channel, &self.transport) {
            return Err(FtsError::Busy);
        }
        self.transport.send_packet(channel, payload)?;
        tracing::debug!(%channel, len = payload.len(), "packet sent");
        Ok(())
    }

    fn abort_transfer(&mut self) -> Option<TransferProgress> {
        let aborted = self.engine.abort();
        if let Some(progress) = aborted {
            self.stats.files_aborted += 1;
            tracing::warn!(
                offset = progress.offset,
                total_length = progress.total_length,
                "file transfer aborted"
            );
        }
        aborted
    }

    fn emit(&mut self, kind: EventKind, data: Option<&[u8]>) {
        let handle = self.gate.connection_handle();
        let max_data_len = self.max_data_len();
        self.dispatcher.emit(kind, handle, max_data_len, data);
    }
}

/// One file send in flight.
///
/// Borrows the caller's buffer and the service for the length of the
/// transfer. Radio notifications still reach the service through `Deref`,
/// so the platform layer keeps forwarding them while it holds the handle.
/// Dropping the handle before the last fragment goes out aborts the
/// transfer.
#[must_use = "dropping the handle aborts the transfer"]
pub struct ActiveTransfer<'s, 'buf, T, H>
where
    T: PacketTransport,
    H: EventHandler,
{
    service: &'s mut FileTransferService<T, H>,
    buffer: &'buf [u8],
    id: TransferId,
}

impl<T, H> ActiveTransfer<'_, '_, T, H>
where
    T: PacketTransport,
    H: EventHandler,
{
    pub fn id(&self) -> TransferId {
        self.id
    }

    /// False once this transfer has completed or been aborted
    pub fn is_active(&self) -> bool {
        self.service.engine.active_id() == Some(self.id)
    }

    /// Move at most one fragment onto the link.
    ///
    /// Call again on every "transmit buffer freed" notification; a
    /// [`PumpOutcome::Blocked`] result means nothing changed.
    pub fn pump(&mut self) -> Result<PumpOutcome, FtsError> {
        if !self.is_active() {
            return Ok(PumpOutcome::Idle);
        }
        self.service.pump_buffer(self.buffer)
    }

    /// Pump until the transfer completes or the link stops admitting.
    /// Returns the number of fragments sent.
    pub fn pump_all(&mut self) -> Result<u32, FtsError> {
        let mut sent = 0;
        loop {
            match self.pump()? {
                PumpOutcome::Sent { .. } => sent += 1,
                PumpOutcome::Completed { .. } => return Ok(sent + 1),
                PumpOutcome::Idle | PumpOutcome::Blocked => return Ok(sent),
            }
        }
    }
}

impl<T, H> Deref for ActiveTransfer<'_, '_, T, H>
where
    T: PacketTransport,
    H: EventHandler,
{
    type Target = FileTransferService<T, H>;

    fn deref(&self) -> &Self::Target {
        &*self.service
    }
}

impl<T, H> DerefMut for ActiveTransfer<'_, '_, T, H>
where
    T: PacketTransport,
    H: EventHandler,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.service
    }
}

impl<T, H> Drop for ActiveTransfer<'_, '_, T, H>
where
    T: PacketTransport,
    H: EventHandler,
{
    fn drop(&mut self) {
        if self.is_active() {
            tracing::debug!(id = self.id.0, "transfer handle dropped before completion");
            self.service.abort_transfer();
        }
    }
}
