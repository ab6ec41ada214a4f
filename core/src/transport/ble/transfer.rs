/// Outbound file transfer state machine
///
/// One transfer at a time. The engine only keeps the cursor (offset, total
/// length, cap); the caller's buffer is handed to every `pump`, which moves
/// at most one fragment onto the data channel. Each transfer gets a fresh id
/// so a stale caller cannot drive a newer transfer.

use serde::{Deserialize, Serialize};

use super::fragment::Fragmenter;
use super::gate::ChannelGate;
use super::gatt::{Channel, PacketTransport};
use crate::FtsError;

/// Externally visible engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferState {
    /// No transfer in flight
    Idle,
    /// A file is being pumped out
    Sending,
}

/// Identifies one `start`ed transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferId(pub u64);

/// Where an in-flight transfer stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferProgress {
    pub offset: u32,
    pub total_length: u32,
}

impl TransferProgress {
    pub fn remaining(&self) -> u32 {
        self.total_length - self.offset
    }

    /// Completion percentage (0-100)
    pub fn percent(&self) -> f64 {
        if self.total_length == 0 {
            return 100.0;
        }
        (self.offset as f64 / self.total_length as f64) * 100.0
    }
}

/// Result of one `pump` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpOutcome {
    /// Nothing to send
    Idle,
    /// A transfer is pending but the data channel is not admitting sends
    Blocked,
    /// One fragment went out; more remain
    Sent { len: usize, offset: u32 },
    /// The final fragment went out and the engine is idle again
    Completed {
        len: usize,
        total_length: u32,
        fragments: u32,
    },
}

/// Cursor of one in-progress file send
#[derive(Debug, Clone, Copy)]
struct OutboundTransfer {
    id: TransferId,
    offset: u32,
    total_length: u32,
    fragment_cap: u32,
    fragments_sent: u32,
}

impl OutboundTransfer {
    fn progress(&self) -> TransferProgress {
        TransferProgress {
            offset: self.offset,
            total_length: self.total_length,
        }
    }
}

/// Drives a single outbound transfer from start to completion or abort
#[derive(Debug, Default)]
pub struct TransferEngine {
    active: Option<OutboundTransfer>,
    next_id: u64,
}

impl TransferEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TransferState {
        if self.active.is_some() {
            TransferState::Sending
        } else {
            TransferState::Idle
        }
    }

    /// True iff a transfer is in flight
    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    pub fn progress(&self) -> Option<TransferProgress> {
        self.active.as_ref().map(OutboundTransfer::progress)
    }

    /// Id of the transfer in flight, if any
    pub fn active_id(&self) -> Option<TransferId> {
        self.active.as_ref().map(|t| t.id)
    }

    /// Begin sending `buffer[..total_length]` in fragments of at most
    /// `fragment_cap` bytes. The buffer is only checked here; the same
    /// buffer must be passed to every `pump` of this transfer.
    pub fn start(&mut self, buffer: &[u8], total_length: u32, fragment_cap: u32) -> Result<TransferId, FtsError> {
        if self.active.is_some() {
            return Err(FtsError::Busy);
        }
        if total_length == 0 {
            return Err(FtsError::InvalidArgument("total length is zero".to_string()));
        }
        if fragment_cap == 0 {
            return Err(FtsError::InvalidArgument("fragment cap is zero".to_string()));
        }
        check_buffer(buffer, total_length)?;

        let id = TransferId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.active = Some(OutboundTransfer {
            id,
            offset: 0,
            total_length,
            fragment_cap,
            fragments_sent: 0,
        });
        Ok(id)
    }

    /// Move at most one fragment of `buffer` onto the data channel.
    ///
    /// Never blocks. A closed gate is reported as [`PumpOutcome::Blocked`];
    /// a transport refusal is [`FtsError::TransientFailure`] and leaves the
    /// offset where it was.
    pub fn pump<T: PacketTransport + ?Sized>(
        &mut self,
        buffer: &[u8],
        gate: &ChannelGate,
        transport: &mut T,
    ) -> Result<PumpOutcome, FtsError> {
        let Some(transfer) = self.active.as_mut() else {
            return Ok(PumpOutcome::Idle);
        };
        check_buffer(buffer, transfer.total_length)?;

        if !gate.can_send(Channel::OutgoingData, &*transport) {
            tracing::trace!(offset = transfer.offset, "data channel not admitting");
            return Ok(PumpOutcome::Blocked);
        }

        let max_packet = u32::from(transport.current_max_packet_length());
        let cap = transfer.fragment_cap.min(max_packet) as usize;
        if cap == 0 {
            return Ok(PumpOutcome::Blocked);
        }

        let mut fragmenter = Fragmenter::resume(
            &buffer[..transfer.total_length as usize],
            transfer.offset as usize,
        );
        let fragment = fragmenter.peek(cap);
        if let Err(busy) = transport.send_packet(Channel::OutgoingData, fragment) {
            tracing::debug!(offset = transfer.offset, error = %busy, "fragment refused");
            return Err(FtsError::TransientFailure);
        }

        let len = fragment.len();
        fragmenter.advance(len);
        transfer.offset = fragmenter.offset() as u32;
        transfer.fragments_sent += 1;
        tracing::debug!(
            len,
            offset = transfer.offset,
            total = transfer.total_length,
            "fragment sent"
        );

        if !fragmenter.is_complete() {
            return Ok(PumpOutcome::Sent {
                len,
                offset: transfer.offset,
            });
        }

        let finished = self.active.take();
        let (total_length, fragments) = finished
            .map(|t| (t.total_length, t.fragments_sent))
            .unwrap_or_default();
        Ok(PumpOutcome::Completed {
            len,
            total_length,
            fragments,
        })
    }

    /// Drop any in-flight transfer. Returns where it stood.
    pub fn abort(&mut self) -> Option<TransferProgress> {
        self.active.take().map(|t| t.progress())
    }
}

fn check_buffer(buffer: &[u8], total_length: u32) -> Result<(), FtsError> {
    if buffer.len() < total_length as usize {
        return Err(FtsError::InvalidArgument(format!(
            "buffer holds {} bytes, total length is {}",
            buffer.len(),
            total_length
        )));
    }
    Ok(())
}
