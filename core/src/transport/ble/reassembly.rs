/// Inbound packet classification
///
/// The core does not rebuild files: each packet is surfaced to the
/// application as it arrives and the application decides when a file is
/// whole. Only per-file chunk and byte counters are kept, for diagnostics and
/// the completion summary.

use serde::{Deserialize, Serialize};

use super::event::EventKind;
use super::gatt::Channel;
use crate::FtsError;

/// Counters for the inbound file currently being received
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundSummary {
    pub chunks: u32,
    pub bytes: u64,
}

/// Classifies incoming packets into received-command / received-data events
#[derive(Debug, Clone)]
pub struct InboundReassembler {
    max_command_len: u16,
    current: InboundSummary,
}

impl InboundReassembler {
    /// `max_command_len` only drives a warning; oversize commands are still
    /// delivered.
    pub fn new(max_command_len: u16) -> Self {
        Self {
            max_command_len,
            current: InboundSummary::default(),
        }
    }

    pub fn set_max_command_len(&mut self, max_command_len: u16) {
        self.max_command_len = max_command_len;
    }

    /// Event kind to raise for `data` arriving on `channel`
    pub fn on_packet(&mut self, channel: Channel, data: &[u8]) -> Result<EventKind, FtsError> {
        match channel {
            Channel::IncomingCommand => {
                if data.len() > usize::from(self.max_command_len) {
                    tracing::warn!(
                        len = data.len(),
                        max = self.max_command_len,
                        "inbound command exceeds command length"
                    );
                }
                tracing::debug!(len = data.len(), "command received");
                Ok(EventKind::InCmdReceived)
            }
            Channel::IncomingData => {
                self.current.chunks += 1;
                self.current.bytes += data.len() as u64;
                tracing::debug!(
                    len = data.len(),
                    chunks = self.current.chunks,
                    bytes = self.current.bytes,
                    "data chunk received"
                );
                Ok(EventKind::InDataReceived)
            }
            Channel::OutgoingCommand | Channel::OutgoingData => Err(FtsError::InvalidArgument(
                format!("packet received on outgoing channel {}", channel),
            )),
        }
    }

    /// Counters for the file in progress
    pub fn current(&self) -> InboundSummary {
        self.current
    }

    /// Close the current inbound file and start counting afresh
    pub fn complete(&mut self) -> InboundSummary {
        std::mem::take(&mut self.current)
    }

    /// Forget any partially received file
    pub fn reset(&mut self) {
        self.current = InboundSummary::default();
    }
}
