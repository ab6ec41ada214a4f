// FTS Core — file fragmentation and flow control over BLE notifications
#![allow(clippy::empty_line_after_doc_comments)]
//
// One file at a time, one packet per fragment, no header added by the core.
// Everything radio-specific lives behind `PacketTransport`.

pub mod config;
pub mod service;
pub mod transport;

use thiserror::Error;

pub use config::FtsConfig;
pub use service::{ActiveTransfer, FileTransferService, ServiceStats};
pub use transport::ble::{
    Channel, ConnectionHandle, ConnectionState, Event, EventHandler, EventKind, EventLog,
    EventRecord, PacketTransport, PumpOutcome, TransferProgress, TransferState, TransportBusy,
};

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FtsError {
    #[error("Transfer already in progress")]
    Busy,
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Payload of {len} bytes exceeds packet capacity of {max}")]
    PayloadTooLarge { len: usize, max: u16 },
    #[error("Transport could not accept the packet")]
    TransientFailure,
    #[error("Not connected")]
    NotConnected,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl FtsError {
    /// Whether retrying the same call later can succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FtsError::Busy | FtsError::TransientFailure | FtsError::NotConnected
        )
    }
}

impl From<TransportBusy> for FtsError {
    fn from(_err: TransportBusy) -> Self {
        FtsError::TransientFailure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_errors() {
        assert!(FtsError::Busy.is_recoverable());
        assert!(FtsError::TransientFailure.is_recoverable());
        assert!(FtsError::NotConnected.is_recoverable());
        assert!(!FtsError::InvalidArgument("x".to_string()).is_recoverable());
        assert!(!FtsError::PayloadTooLarge { len: 21, max: 20 }.is_recoverable());
    }

    #[test]
    fn test_transport_busy_conversion() {
        let err: FtsError = TransportBusy {
            channel: Channel::OutgoingData,
        }
        .into();
        assert_eq!(err, FtsError::TransientFailure);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            FtsError::PayloadTooLarge { len: 21, max: 20 }.to_string(),
            "Payload of 21 bytes exceeds packet capacity of 20"
        );
    }
}
