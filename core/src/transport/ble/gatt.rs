/// GATT channel definitions for the file transfer service
///
/// This module names the four logical channels the service runs over, the
/// MTU arithmetic that bounds a single notification, and the send primitive
/// the platform radio stack has to provide.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// ATT opcode bytes in front of every notification payload
pub const OPCODE_LENGTH: u16 = 1;

/// Attribute handle bytes in front of every notification payload
pub const HANDLE_LENGTH: u16 = 2;

/// Default ATT MTU before any exchange has happened
pub const DEFAULT_ATT_MTU: u16 = 23;

/// Largest command the vendor service accepts in either direction
pub const DEFAULT_MAX_COMMAND_LEN: u16 = 20;

/// Payload capacity of one notification for a negotiated ATT MTU.
///
/// Saturates at zero for MTUs smaller than the header; callers treat zero as
/// "no usable link".
pub fn max_packet_length_for_mtu(att_mtu: u16) -> u16 {
    att_mtu.saturating_sub(OPCODE_LENGTH + HANDLE_LENGTH)
}

/// Logical channels of the file transfer service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// Commands notified to the peer
    OutgoingCommand,
    /// File data notified to the peer
    OutgoingData,
    /// Commands written by the peer
    IncomingCommand,
    /// File data written by the peer
    IncomingData,
}

impl Channel {
    /// All channels, in index order
    pub const ALL: [Channel; 4] = [
        Channel::OutgoingCommand,
        Channel::OutgoingData,
        Channel::IncomingCommand,
        Channel::IncomingData,
    ];

    /// Dense index used for per-channel tables
    pub fn index(&self) -> usize {
        match self {
            Channel::OutgoingCommand => 0,
            Channel::OutgoingData => 1,
            Channel::IncomingCommand => 2,
            Channel::IncomingData => 3,
        }
    }

    /// Whether the service sends on this channel
    pub fn is_outgoing(&self) -> bool {
        matches!(self, Channel::OutgoingCommand | Channel::OutgoingData)
    }

    /// The channel a packet sent on `self` arrives on at the peer
    pub fn peer_channel(&self) -> Channel {
        match self {
            Channel::OutgoingCommand => Channel::IncomingCommand,
            Channel::OutgoingData => Channel::IncomingData,
            Channel::IncomingCommand => Channel::OutgoingCommand,
            Channel::IncomingData => Channel::OutgoingData,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::OutgoingCommand => write!(f, "tx-cmd"),
            Channel::OutgoingData => write!(f, "tx-data"),
            Channel::IncomingCommand => write!(f, "rx-cmd"),
            Channel::IncomingData => write!(f, "rx-data"),
        }
    }
}

/// The transport could not take the packet right now
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Transport busy on {channel}")]
pub struct TransportBusy {
    pub channel: Channel,
}

/// Send primitive provided by the platform radio stack.
///
/// Implementations must never block: a packet is either queued for the air
/// immediately or refused with [`TransportBusy`].
#[cfg_attr(test, mockall::automock)]
pub trait PacketTransport {
    /// Attempt an immediate single-packet send
    fn send_packet(&mut self, channel: Channel, data: &[u8]) -> Result<(), TransportBusy>;

    /// Whether the immediate-send buffer has room for another packet
    fn has_tx_capacity(&self) -> bool;

    /// Effective per-packet payload capacity for the current MTU
    fn current_max_packet_length(&self) -> u16;
}
