/// BLE file transfer engine
///
/// Protocol-level pieces of the file transfer service, independent of any
/// particular radio stack:
///
/// - **gatt**: logical channels, MTU arithmetic and the transport send primitive
/// - **gate**: connection state and per-channel send admission
/// - **fragment**: zero-copy splitting of a buffer into packet-sized views
/// - **transfer**: the one-at-a-time outbound transfer state machine
/// - **reassembly**: classification of inbound command and data packets
/// - **event**: the fixed event vocabulary and its single-handler dispatcher
///
/// The platform layer (SoftDevice, BlueZ, CoreBluetooth, ...) implements
/// [`PacketTransport`] and forwards connection, subscription and packet
/// notifications into [`crate::FileTransferService`].

pub mod event;
pub mod fragment;
pub mod gate;
pub mod gatt;
pub mod reassembly;
pub mod transfer;

// Re-export commonly used types
pub use event::{Event, EventDispatcher, EventHandler, EventKind, EventLog, EventRecord};

pub use fragment::{fragment_count, fragments, next_fragment, Fragmenter, Fragments};

pub use gate::{ChannelGate, ConnectionHandle, ConnectionState};

pub use gatt::{
    max_packet_length_for_mtu, Channel, PacketTransport, TransportBusy, DEFAULT_ATT_MTU,
    DEFAULT_MAX_COMMAND_LEN, HANDLE_LENGTH, OPCODE_LENGTH,
};

pub use reassembly::{InboundReassembler, InboundSummary};

pub use transfer::{PumpOutcome, TransferEngine, TransferId, TransferProgress, TransferState};
