// Transport module — BLE file transfer engine

pub mod ble;

pub use ble::{
    Channel, ChannelGate, ConnectionHandle, ConnectionState, PacketTransport, TransportBusy,
};
