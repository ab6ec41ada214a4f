/// Connection bookkeeping and per-channel send admission
///
/// The gate is the single place that answers "may the service put a packet
/// on this channel right now". Subscription changes from the radio stack
/// land here and take effect on the next query.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::gatt::{Channel, PacketTransport};

/// Opaque connection identifier assigned by the radio stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionHandle(pub u16);

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// Link state as seen by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No peer
    Disconnected,
    /// One peer attached
    Connected(ConnectionHandle),
}

/// Tracks connection state and notification enablement per channel
#[derive(Debug, Clone)]
pub struct ChannelGate {
    state: ConnectionState,
    enabled: [bool; 4],
}

impl Default for ChannelGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelGate {
    /// Create a gate with no peer and every channel disabled
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            enabled: [false; 4],
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Handle of the attached peer, if any
    pub fn connection_handle(&self) -> Option<ConnectionHandle> {
        match self.state {
            ConnectionState::Connected(handle) => Some(handle),
            ConnectionState::Disconnected => None,
        }
    }

    /// Check if a peer is attached
    pub fn is_connected(&self) -> bool {
        matches!(self.state, ConnectionState::Connected(_))
    }

    /// Record a new peer; subscriptions start out disabled
    pub fn connect(&mut self, handle: ConnectionHandle) {
        self.enabled = [false; 4];
        self.state = ConnectionState::Connected(handle);
    }

    /// Drop the peer and every subscription
    pub fn disconnect(&mut self) {
        self.enabled = [false; 4];
        self.state = ConnectionState::Disconnected;
    }

    pub fn mark_enabled(&mut self, channel: Channel) {
        self.enabled[channel.index()] = true;
    }

    pub fn mark_disabled(&mut self, channel: Channel) {
        self.enabled[channel.index()] = false;
    }

    /// Whether the peer has notifications enabled on `channel`
    pub fn is_enabled(&self, channel: Channel) -> bool {
        self.enabled[channel.index()]
    }

    /// True iff the channel is subscribed, a peer is attached and the
    /// transport has room in its immediate-send buffer.
    pub fn can_send<T: PacketTransport + ?Sized>(&self, channel: Channel, transport: &T) -> bool {
        self.is_connected() && self.is_enabled(channel) && transport.has_tx_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ble::gatt::TransportBusy;

    struct FixedTransport {
        capacity: bool,
    }

    impl PacketTransport for FixedTransport {
        fn send_packet(&mut self, channel: Channel, _data: &[u8]) -> Result<(), TransportBusy> {
            Err(TransportBusy { channel })
        }

        fn has_tx_capacity(&self) -> bool {
            self.capacity
        }

        fn current_max_packet_length(&self) -> u16 {
            20
        }
    }

    #[test]
    fn test_new_gate_is_closed() {
        let gate = ChannelGate::new();
        let transport = FixedTransport { capacity: true };

        assert_eq!(gate.state(), ConnectionState::Disconnected);
        assert!(gate.connection_handle().is_none());
        for channel in Channel::ALL {
            assert!(!gate.can_send(channel, &transport));
        }
    }

    #[test]
    fn test_enabled_requires_connection() {
        let mut gate = ChannelGate::new();
        let transport = FixedTransport { capacity: true };

        gate.mark_enabled(Channel::OutgoingData);
        assert!(!gate.can_send(Channel::OutgoingData, &transport));
    }

    #[test]
    fn test_connect_resets_subscriptions() {
        let mut gate = ChannelGate::new();
        gate.connect(ConnectionHandle(1));
        gate.mark_enabled(Channel::OutgoingData);
        gate.connect(ConnectionHandle(2));

        assert!(!gate.is_enabled(Channel::OutgoingData));
        assert_eq!(gate.connection_handle(), Some(ConnectionHandle(2)));
    }

    #[test]
    fn test_can_send_all_conditions() {
        let mut gate = ChannelGate::new();
        let open = FixedTransport { capacity: true };
        let full = FixedTransport { capacity: false };

        gate.connect(ConnectionHandle(7));
        assert!(!gate.can_send(Channel::OutgoingData, &open));

        gate.mark_enabled(Channel::OutgoingData);
        assert!(gate.can_send(Channel::OutgoingData, &open));
        assert!(!gate.can_send(Channel::OutgoingData, &full));
        assert!(!gate.can_send(Channel::OutgoingCommand, &open));

        gate.mark_disabled(Channel::OutgoingData);
        assert!(!gate.can_send(Channel::OutgoingData, &open));
    }

    #[test]
    fn test_disconnect_clears_everything() {
        let mut gate = ChannelGate::new();
        let transport = FixedTransport { capacity: true };
        gate.connect(ConnectionHandle(3));
        gate.mark_enabled(Channel::OutgoingCommand);
        gate.mark_enabled(Channel::OutgoingData);

        gate.disconnect();

        assert!(!gate.is_connected());
        for channel in Channel::ALL {
            assert!(!gate.is_enabled(channel));
            assert!(!gate.can_send(channel, &transport));
        }
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(ConnectionHandle(0x1a).to_string(), "0x001a");
    }
}
