/// Outward notifications of the file transfer service
///
/// Every state change the application can observe is reported through one
/// registered [`EventHandler`], synchronously, from inside the call that
/// caused it. The dispatcher keeps no queue.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::gate::ConnectionHandle;

/// Fixed event vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A peer attached
    Connected,
    /// The peer went away; any outbound transfer was aborted
    Disconnected,
    /// A command was handed to the transport
    OutCmdReady,
    /// A file transfer (or single data packet) was accepted for sending
    OutDataReady,
    /// The last fragment of a file was handed to the transport
    OutDataComplete,
    /// A command packet arrived
    InCmdReceived,
    /// A data packet arrived
    InDataReceived,
    /// The application declared the inbound file finished
    InDataComplete,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Connected => "connected",
            EventKind::Disconnected => "disconnected",
            EventKind::OutCmdReady => "tx-cmd-ready",
            EventKind::OutDataReady => "tx-data-ready",
            EventKind::OutDataComplete => "tx-data-complete",
            EventKind::InCmdReceived => "rx-cmd-received",
            EventKind::InDataReceived => "rx-data-received",
            EventKind::InDataComplete => "rx-data-complete",
        };
        f.write_str(name)
    }
}

/// One notification. `data` borrows the packet and is only valid for the
/// duration of the handler call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event<'a> {
    pub kind: EventKind,
    /// Peer the event concerns; `None` once disconnected
    pub connection_handle: Option<ConnectionHandle>,
    /// Payload capacity of one packet at the time of the event
    pub max_data_len: u16,
    pub data: Option<&'a [u8]>,
}

impl Event<'_> {
    /// Length of the attached payload, zero when there is none
    pub fn data_len(&self) -> usize {
        self.data.map_or(0, <[u8]>::len)
    }

    /// Copy the event out of the handler call
    pub fn to_record(&self) -> EventRecord {
        EventRecord {
            kind: self.kind,
            connection_handle: self.connection_handle,
            max_data_len: self.max_data_len,
            data: self.data.map(<[u8]>::to_vec),
        }
    }
}

/// Owned copy of an [`Event`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub kind: EventKind,
    pub connection_handle: Option<ConnectionHandle>,
    pub max_data_len: u16,
    pub data: Option<Vec<u8>>,
}

/// Application callback
pub trait EventHandler {
    fn on_event(&mut self, event: &Event<'_>);
}

impl<F> EventHandler for F
where
    F: FnMut(&Event<'_>),
{
    fn on_event(&mut self, event: &Event<'_>) {
        self(event)
    }
}

/// Handler that records every event it sees
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    records: Vec<EventRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Kinds in arrival order
    pub fn kinds(&self) -> Vec<EventKind> {
        self.records.iter().map(|r| r.kind).collect()
    }

    /// Number of events of one kind
    pub fn count(&self, kind: EventKind) -> usize {
        self.records.iter().filter(|r| r.kind == kind).count()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl EventHandler for EventLog {
    fn on_event(&mut self, event: &Event<'_>) {
        self.records.push(event.to_record());
    }
}

/// Delivers events to the single registered handler
pub struct EventDispatcher<H> {
    handler: H,
    dispatched: u64,
}

impl<H: EventHandler> EventDispatcher<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            dispatched: 0,
        }
    }

    /// Build and deliver one event
    pub fn emit(
        &mut self,
        kind: EventKind,
        connection_handle: Option<ConnectionHandle>,
        max_data_len: u16,
        data: Option<&[u8]>,
    ) {
        let event = Event {
            kind,
            connection_handle,
            max_data_len,
            data,
        };
        tracing::trace!(event = %kind, len = event.data_len(), "dispatching event");
        self.dispatched += 1;
        self.handler.on_event(&event);
    }

    /// Total events delivered so far
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }
}
