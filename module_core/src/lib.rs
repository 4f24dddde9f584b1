// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

//! Event bus core of the GPS acquisition subsystem.
//!
//! Every component is a [`Module`] with an async run loop; modules never
//! call each other directly, all communication happens as [`Event`]s over
//! the shared [`EventBus`].

use chrono::{NaiveDateTime, NaiveTime};
use common::fix::{AltitudeSet, FixStatus};
use common::position::WgsPoint;
use common::satellite::{SatInfo, SivInfo};
use common::units::Velocity;
use std::sync::Arc;

/// Represents a high-level event in the system.
///
/// Each `Event` wraps an [`EventKind`], which defines the actual type
/// and data carried by the event.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    /// The inner event type and associated data.
    pub kind: EventKind,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Event { kind }
    }
}

/// A shared raw NMEA sentence as forwarded by the adapter.
pub type SentencePtr = Arc<String>;

/// A shared fixed-point position payload.
pub type WgsPointPtr = Arc<WgsPoint>;

/// The shared set of reconciled altitude readings.
pub type AltitudeSetPtr = Arc<AltitudeSet>;

/// A shared speed/heading payload.
pub type VelocityPtr = Arc<Velocity>;

/// Shared satellite constellation summary.
pub type SatInfoPtr = Arc<SatInfo>;

/// A complete satellites-in-view snapshot from a finished GSV series.
pub type SivListPtr = Arc<Vec<SivInfo>>;

/// UTC date and time of the first valid fix, for system clock sync.
pub type DateTimePtr = Arc<NaiveDateTime>;

/// Enumerates the different kinds of events that can be emitted
/// and transmitted via the [`EventBus`].
#[derive(Clone, Debug, PartialEq, strum_macros::EnumDiscriminants)]
#[strum_discriminants(name(EventKindType), derive(Hash))]
pub enum EventKind {
    /// Indicates that a module shall terminate.
    QuitEvent,

    /// A raw NMEA sentence polled from the adapter, still checksum
    /// protected. Consumed by the decoder module.
    RawSentenceEvent(SentencePtr),

    /// A sentence to be sent to the GPS receiver, without checksum; the
    /// protocol client appends it before transmission.
    SendSentenceEvent(SentencePtr),

    /// The adapter reported that its receiver connection came up.
    ReceiverConnectedEvent,

    /// The adapter reported that its receiver connection went down.
    ReceiverDisconnectedEvent,

    /// The supervised adapter process has died; a restart follows at the
    /// next supervisor tick.
    AdapterCrashedEvent,

    /// The adapter executable could not be located or spawned.
    AdapterSpawnFailedEvent,

    /// The adapter rejected the open request for the configured receiver
    /// device.
    ReceiverInitFailedEvent,

    /// The connection/fix state machine changed state.
    GpsStatusEvent(FixStatus),

    /// The decoded fix time changed: all fields of the previous fix are
    /// final and a new fix starts.
    NewFixEvent(NaiveTime),

    /// The decoded position changed.
    PositionChangedEvent(WgsPointPtr),

    /// One or more of the reconciled altitude readings changed.
    AltitudeChangedEvent(AltitudeSetPtr),

    /// Ground speed and/or true heading changed.
    VelocityChangedEvent(VelocityPtr),

    /// The satellite constellation summary changed.
    SatConstellationEvent(SatInfoPtr),

    /// A complete satellites-in-view snapshot was published.
    SatsInViewEvent(SivListPtr),

    /// One-shot request to synchronize the system clock with GPS time.
    ClockSyncEvent(DateTimePtr),
}

/// Extracts a reference to the payload of an [`EventKind`] variant.
///
/// Returns `Some(&payload)` when the event matches the requested variant,
/// `None` otherwise.
#[macro_export]
macro_rules! payload_ref {
    ($event:expr, $kind:path) => {
        match &$event {
            $kind(payload) => Some(payload),
            _ => None,
        }
    };
}

/// A simple asynchronous event bus for publishing and subscribing to [`Event`]s.
///
/// The event bus uses a [`tokio::sync::broadcast::channel`] under the hood,
/// allowing multiple receivers to listen for the same stream of events.
///
/// Each published event is cloned and distributed to all active subscribers.
/// If no subscribers exist at the time of publication, the event is discarded silently.
pub struct EventBus {
    /// The broadcast sender used internally to distribute events.
    sender: tokio::sync::broadcast::Sender<Event>,
}

impl EventBus {
    /// Creates a new [`EventBus`] with a fixed buffer capacity of 100 messages.
    ///
    /// When the buffer is full, the oldest messages are dropped automatically
    /// as new ones are published.
    pub fn new() -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(100);
        EventBus { sender }
    }

    /// Subscribes to the event bus and returns a [`tokio::sync::broadcast::Receiver`].
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Publishes an [`Event`] to all active subscribers.
    ///
    /// If no subscribers exist, the event is discarded silently.
    pub fn publish(&self, event: &Event) {
        let _ = self.sender.send(event.clone());
    }

    /// Creates a [`ModuleCtx`] bound to this [`EventBus`].
    pub fn context(&self) -> ModuleCtx {
        ModuleCtx::new(self)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Defines the common interface for an asynchronous module
/// that can be executed and communicate via the [`EventBus`].
#[async_trait::async_trait]
pub trait Module {
    /// Runs the module asynchronously until completion.
    ///
    /// This function typically contains the module's main event loop,
    /// reacting to messages received through the [`ModuleCtx`].
    async fn run(&mut self) -> Result<(), ()>;
}

/// Provides a module-scoped context for interacting with the [`EventBus`].
///
/// Each `ModuleCtx` owns both a sender and a receiver, allowing the module
/// to both publish and listen for events concurrently.
pub struct ModuleCtx {
    /// The broadcast sender used to publish events.
    pub sender: tokio::sync::broadcast::Sender<Event>,

    /// The broadcast receiver used to listen for events.
    pub receiver: tokio::sync::broadcast::Receiver<Event>,
}

impl ModuleCtx {
    /// Constructs a new [`ModuleCtx`] from the given [`EventBus`].
    ///
    /// Clones the internal broadcast sender and creates a new receiver.
    pub fn new(event_bus: &EventBus) -> Self {
        ModuleCtx {
            sender: event_bus.sender.clone(),
            receiver: event_bus.subscribe(),
        }
    }

    /// Publishes an event through this module's sender.
    pub fn publish(&self, kind: EventKind) {
        let _ = self.sender.send(Event { kind });
    }
}

pub mod test_helper;

#[cfg(test)]
mod tests;
