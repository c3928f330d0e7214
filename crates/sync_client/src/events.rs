//! Event fan-out to listeners and channels.

use std::fmt;

use contracts::SyncEvent;
use tokio::sync::mpsc;

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&SyncEvent) + Send>;

/// Synchronous fan-out of [`SyncEvent`]s
///
/// Listeners run inline on the emitting call; channel subscribers receive a
/// clone and are dropped once their receiver is gone.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<(SubscriptionId, Listener)>,
    channels: Vec<mpsc::UnboundedSender<SyncEvent>>,
    next_id: u64,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .field("channels", &self.channels.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked for every event
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&SyncEvent) + Send + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a callback; `false` if it was not registered
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    /// Open a new channel receiving every subsequent event
    pub fn channel(&mut self) -> mpsc::UnboundedReceiver<SyncEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.channels.push(tx);
        rx
    }

    pub fn emit(&mut self, event: SyncEvent) {
        for (_, listener) in &mut self.listeners {
            listener(&event);
        }
        self.channels.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Listeners plus open channels
    pub fn subscriber_count(&self) -> usize {
        self.listeners.len() + self.channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use contracts::{ConnectionState, RosterChange};

    fn roster_event() -> SyncEvent {
        SyncEvent::RosterChanged(RosterChange {
            joined: vec!["alpha".to_string()],
            left: Vec::new(),
            entity_ids: vec!["alpha".to_string()],
        })
    }

    #[test]
    fn test_listener_receives_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();

        let sink = Arc::clone(&seen);
        bus.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
        bus.emit(roster_event());

        assert_eq!(seen.lock().unwrap().as_slice(), &[roster_event()]);
    }

    #[test]
    fn test_unsubscribe() {
        let count = Arc::new(Mutex::new(0));
        let mut bus = EventBus::new();

        let counter = Arc::clone(&count);
        let id = bus.subscribe(move |_| *counter.lock().unwrap() += 1);
        bus.emit(roster_event());
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(roster_event());

        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_channel_receives_and_closed_channels_are_dropped() {
        let mut bus = EventBus::new();
        let mut rx = bus.channel();
        let dropped = bus.channel();
        drop(dropped);

        let event = SyncEvent::ConnectionStatus {
            previous: ConnectionState::Disconnected,
            current: ConnectionState::Connecting,
        };
        bus.emit(event.clone());

        assert_eq!(rx.try_recv().unwrap(), event);
        assert_eq!(bus.subscriber_count(), 1);
    }
}
