//! Per-connection listener table keyed by channel.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::message::channel::Channel;
use crate::message::types::ServerEvent;

/// Identifier returned by [`ListenerTable::add`], used to detach.
pub type ListenerId = u64;

/// Callback invoked for every event on a channel.
pub type Listener = Arc<dyn Fn(&ServerEvent) + Send + Sync>;

/// Channel → listeners, in attachment order.
#[derive(Default)]
pub struct ListenerTable {
    by_channel: DashMap<Channel, Vec<(ListenerId, Listener)>>,
    next_id: AtomicU64,
}

impl ListenerTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a listener to a channel.
    pub fn add(&self, channel: Channel, listener: Listener) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.by_channel
            .entry(channel)
            .or_default()
            .push((id, listener));
        id
    }

    /// Detaches a listener. Returns `false` if it was already gone.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut removed = false;
        for mut entry in self.by_channel.iter_mut() {
            let before = entry.len();
            entry.retain(|(lid, _)| *lid != id);
            removed |= entry.len() < before;
        }
        self.by_channel.retain(|_, listeners| !listeners.is_empty());
        removed
    }

    /// Listeners currently attached to a channel.
    pub fn count(&self, channel: Channel) -> usize {
        self.by_channel
            .get(&channel)
            .map(|entry| entry.len())
            .unwrap_or(0)
    }

    /// Listeners across all channels.
    pub fn total(&self) -> usize {
        self.by_channel.iter().map(|entry| entry.len()).sum()
    }

    /// Invokes every listener on the event's channel. Returns how many ran.
    ///
    /// The table is not locked while listeners run, so a listener may
    /// attach or detach others.
    pub fn dispatch(&self, event: &ServerEvent) -> usize {
        let listeners: Vec<Listener> = self
            .by_channel
            .get(&event.channel())
            .map(|entry| entry.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();

        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }
}

impl fmt::Debug for ListenerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerTable")
            .field("total", &self.total())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use serde_json::Value;

    use super::*;

    #[test]
    fn test_dispatch_only_matching_channel() {
        let table = ListenerTable::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        table.add(
            Channel::Connected,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(table.dispatch(&ServerEvent::Connected(Value::Null)), 1);
        assert_eq!(table.dispatch(&ServerEvent::Disconnected(Value::Null)), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_detaches() {
        let table = ListenerTable::new();
        let a = table.add(Channel::Connected, Arc::new(|_| {}));
        let b = table.add(Channel::Connected, Arc::new(|_| {}));
        assert_ne!(a, b);
        assert_eq!(table.count(Channel::Connected), 2);

        assert!(table.remove(a));
        assert!(!table.remove(a));
        assert_eq!(table.count(Channel::Connected), 1);

        assert!(table.remove(b));
        assert_eq!(table.total(), 0);
    }
}
