use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use log::debug;

use super::{EventKind, HostEvent};

pub type EventHandler = Box<dyn Fn(&HostEvent) + Send + Sync>;

type SharedHandler = Arc<dyn Fn(&HostEvent) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    handlers: Vec<(u64, EventKind, SharedHandler)>,
}

fn lock(listeners: &Mutex<Listeners>) -> MutexGuard<'_, Listeners> {
    listeners.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Subscribe/emit registry backing `Host::on_event`.
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Arc<Mutex<Listeners>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, kind: EventKind, handler: EventHandler) -> Subscription {
        let mut listeners = lock(&self.listeners);
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.handlers.push((id, kind, Arc::from(handler)));

        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Runs every handler registered for the event's kind, returns how many ran.
    pub fn emit(&self, event: &HostEvent) -> usize {
        let kind = event.kind();
        // handlers run outside the lock so they may subscribe or unsubscribe
        let matching = lock(&self.listeners)
            .handlers
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, handler)| handler.clone())
            .collect::<Vec<_>>();

        debug!("Emitting {:?} to {} listener(s)", kind, matching.len());
        for handler in &matching {
            handler(event);
        }
        matching.len()
    }

    #[cfg(test)]
    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).handlers.len()
    }
}

/// Handle of one registered handler. Unregisters on drop.
#[must_use = "dropping a subscription unregisters its handler"]
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            lock(&listeners).handlers.retain(|(id, _, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter(bus: &EventBus, kind: EventKind) -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let subscription = bus.subscribe(
            kind,
            Box::new(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (count, subscription)
    }

    #[test]
    fn emits_only_to_matching_kinds() {
        let bus = EventBus::new();
        let (removed, _removed_sub) = counter(&bus, EventKind::Removed);
        let (added, _added_sub) = counter(&bus, EventKind::PinAdded);

        assert_eq!(bus.emit(&HostEvent::Removed), 1);
        assert_eq!(bus.emit(&HostEvent::PrimaryActionInvoked), 0);

        assert_eq!(removed.load(Ordering::SeqCst), 1);
        assert_eq!(added.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dropping_a_subscription_unregisters_it() {
        let bus = EventBus::new();
        let (count, subscription) = counter(&bus, EventKind::NotificationsDisabled);
        let (_other, _kept) = counter(&bus, EventKind::NotificationsDisabled);
        assert_eq!(bus.listener_count(), 2);

        drop(subscription);
        bus.emit(&HostEvent::NotificationsDisabled);

        assert_eq!(bus.listener_count(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn subscriptions_outliving_the_bus_are_harmless() {
        let bus = EventBus::new();
        let (_count, subscription) = counter(&bus, EventKind::Removed);
        drop(bus);
        drop(subscription);
    }
}
