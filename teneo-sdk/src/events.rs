//! The synchronous event emitter backing `TeneoClient::on`/`off`/`once`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use teneo_types::Event;

/// A boxed listener callback.
type Listener = Box<dyn Fn(&Event) + Send + Sync + 'static>;

/// A handle returned by [`EventBus::on`], usable with [`EventBus::off`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

enum Entry {
    Persistent(Listener),
    /// Fires once, then removes itself; implemented as a flag rather than consuming
    /// the closure so emission can stay a shared borrow.
    Once(Listener, std::sync::atomic::AtomicBool),
}

/// Holds per-event listener lists and invokes them synchronously, in registration
/// order, during emission (`spec.md` §5).
///
/// A listener that panics is caught and logged rather than aborting the emitter or
/// subsequent listeners, mirroring "listener exceptions are caught, logged, and do not
/// abort the emitter."
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<(ListenerId, Entry)>>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener invoked for every emitted event.
    pub fn on(&self, listener: impl Fn(&Event) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .expect("event bus lock poisoned")
            .push((id, Entry::Persistent(Box::new(listener))));
        id
    }

    /// Registers a listener invoked at most once, then automatically removed.
    pub fn once(&self, listener: impl Fn(&Event) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().expect("event bus lock poisoned").push((
            id,
            Entry::Once(Box::new(listener), std::sync::atomic::AtomicBool::new(false)),
        ));
        id
    }

    /// Removes a previously registered listener. A no-op if already removed/fired.
    pub fn off(&self, id: ListenerId) {
        self.listeners
            .write()
            .expect("event bus lock poisoned")
            .retain(|(listener_id, _)| *listener_id != id);
    }

    /// Invokes every registered listener with `event`, in registration order.
    pub fn emit(&self, event: &Event) {
        let fired_once: Vec<ListenerId> = {
            let listeners = self.listeners.read().expect("event bus lock poisoned");
            let mut fired = Vec::new();
            for (id, entry) in listeners.iter() {
                match entry {
                    Entry::Persistent(f) => invoke(f, event),
                    Entry::Once(f, fired_flag) => {
                        if !fired_flag.swap(true, Ordering::SeqCst) {
                            invoke(f, event);
                            fired.push(*id);
                        }
                    }
                }
            }
            fired
        };
        if !fired_once.is_empty() {
            let mut listeners = self.listeners.write().expect("event bus lock poisoned");
            listeners.retain(|(id, _)| !fired_once.contains(id));
        }
    }
}

fn invoke(f: &Listener, event: &Event) {
    if let Err(panic) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(event))) {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "listener panicked".to_string());
        tracing::warn!(%message, event = event.name(), "event listener panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn listeners_fire_in_registration_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let a = seen.clone();
        bus.on(move |_| a.lock().unwrap().push("a"));
        let b = seen.clone();
        bus.on(move |_| b.lock().unwrap().push("b"));
        bus.emit(&Event::Ready);
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn once_listener_fires_a_single_time() {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));
        let c = count.clone();
        bus.once(move |_| *c.lock().unwrap() += 1);
        bus.emit(&Event::Ready);
        bus.emit(&Event::Ready);
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn off_removes_a_listener() {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));
        let c = count.clone();
        let id = bus.on(move |_| *c.lock().unwrap() += 1);
        bus.off(id);
        bus.emit(&Event::Ready);
        assert_eq!(*count.lock().unwrap(), 0);
    }

    #[test]
    fn panicking_listener_does_not_abort_later_listeners() {
        let bus = EventBus::new();
        bus.on(|_| panic!("boom"));
        let seen = Arc::new(Mutex::new(false));
        let s = seen.clone();
        bus.on(move |_| *s.lock().unwrap() = true);
        bus.emit(&Event::Ready);
        assert!(*seen.lock().unwrap());
    }
}
