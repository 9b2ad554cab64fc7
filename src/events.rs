// Per-component event bus
//
// Components signal each other ("fileUploaded", "formSubmitted", "actionFinished")
// through a bus that each component owns. These signals are separate from native
// DOM events because they carry structured payloads to listeners that need not be
// DOM ancestors of the emitter.
//
// Dispatch is single-threaded. Listeners may register, remove or trigger on the
// same bus while being called; dispatch iterates a snapshot of the listener list.

use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// Event names the built-in components emit
pub mod names {
    pub const FILE_UPLOADED: &str = "fileUploaded";
    pub const FORM_SUBMITTED: &str = "formSubmitted";
    pub const ACTION_FINISHED: &str = "actionFinished";
}

/// Listener callback; receives the event payload (`Value::Null` when none)
pub type Listener = Rc<dyn Fn(&Value)>;

/// Token returned by [`EventBus::on`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct Registry {
    listeners: RefCell<HashMap<String, Vec<(ListenerId, Listener)>>>,
    next_id: Cell<u64>,
}

/// Publish/subscribe hub owned by one component
///
/// Cloning yields another handle to the same bus, so listeners can capture it.
/// Two buses created with `new()` never see each other's listeners.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<Registry>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `name`
    pub fn on(&self, name: &str, listener: impl Fn(&Value) + 'static) -> ListenerId {
        let id = ListenerId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);
        self.inner
            .listeners
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .push((id, Rc::new(listener)));
        id
    }

    /// Unsubscribe; returns false if the listener wasn't registered under `name`
    pub fn off(&self, name: &str, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.borrow_mut();
        let Some(entries) = listeners.get_mut(name) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            listeners.remove(name);
        }
        removed
    }

    /// Deliver `payload` to every listener of `name`, in registration order
    ///
    /// Returns the number of listeners called. No listeners is not an error.
    pub fn trigger(&self, name: &str, payload: &Value) -> usize {
        // Snapshot so listeners can touch the bus while we iterate
        let snapshot: Vec<Listener> = match self.inner.listeners.borrow().get(name) {
            Some(entries) => entries.iter().map(|(_, l)| Rc::clone(l)).collect(),
            None => Vec::new(),
        };

        tracing::debug!(event = name, listeners = snapshot.len(), "trigger");
        for listener in &snapshot {
            listener(payload);
        }
        snapshot.len()
    }

    pub fn listener_count(&self, name: &str) -> usize {
        self.inner
            .listeners
            .borrow()
            .get(name)
            .map_or(0, Vec::len)
    }

    /// Drop every listener (used when the owning component is discarded)
    pub fn clear(&self) {
        self.inner.listeners.borrow_mut().clear();
    }

    /// Whether two handles refer to the same bus
    pub fn same_bus(&self, other: &EventBus) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.inner.listeners.borrow();
        let mut names: Vec<_> = listeners.keys().collect();
        names.sort();
        f.debug_struct("EventBus").field("events", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recorder(bus: &EventBus, name: &str) -> Rc<RefCell<Vec<Value>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        bus.on(name, move |payload| sink.borrow_mut().push(payload.clone()));
        seen
    }

    #[test]
    fn test_trigger_without_listeners_is_noop() {
        let bus = EventBus::new();
        assert_eq!(bus.trigger("nothing", &Value::Null), 0);
    }

    #[test]
    fn test_listeners_called_in_registration_order() {
        let bus = EventBus::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let order = Rc::clone(&order);
            bus.on("tick", move |_| order.borrow_mut().push(i));
        }
        assert_eq!(bus.trigger("tick", &Value::Null), 3);
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_buses_are_isolated() {
        let a = EventBus::new();
        let b = EventBus::new();
        let seen = recorder(&a, names::FILE_UPLOADED);

        b.trigger(names::FILE_UPLOADED, &json!({"id": 1}));
        assert!(seen.borrow().is_empty());
        assert!(!a.same_bus(&b));
        assert!(a.same_bus(&a.clone()));
    }

    #[test]
    fn test_off_removes_only_that_listener() {
        let bus = EventBus::new();
        let kept = recorder(&bus, "e");
        let removed = Rc::new(Cell::new(0));
        let counter = Rc::clone(&removed);
        let id = bus.on("e", move |_| counter.set(counter.get() + 1));

        assert!(bus.off("e", id));
        assert!(!bus.off("e", id));
        assert!(!bus.off("other", id));

        bus.trigger("e", &json!(1));
        assert_eq!(removed.get(), 0);
        assert_eq!(kept.borrow().len(), 1);
    }

    #[test]
    fn test_reentrant_listener_sees_snapshot() {
        let bus = EventBus::new();
        let calls = Rc::new(Cell::new(0));

        let handle = bus.clone();
        let counter = Rc::clone(&calls);
        bus.on("e", move |_| {
            counter.set(counter.get() + 1);
            // Registered mid-dispatch: must not run during this trigger
            let late = Rc::clone(&counter);
            handle.on("e", move |_| late.set(late.get() + 100));
        });

        bus.trigger("e", &Value::Null);
        assert_eq!(calls.get(), 1);
        assert_eq!(bus.listener_count("e"), 2);
    }

    #[test]
    fn test_listener_can_trigger_other_event() {
        let bus = EventBus::new();
        let seen = recorder(&bus, names::FORM_SUBMITTED);
        let handle = bus.clone();
        bus.on(names::FILE_UPLOADED, move |_| {
            handle.trigger(names::FORM_SUBMITTED, &Value::Null);
        });

        bus.trigger(names::FILE_UPLOADED, &json!({"id": 7}));
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_clear_drops_everything() {
        let bus = EventBus::new();
        let seen = recorder(&bus, "e");
        bus.clear();
        bus.trigger("e", &Value::Null);
        assert!(seen.borrow().is_empty());
        assert_eq!(bus.listener_count("e"), 0);
    }
}
