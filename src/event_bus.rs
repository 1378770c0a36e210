//! Named-event publish/subscribe
//!
//! Synchronous and single-threaded: `emit` runs every listener for the event
//! before it returns. Components use it for one-off signals ("asset loaded",
//! "export requested") that have no place in the config tree.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::debug;

use crate::registry::{IdSource, ListenerId, Slots, Subscription, invoke_isolated};

/// Shared handle to a listener closure.
///
/// Identity is the handle's allocation: clones of one `Handler` are the same
/// listener, two `Handler`s built from identical closures are not.
pub struct Handler<P> {
    callback: Rc<dyn Fn(&P) -> anyhow::Result<()>>,
}

impl<P> Handler<P> {
    pub fn new(callback: impl Fn(&P) -> anyhow::Result<()> + 'static) -> Self {
        Self {
            callback: Rc::new(callback),
        }
    }

    /// Same listener identity
    pub fn same(&self, other: &Handler<P>) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.callback), Rc::as_ptr(&other.callback))
    }

    fn call(&self, payload: &P) -> anyhow::Result<()> {
        (self.callback)(payload)
    }
}

impl<P> Clone for Handler<P> {
    fn clone(&self) -> Self {
        Self {
            callback: Rc::clone(&self.callback),
        }
    }
}

impl<P> fmt::Debug for Handler<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({:p})", Rc::as_ptr(&self.callback))
    }
}

type Registry<P> = RefCell<HashMap<String, Slots<Handler<P>>>>;

/// Event name → listener set.
///
/// Listener ids come from one counter per bus, so an id stays unique even
/// after its event was pruned and registered again.
pub struct EventBus<P: 'static = serde_json::Value> {
    events: Rc<Registry<P>>,
    ids: IdSource,
}

impl<P: 'static> EventBus<P> {
    pub fn new() -> Self {
        Self {
            events: Rc::new(RefCell::new(HashMap::new())),
            ids: IdSource::default(),
        }
    }

    /// Register `handler` for `event`.
    ///
    /// Registering a handle that is already listening on `event` keeps the
    /// single existing slot and returns a disposer for it.
    pub fn on(&self, event: &str, handler: Handler<P>) -> Subscription {
        let id = {
            let mut events = self.events.borrow_mut();
            let slots = events.entry(event.to_string()).or_insert_with(Slots::new);
            match slots.find(|existing| existing.same(&handler)) {
                Some(id) => {
                    debug!(event, listener = %id, "handler already registered");
                    id
                }
                None => {
                    let id = self.ids.next();
                    slots.insert(id, handler);
                    debug!(event, listener = %id, listeners = slots.len(), "listener registered");
                    id
                }
            }
        };

        let registry = Rc::downgrade(&self.events);
        let name = event.to_string();
        Subscription::new(id, move || remove_listener(&registry, &name, id))
    }

    /// Register `handler` for the next `event` only.
    ///
    /// The returned disposer removes the one-shot wrapper; disposing before
    /// the event fires means `handler` never runs.
    pub fn once(&self, event: &str, handler: Handler<P>) -> Subscription {
        let registry = Rc::downgrade(&self.events);
        let name = event.to_string();
        let own_id: Rc<Cell<Option<ListenerId>>> = Rc::new(Cell::new(None));
        let wrapper_id = Rc::clone(&own_id);

        let wrapper = Handler::new(move |payload: &P| {
            // Unregister first so a re-entrant emit from inside `handler`
            // cannot reach this wrapper again.
            match wrapper_id.take() {
                Some(id) => {
                    remove_listener(&registry, &name, id);
                    handler.call(payload)
                }
                None => Ok(()),
            }
        });

        let subscription = self.on(event, wrapper);
        own_id.set(Some(subscription.id()));
        subscription
    }

    /// Remove `handler` from `event`. Unknown events or handlers are ignored.
    pub fn off(&self, event: &str, handler: &Handler<P>) {
        let id = self
            .events
            .borrow()
            .get(event)
            .and_then(|slots| slots.find(|existing| existing.same(handler)));
        if let Some(id) = id {
            remove_listener(&Rc::downgrade(&self.events), event, id);
        }
    }

    /// Deliver `payload` to every listener currently registered for `event`.
    ///
    /// Listener faults are logged and skipped. Listeners added while the
    /// broadcast runs wait for the next `emit`; listeners removed before their
    /// turn are not called. Returns how many listeners ran.
    pub fn emit(&self, event: &str, payload: &P) -> usize {
        let ids = match self.events.borrow().get(event) {
            Some(slots) => slots.ids(),
            None => return 0,
        };

        let mut invoked = 0;
        for id in ids {
            let handler = self
                .events
                .borrow()
                .get(event)
                .and_then(|slots| slots.get(id))
                .cloned();
            let Some(handler) = handler else {
                continue;
            };
            invoked += 1;
            invoke_isolated("emit", event, id, || handler.call(payload));
        }
        invoked
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.events.borrow().get(event).map_or(0, Slots::len)
    }

    pub fn has_listeners(&self, event: &str) -> bool {
        self.listener_count(event) > 0
    }

    /// Events with at least one listener, sorted
    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.events.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}

impl<P: 'static> Default for EventBus<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: 'static> fmt::Debug for EventBus<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let events = self.events.borrow();
        let mut map = f.debug_map();
        for name in self.event_names() {
            map.entry(&name, &events.get(&name).map_or(0, Slots::len));
        }
        map.finish()
    }
}

/// Drop one slot, and the event entry with it once no listeners remain
fn remove_listener<P>(registry: &Weak<Registry<P>>, event: &str, id: ListenerId) {
    let Some(registry) = registry.upgrade() else {
        return;
    };
    let mut events = registry.borrow_mut();
    let Some(slots) = events.get_mut(event) else {
        return;
    };
    if slots.remove(id).is_some() {
        debug!(event, listener = %id, "listener removed");
    }
    if slots.is_empty() {
        events.remove(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> (Rc<Cell<usize>>, Handler<u32>) {
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        let handler = Handler::new(move |_: &u32| {
            seen.set(seen.get() + 1);
            Ok(())
        });
        (calls, handler)
    }

    #[test]
    fn test_emit_reaches_every_listener() {
        let bus: EventBus<u32> = EventBus::new();
        let total = Rc::new(Cell::new(0));
        for _ in 0..3 {
            let total = Rc::clone(&total);
            let _ = bus.on(
                "tick",
                Handler::new(move |n: &u32| {
                    total.set(total.get() + *n);
                    Ok(())
                }),
            );
        }

        assert_eq!(bus.emit("tick", &2), 3);
        assert_eq!(total.get(), 6);
    }

    #[test]
    fn test_emit_unknown_event_is_noop() {
        let bus: EventBus<u32> = EventBus::new();
        assert_eq!(bus.emit("nothing", &1), 0);
        assert!(bus.event_names().is_empty());
    }

    #[test]
    fn test_disposer_is_idempotent_and_targeted() {
        let bus: EventBus<u32> = EventBus::new();
        let (first_calls, first) = counter();
        let (second_calls, second) = counter();
        let first_sub = bus.on("tick", first);
        let _second_sub = bus.on("tick", second);

        first_sub.dispose();
        first_sub.dispose();
        bus.emit("tick", &0);

        assert_eq!(first_calls.get(), 0);
        assert_eq!(second_calls.get(), 1);
        assert_eq!(bus.listener_count("tick"), 1);
    }

    #[test]
    fn test_duplicate_registration_occupies_one_slot() {
        let bus: EventBus<u32> = EventBus::new();
        let (calls, handler) = counter();
        let a = bus.on("tick", handler.clone());
        let b = bus.on("tick", handler.clone());

        assert_eq!(a.id(), b.id());
        assert_eq!(bus.listener_count("tick"), 1);
        bus.emit("tick", &0);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_distinct_handles_are_distinct_listeners() {
        let bus: EventBus<u32> = EventBus::new();
        let calls = Rc::new(Cell::new(0));
        for _ in 0..2 {
            let calls = Rc::clone(&calls);
            let _ = bus.on(
                "tick",
                Handler::new(move |_: &u32| {
                    calls.set(calls.get() + 1);
                    Ok(())
                }),
            );
        }
        bus.emit("tick", &0);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_off_removes_and_prunes_event() {
        let bus: EventBus<u32> = EventBus::new();
        let (calls, handler) = counter();
        let _ = bus.on("tick", handler.clone());

        bus.off("tick", &handler);
        assert!(!bus.has_listeners("tick"));
        assert!(bus.event_names().is_empty());
        bus.emit("tick", &0);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_off_unknown_is_noop() {
        let bus: EventBus<u32> = EventBus::new();
        let (_, registered) = counter();
        let (_, stranger) = counter();
        let _ = bus.on("tick", registered);

        bus.off("missing", &stranger);
        bus.off("tick", &stranger);
        assert_eq!(bus.listener_count("tick"), 1);
    }

    #[test]
    fn test_once_fires_exactly_once() {
        let bus: EventBus<u32> = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let _ = bus.once(
            "loaded",
            Handler::new(move |n: &u32| {
                log.borrow_mut().push(*n);
                Ok(())
            }),
        );

        bus.emit("loaded", &1);
        bus.emit("loaded", &2);
        assert_eq!(*seen.borrow(), vec![1]);
        assert!(bus.event_names().is_empty());
    }

    #[test]
    fn test_once_disposed_before_emit_never_fires() {
        let bus: EventBus<u32> = EventBus::new();
        let (calls, handler) = counter();
        let subscription = bus.once("loaded", handler);

        subscription.dispose();
        bus.emit("loaded", &0);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_once_survives_reentrant_emit() {
        let bus: Rc<EventBus<u32>> = Rc::new(EventBus::new());
        let calls = Rc::new(Cell::new(0));
        let inner_bus = Rc::downgrade(&bus);
        let seen = Rc::clone(&calls);
        let _ = bus.once(
            "loaded",
            Handler::new(move |n: &u32| {
                seen.set(seen.get() + 1);
                if let Some(bus) = inner_bus.upgrade() {
                    bus.emit("loaded", &(n + 1));
                }
                Ok(())
            }),
        );

        bus.emit("loaded", &0);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_faulting_listener_does_not_stop_broadcast() {
        let bus: EventBus<u32> = EventBus::new();
        let _ = bus.on("tick", Handler::new(|_: &u32| Err(anyhow::anyhow!("listener failed"))));
        let _ = bus.on("tick", Handler::new(|_: &u32| panic!("listener panicked")));
        let (calls, handler) = counter();
        let _ = bus.on("tick", handler);

        assert_eq!(bus.emit("tick", &0), 3);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_listener_removed_mid_emit_is_skipped() {
        let bus: EventBus<u32> = EventBus::new();
        let victim_slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&victim_slot);
        let _ = bus.on(
            "tick",
            Handler::new(move |_: &u32| {
                if let Some(victim) = slot.borrow().as_ref() {
                    victim.dispose();
                }
                Ok(())
            }),
        );
        let (calls, victim) = counter();
        *victim_slot.borrow_mut() = Some(bus.on("tick", victim));

        assert_eq!(bus.emit("tick", &0), 1);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_listener_added_mid_emit_waits_for_next_emit() {
        let bus: Rc<EventBus<u32>> = Rc::new(EventBus::new());
        let (late_calls, late) = counter();
        let weak = Rc::downgrade(&bus);
        let _ = bus.once(
            "tick",
            Handler::new(move |_: &u32| {
                if let Some(bus) = weak.upgrade() {
                    let _ = bus.on("tick", late.clone());
                }
                Ok(())
            }),
        );

        bus.emit("tick", &0);
        assert_eq!(late_calls.get(), 0);
        bus.emit("tick", &0);
        assert_eq!(late_calls.get(), 1);
    }

    #[test]
    fn test_disposer_after_off_leaves_new_listener() {
        let bus: EventBus<u32> = EventBus::new();
        let (_, first) = counter();
        let (second_calls, second) = counter();
        let first_sub = bus.on("tick", first.clone());
        bus.off("tick", &first);
        let second_sub = bus.on("tick", second);

        first_sub.dispose();
        assert_ne!(first_sub.id(), second_sub.id());
        assert_eq!(bus.emit("tick", &0), 1);
        assert_eq!(second_calls.get(), 1);
    }

    #[test]
    fn test_fired_once_disposer_leaves_new_listener() {
        let bus: EventBus<u32> = EventBus::new();
        let (once_calls, once_handler) = counter();
        let once_sub = bus.once("loaded", once_handler);
        bus.emit("loaded", &0);
        assert_eq!(once_calls.get(), 1);

        let (calls, handler) = counter();
        let _sub = bus.on("loaded", handler);
        once_sub.dispose();

        assert_eq!(bus.listener_count("loaded"), 1);
        assert_eq!(bus.emit("loaded", &0), 1);
        assert_eq!(calls.get(), 1);
        assert_eq!(once_calls.get(), 1);
    }

    #[test]
    fn test_listeners_added_after_mid_emit_prune_wait_for_next_emit() {
        let bus: Rc<EventBus<u32>> = Rc::new(EventBus::new());
        let registered: Rc<RefCell<Vec<Subscription>>> = Rc::new(RefCell::new(Vec::new()));
        let (c_calls, c) = counter();
        let (d_calls, d) = counter();

        let weak = Rc::downgrade(&bus);
        let subs = Rc::clone(&registered);
        let clearer = Handler::new(move |_: &u32| {
            for sub in subs.borrow().iter() {
                sub.dispose();
            }
            if let Some(bus) = weak.upgrade() {
                let _ = bus.on("tick", c.clone());
                let _ = bus.on("tick", d.clone());
            }
            Ok(())
        });
        let (b_calls, b) = counter();
        let clearer_sub = bus.on("tick", clearer);
        let b_sub = bus.on("tick", b);
        registered.borrow_mut().extend([clearer_sub, b_sub]);

        assert_eq!(bus.emit("tick", &0), 1);
        assert_eq!(b_calls.get(), 0);
        assert_eq!(c_calls.get(), 0);
        assert_eq!(d_calls.get(), 0);

        assert_eq!(bus.emit("tick", &0), 2);
        assert_eq!(c_calls.get(), 1);
        assert_eq!(d_calls.get(), 1);
    }

    #[test]
    fn test_disposer_outliving_bus_is_harmless() {
        let bus: EventBus<u32> = EventBus::new();
        let (_, handler) = counter();
        let subscription = bus.on("tick", handler);
        drop(bus);
        subscription.dispose();
        assert!(subscription.is_disposed());
    }
}
