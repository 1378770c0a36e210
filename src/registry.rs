//! Callback bookkeeping shared by the store and the event bus
//!
//! Both keep their callbacks in id-keyed slots, hand out a [`Subscription`]
//! per registration and run every callback through [`invoke_isolated`] so one
//! failing callback cannot break a broadcast.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use tracing::error;

/// Token identifying one registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out listener ids for one owner.
///
/// The counter outlives any single [`Slots`], so an id is never handed out
/// twice even after the slots that held it were dropped.
#[derive(Debug, Default)]
pub(crate) struct IdSource {
    next: Cell<u64>,
}

impl IdSource {
    pub(crate) fn next(&self) -> ListenerId {
        let id = self.next.get();
        self.next.set(id + 1);
        ListenerId(id)
    }
}

/// Id-keyed callback slots
pub(crate) struct Slots<T> {
    entries: BTreeMap<ListenerId, T>,
}

impl<T> Slots<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, id: ListenerId, entry: T) {
        self.entries.insert(id, entry);
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> Option<T> {
        self.entries.remove(&id)
    }

    pub(crate) fn get(&self, id: ListenerId) -> Option<&T> {
        self.entries.get(&id)
    }

    pub(crate) fn find(&self, mut predicate: impl FnMut(&T) -> bool) -> Option<ListenerId> {
        self.entries
            .iter()
            .find_map(|(id, entry)| predicate(entry).then_some(*id))
    }

    pub(crate) fn ids(&self) -> Vec<ListenerId> {
        self.entries.keys().copied().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Disposer for one registration.
///
/// Dropping it does nothing; the registration lives until [`dispose`]
/// is called or the owner removes it some other way.
///
/// [`dispose`]: Subscription::dispose
pub struct Subscription {
    id: ListenerId,
    remove: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Subscription {
    pub(crate) fn new(id: ListenerId, remove: impl FnOnce() + 'static) -> Self {
        Self {
            id,
            remove: RefCell::new(Some(Box::new(remove))),
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Remove the registration. Later calls are no-ops.
    pub fn dispose(&self) {
        let remove = self.remove.borrow_mut().take();
        if let Some(remove) = remove {
            remove();
        }
    }

    /// Whether `dispose` has already run on this handle
    pub fn is_disposed(&self) -> bool {
        self.remove.borrow().is_none()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Run one callback, containing both `Err` returns and panics.
///
/// Returns `true` when the callback completed normally.
pub(crate) fn invoke_isolated(
    operation: &'static str,
    channel: &str,
    id: ListenerId,
    call: impl FnOnce() -> anyhow::Result<()>,
) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            error!(operation, channel, listener = %id, error = ?err, "callback failed");
            false
        }
        Err(payload) => {
            let message = panic_message(&*payload);
            error!(operation, channel, listener = %id, panic = %message, "callback panicked");
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_slots_keep_ids_in_registration_order() {
        let ids = IdSource::default();
        let mut slots = Slots::new();
        let a = ids.next();
        slots.insert(a, "a");
        let b = ids.next();
        slots.insert(b, "b");
        assert_ne!(a, b);
        assert_eq!(slots.remove(a), Some("a"));
        let c = ids.next();
        slots.insert(c, "c");
        assert_eq!(slots.ids(), vec![b, c]);
        assert_eq!(slots.find(|entry| *entry == "c"), Some(c));
        assert_eq!(slots.len(), 2);
    }

    #[test]
    fn test_id_source_never_repeats_across_slots() {
        let ids = IdSource::default();
        let mut first = Slots::new();
        let old = ids.next();
        first.insert(old, ());
        drop(first);

        let mut second = Slots::new();
        let new = ids.next();
        second.insert(new, ());
        assert_ne!(old, new);
        assert_eq!(second.remove(old), None);
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn test_dispose_runs_once() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let subscription = Subscription::new(ListenerId(7), move || counter.set(counter.get() + 1));

        assert!(!subscription.is_disposed());
        subscription.dispose();
        subscription.dispose();
        assert_eq!(calls.get(), 1);
        assert!(subscription.is_disposed());
    }

    #[test]
    fn test_invoke_isolated_contains_errors_and_panics() {
        assert!(invoke_isolated("test", "ok", ListenerId(0), || Ok(())));
        assert!(!invoke_isolated("test", "err", ListenerId(1), || {
            Err(anyhow::anyhow!("boom"))
        }));
        assert!(!invoke_isolated("test", "panic", ListenerId(2), || panic!("boom")));
    }
}
