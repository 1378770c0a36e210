//! Application context handed to every component
//!
//! Built once at startup and cloned into the renderer, UI panels and input
//! handlers. Clones share the same store and bus.

use std::rc::Rc;
use tracing::info;

use crate::config::ConfigStore;
use crate::constants::events;
use crate::event_bus::{EventBus, Handler};
use crate::registry::Subscription;

#[derive(Clone, Default)]
pub struct AppContext {
    pub store: Rc<ConfigStore>,
    pub bus: Rc<EventBus>,
}

impl AppContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(store: ConfigStore) -> Self {
        Self {
            store: Rc::new(store),
            bus: Rc::new(EventBus::new()),
        }
    }

    /// Reset the store whenever a "reset requested" signal is emitted
    pub fn wire_reset_requests(&self) -> Subscription {
        let store = Rc::downgrade(&self.store);
        self.bus.on(
            events::RESET_REQUESTED,
            Handler::new(move |_: &serde_json::Value| {
                if let Some(store) = store.upgrade() {
                    info!("reset requested");
                    store.reset();
                }
                Ok(())
            }),
        )
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("store", &self.store)
            .field("bus", &self.bus)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::cell::Cell;

    #[test]
    fn test_clones_share_store_and_bus() {
        let ctx = AppContext::new();
        let panel = ctx.clone();

        panel.store.set("camera.exposure", 2.0).unwrap();
        assert_eq!(ctx.store.get_state().number("camera.exposure"), Some(2.0));
        assert!(Rc::ptr_eq(&ctx.bus, &panel.bus));
    }

    #[test]
    fn test_reset_request_resets_store() {
        let ctx = AppContext::new();
        let _wiring = ctx.wire_reset_requests();
        let resets = Rc::new(Cell::new(0));
        let counter = Rc::clone(&resets);
        let _renderer = ctx.store.subscribe(move |_| {
            counter.set(counter.get() + 1);
            Ok(())
        });

        ctx.store.set("bloom.strength", 5.0).unwrap();
        ctx.bus.emit(events::RESET_REQUESTED, &Value::Null);

        assert_eq!(resets.get(), 2);
        assert_eq!(ctx.store.get_state(), ctx.store.get_defaults());
    }
}
