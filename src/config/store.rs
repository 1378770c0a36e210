//! Reactive config store
//!
//! Holds the live config tree next to an immutable copy of its defaults.
//! Every mutation broadcasts a fresh [`Snapshot`] of the whole tree to all
//! subscribers before the mutating call returns.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, info, warn};

use crate::config::path::ConfigPath;
use crate::config::schema::ViewerConfig;
use crate::config::value::{ConfigValue, Group, Snapshot, assign, copy_group, lookup};
use crate::error::StoreError;
use crate::registry::{IdSource, Slots, Subscription, invoke_isolated};

type Subscriber = Rc<dyn Fn(&Snapshot) -> anyhow::Result<()>>;
type SubscriberSlots = RefCell<Slots<Subscriber>>;

/// Path-addressable config tree with change notification.
///
/// Callers only ever see deep copies of the tree; nothing handed out aliases
/// the store's own nodes.
pub struct ConfigStore {
    defaults: Group,
    state: RefCell<Group>,
    subscribers: Rc<SubscriberSlots>,
    ids: IdSource,
}

impl ConfigStore {
    /// Store seeded with the [`ViewerConfig`] defaults
    pub fn new() -> Self {
        Self::with_defaults(ViewerConfig::default().to_tree())
    }

    /// Store whose defaults are `defaults`; the live state starts as a copy
    pub fn with_defaults(defaults: Group) -> Self {
        let state = copy_group(&defaults);
        Self {
            defaults,
            state: RefCell::new(state),
            subscribers: Rc::new(RefCell::new(Slots::new())),
            ids: IdSource::default(),
        }
    }

    pub fn get_state(&self) -> Snapshot {
        Snapshot::copy_of(&self.state.borrow())
    }

    pub fn get_defaults(&self) -> Snapshot {
        Snapshot::copy_of(&self.defaults)
    }

    /// Copy of the node at `path`, `None` if nothing lives there
    pub fn get<T>(&self, path: T) -> Option<ConfigValue>
    where
        T: TryInto<ConfigPath, Error = StoreError>,
    {
        let path = path.try_into().ok()?;
        lookup(&self.state.borrow(), &path).map(ConfigValue::deep_copy)
    }

    /// Register `callback` for a snapshot after every future mutation
    pub fn subscribe(
        &self,
        callback: impl Fn(&Snapshot) -> anyhow::Result<()> + 'static,
    ) -> Subscription {
        let callback: Subscriber = Rc::new(callback);
        let id = self.ids.next();
        let count = {
            let mut subscribers = self.subscribers.borrow_mut();
            subscribers.insert(id, callback);
            subscribers.len()
        };
        debug!(subscriber = %id, subscribers = count, "config subscriber registered");

        let subscribers: Weak<SubscriberSlots> = Rc::downgrade(&self.subscribers);
        Subscription::new(id, move || {
            let Some(subscribers) = subscribers.upgrade() else {
                return;
            };
            if subscribers.borrow_mut().remove(id).is_some() {
                debug!(subscriber = %id, "config subscriber removed");
            }
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    /// Assign `value` at `path` and broadcast.
    ///
    /// Missing groups along the path are created. Whatever sat at `path`
    /// before is replaced, groups included. Invalid paths, and paths that
    /// run through an existing leaf, fail without mutating or notifying.
    pub fn set<T>(&self, path: T, value: impl Into<ConfigValue>) -> Result<(), StoreError>
    where
        T: TryInto<ConfigPath, Error = StoreError>,
    {
        let path = path.try_into()?;
        let value = value.into();
        {
            let mut state = self.state.borrow_mut();
            let previous = assign(&mut state, &path, value)?;
            if previous.as_ref().is_some_and(ConfigValue::is_group) {
                warn!(path = %path, "group node overwritten");
            }
        }
        debug!(path = %path, "config value set");
        self.broadcast("set");
        Ok(())
    }

    /// Apply several assignments as one mutation with a single broadcast.
    ///
    /// Either every assignment lands or none does.
    pub fn set_many<I, T, V>(&self, assignments: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = (T, V)>,
        T: TryInto<ConfigPath, Error = StoreError>,
        V: Into<ConfigValue>,
    {
        let mut scratch = copy_group(&self.state.borrow());
        let mut applied = 0usize;
        for (path, value) in assignments {
            let path = path.try_into()?;
            let previous = assign(&mut scratch, &path, value.into())?;
            if previous.as_ref().is_some_and(ConfigValue::is_group) {
                warn!(path = %path, "group node overwritten");
            }
            applied += 1;
        }
        if applied == 0 {
            return Ok(());
        }
        *self.state.borrow_mut() = scratch;
        debug!(assignments = applied, "config values set");
        self.broadcast("set_many");
        Ok(())
    }

    /// Replace the whole state with a copy of the defaults, broadcast it, and
    /// hand the same snapshot back
    pub fn reset(&self) -> Snapshot {
        *self.state.borrow_mut() = copy_group(&self.defaults);
        info!("config reset to defaults");
        self.broadcast("reset")
    }

    /// Restore the subtree at `path` from the defaults and broadcast
    pub fn reset_path<T>(&self, path: T) -> Result<(), StoreError>
    where
        T: TryInto<ConfigPath, Error = StoreError>,
    {
        let path = path.try_into()?;
        let default = lookup(&self.defaults, &path)
            .map(ConfigValue::deep_copy)
            .ok_or_else(|| StoreError::NoDefault {
                path: path.to_string(),
            })?;
        assign(&mut self.state.borrow_mut(), &path, default)?;
        info!(path = %path, "config subtree reset to defaults");
        self.broadcast("reset_path");
        Ok(())
    }

    /// Notify every current subscriber with one post-mutation snapshot.
    ///
    /// No borrow of the tree or the registry is held while a subscriber runs,
    /// so subscribers may read, write or unsubscribe from inside the callback.
    fn broadcast(&self, operation: &'static str) -> Snapshot {
        let snapshot = self.get_state();
        let ids = self.subscribers.borrow().ids();
        for id in ids {
            let subscriber = self.subscribers.borrow().get(id).cloned();
            let Some(subscriber) = subscriber else {
                continue;
            };
            invoke_isolated(operation, "config", id, || subscriber(&snapshot));
        }
        snapshot
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigStore")
            .field("state", &self.state.borrow())
            .field("subscribers", &self.subscriber_count())
            .finish_non_exhaustive()
    }
}
