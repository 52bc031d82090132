//! Persisted key/value channel contracts and in-memory adapters.
//!
//! The userscript manager exposes one string-keyed store shared by every tab and frame running
//! the script, plus per-key change listeners that report whether a write came from another
//! execution context. [`ValueStore`] captures exactly that surface.

use std::{
    cell::RefCell,
    collections::BTreeMap,
    fmt,
    rc::Rc,
};

use serde_json::Value;

/// Identifier returned by [`ValueStore::add_change_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Change notification delivered to a [`ValueListener`].
#[derive(Debug, Clone, PartialEq)]
pub struct ValueChange {
    /// Key whose value changed.
    pub key: String,
    /// Value before the write, `None` when the key was absent.
    pub old_value: Option<Value>,
    /// Value after the write, `None` when the key was deleted.
    pub new_value: Option<Value>,
    /// `true` when the write happened in a different execution context than the listener's.
    pub remote: bool,
}

/// Callback invoked for every change of a subscribed key.
pub type ValueListener = Box<dyn Fn(&ValueChange)>;

/// Host service for the shared persisted value channel.
///
/// Reads are synchronous, matching the userscript manager API. Writes report failures as strings
/// like the rest of the host layer.
pub trait ValueStore {
    /// Reads the value stored under `key`.
    fn get_value(&self, key: &str) -> Option<Value>;

    /// Stores `value` under `key`, notifying listeners when the value changed.
    fn set_value(&self, key: &str, value: Value) -> Result<(), String>;

    /// Deletes `key`, notifying listeners when a value was present.
    fn delete_value(&self, key: &str) -> Result<(), String>;

    /// Lists every key currently present, or `None` when the host cannot enumerate keys.
    fn list_keys(&self) -> Option<Vec<String>>;

    /// Subscribes `listener` to changes of `key`.
    fn add_change_listener(&self, key: &str, listener: ValueListener) -> ListenerId;

    /// Cancels a subscription. Unknown ids are ignored.
    fn remove_change_listener(&self, id: ListenerId);

    /// Writes `value` only when the current value equals `expected`.
    ///
    /// Returns `Ok(false)` without writing when the comparison fails. The default implementation
    /// is a read-compare-write, which is atomic with respect to the calling context only.
    fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&Value>,
        value: Value,
    ) -> Result<bool, String> {
        if self.get_value(key).as_ref() != expected {
            return Ok(false);
        }
        self.set_value(key, value)?;
        Ok(true)
    }
}

#[derive(Debug, Clone, Copy, Default)]
/// No-op value store for unsupported targets and baseline tests.
pub struct NoopValueStore;

impl ValueStore for NoopValueStore {
    fn get_value(&self, _key: &str) -> Option<Value> {
        None
    }

    fn set_value(&self, _key: &str, _value: Value) -> Result<(), String> {
        Ok(())
    }

    fn delete_value(&self, _key: &str) -> Result<(), String> {
        Ok(())
    }

    fn list_keys(&self) -> Option<Vec<String>> {
        None
    }

    fn add_change_listener(&self, _key: &str, _listener: ValueListener) -> ListenerId {
        ListenerId(0)
    }

    fn remove_change_listener(&self, _id: ListenerId) {}
}

struct Registration {
    key: String,
    context: u64,
    listener: Rc<dyn Fn(&ValueChange)>,
}

#[derive(Default)]
struct MemoryBus {
    values: BTreeMap<String, Value>,
    listeners: BTreeMap<u64, Registration>,
    next_listener: u64,
    next_context: u64,
}

/// In-memory value channel shared by any number of simulated execution contexts.
///
/// Every handle belongs to one context. [`MemoryValueStore::open_context`] returns a handle onto
/// the same values for a new context, so a write through one handle reaches the other handle's
/// listeners with `remote == true`. Listeners run synchronously after the write, outside of any
/// internal borrow, so they may read and write the store themselves.
#[derive(Clone)]
pub struct MemoryValueStore {
    bus: Rc<RefCell<MemoryBus>>,
    context: u64,
}

impl fmt::Debug for MemoryValueStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bus = self.bus.borrow();
        f.debug_struct("MemoryValueStore")
            .field("context", &self.context)
            .field("values", &bus.values)
            .field("listeners", &bus.listeners.len())
            .finish()
    }
}

impl Default for MemoryValueStore {
    fn default() -> Self {
        let bus = MemoryBus {
            next_context: 1,
            next_listener: 1,
            ..MemoryBus::default()
        };
        Self {
            bus: Rc::new(RefCell::new(bus)),
            context: 0,
        }
    }
}

impl MemoryValueStore {
    /// Returns a handle onto the same values for a new execution context.
    pub fn open_context(&self) -> Self {
        let mut bus = self.bus.borrow_mut();
        let context = bus.next_context;
        bus.next_context += 1;
        Self {
            bus: Rc::clone(&self.bus),
            context,
        }
    }

    /// Identifier of the execution context this handle writes as.
    pub fn context_id(&self) -> u64 {
        self.context
    }

    /// Number of live change listeners across all contexts.
    pub fn listener_count(&self) -> usize {
        self.bus.borrow().listeners.len()
    }

    /// Number of live change listeners subscribed to `key`.
    pub fn listener_count_for(&self, key: &str) -> usize {
        self.bus
            .borrow()
            .listeners
            .values()
            .filter(|registration| registration.key == key)
            .count()
    }

    fn write(&self, key: &str, value: Option<Value>) {
        let (old_value, listeners) = {
            let mut bus = self.bus.borrow_mut();
            let old_value = match &value {
                Some(value) => bus.values.insert(key.to_string(), value.clone()),
                None => bus.values.remove(key),
            };
            if old_value == value {
                return;
            }
            let listeners = bus
                .listeners
                .values()
                .filter(|registration| registration.key == key)
                .map(|registration| (registration.context, Rc::clone(&registration.listener)))
                .collect::<Vec<_>>();
            (old_value, listeners)
        };

        for (context, listener) in listeners {
            listener(&ValueChange {
                key: key.to_string(),
                old_value: old_value.clone(),
                new_value: value.clone(),
                remote: context != self.context,
            });
        }
    }
}

impl ValueStore for MemoryValueStore {
    fn get_value(&self, key: &str) -> Option<Value> {
        self.bus.borrow().values.get(key).cloned()
    }

    fn set_value(&self, key: &str, value: Value) -> Result<(), String> {
        self.write(key, Some(value));
        Ok(())
    }

    fn delete_value(&self, key: &str) -> Result<(), String> {
        self.write(key, None);
        Ok(())
    }

    fn list_keys(&self) -> Option<Vec<String>> {
        Some(self.bus.borrow().values.keys().cloned().collect())
    }

    fn add_change_listener(&self, key: &str, listener: ValueListener) -> ListenerId {
        let mut bus = self.bus.borrow_mut();
        let id = bus.next_listener;
        bus.next_listener += 1;
        bus.listeners.insert(
            id,
            Registration {
                key: key.to_string(),
                context: self.context,
                listener: Rc::from(listener),
            },
        );
        ListenerId(id)
    }

    fn remove_change_listener(&self, id: ListenerId) {
        // Dropping the registration outside the borrow lets listener captures touch the store.
        let removed = self.bus.borrow_mut().listeners.remove(&id.0);
        drop(removed);
    }

    fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&Value>,
        value: Value,
    ) -> Result<bool, String> {
        if self.bus.borrow().values.get(key) != expected {
            return Ok(false);
        }
        self.write(key, Some(value));
        Ok(true)
    }
}
