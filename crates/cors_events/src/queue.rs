//! Comma-joined queue of pending call ids and its compare-and-set updates.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use userscript_host::ValueStore;

use crate::{error::CorsError, keys::CallId};

/// Which end of the queue a listener services first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueOrder {
    /// Most recently appended id first. Matches the persisted behavior of existing scripts.
    #[default]
    Lifo,
    /// Oldest id first.
    Fifo,
}

/// Parsed queue value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallQueue {
    ids: Vec<CallId>,
}

impl CallQueue {
    /// Parses a stored queue. Empty segments and malformed ids are dropped.
    pub fn parse(value: Option<&Value>) -> Self {
        let ids = match value {
            Some(Value::String(raw)) => raw.split(',').filter_map(CallId::parse).collect(),
            _ => Vec::new(),
        };
        Self { ids }
    }

    /// Stored representation.
    pub fn to_value(&self) -> Value {
        Value::String(
            self.ids
                .iter()
                .map(CallId::as_str)
                .collect::<Vec<_>>()
                .join(","),
        )
    }

    /// Ids in append order.
    pub fn ids(&self) -> &[CallId] {
        &self.ids
    }

    /// Whether the queue holds no id.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Next id to service under `order`.
    pub fn next(&self, order: QueueOrder) -> Option<&CallId> {
        match order {
            QueueOrder::Lifo => self.ids.last(),
            QueueOrder::Fifo => self.ids.first(),
        }
    }

    /// Appends `id` at the tail.
    pub fn push(&mut self, id: CallId) {
        self.ids.push(id);
    }

    /// Removes every occurrence of `id`, returning whether one was present.
    pub fn remove(&mut self, id: &CallId) -> bool {
        let before = self.ids.len();
        self.ids.retain(|queued| queued != id);
        self.ids.len() != before
    }
}

/// Appends `id` to the queue stored at `key`.
///
/// # Errors
///
/// Returns [`CorsError::Store`] when a write fails and [`CorsError::QueueContention`] when every
/// attempt lost its compare-and-set.
pub fn append(
    store: &dyn ValueStore,
    key: &str,
    id: &CallId,
    attempts: u32,
) -> Result<(), CorsError> {
    update(store, key, attempts, |queue| {
        queue.push(id.clone());
        true
    })
    .map(|_| ())
}

/// Removes `id` from the queue stored at `key`, returning whether it was queued.
///
/// # Errors
///
/// Same as [`append`].
pub fn remove(
    store: &dyn ValueStore,
    key: &str,
    id: &CallId,
    attempts: u32,
) -> Result<bool, CorsError> {
    update(store, key, attempts, |queue| queue.remove(id))
}

fn update(
    store: &dyn ValueStore,
    key: &str,
    attempts: u32,
    edit: impl Fn(&mut CallQueue) -> bool,
) -> Result<bool, CorsError> {
    let attempts = attempts.max(1);
    for _ in 0..attempts {
        let current = store.get_value(key);
        let mut queue = CallQueue::parse(current.as_ref());
        if !edit(&mut queue) {
            return Ok(false);
        }
        if store
            .compare_and_set(key, current.as_ref(), queue.to_value())
            .map_err(CorsError::Store)?
        {
            return Ok(true);
        }
    }
    Err(CorsError::QueueContention {
        key: key.to_string(),
        attempts,
    })
}
