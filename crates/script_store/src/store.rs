//! Script store loading, mutation and persistence.

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::{Rc, Weak},
};

use leptos::logging;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};
use userscript_host::{next_monotonic_timestamp_ms, ListenerId, ValueChange, ValueStore};

use crate::{defaults::defaults_deep, error::StoreError};

/// Value-store key holding the persisted script store.
pub const STORE_KEY: &str = "store";

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
/// Top-left corner of the floating panel in CSS pixels.
pub struct PanelPosition {
    /// Horizontal offset.
    pub x: f64,
    /// Vertical offset.
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Severity of a persisted log entry.
pub enum LogLevel {
    /// Diagnostic detail.
    Debug,
    /// Normal progress.
    Info,
    /// Recoverable problem.
    Warn,
    /// Failure.
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Persisted part of the script store.
///
/// Fields this version does not know about are kept in `extra` and written back untouched.
pub struct ScriptLocalStorage {
    /// Panel log, oldest first.
    pub logs: Vec<Value>,
    /// Answers collected by work automation.
    pub work_results: Vec<Value>,
    /// Whether the panel is collapsed.
    pub hide: bool,
    /// Panel position.
    pub position: PanelPosition,
    /// User settings, merged over the script's defaults at load time.
    pub setting: Value,
    /// Unrecognized fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn local_storage_defaults() -> Value {
    json!({
        "logs": [],
        "workResults": [],
        "hide": false,
        "position": { "x": 0.0, "y": 0.0 },
    })
}

/// Builds the in-memory store from the persisted document and the setting defaults.
fn hydrate(raw: Option<Value>, default_setting: &Value) -> ScriptLocalStorage {
    let mut document = match raw {
        Some(Value::Object(map)) => Value::Object(map),
        Some(other) => {
            logging::warn!("ignoring non-object `{STORE_KEY}` value: {other}");
            json!({})
        }
        None => json!({}),
    };
    defaults_deep(&mut document, &local_storage_defaults());

    let mut setting = document
        .get_mut("setting")
        .map(Value::take)
        .filter(Value::is_object)
        .unwrap_or_else(|| json!({}));
    defaults_deep(&mut setting, default_setting);
    if let Value::Object(map) = &mut document {
        map.insert("setting".to_string(), setting.clone());
    }

    serde_json::from_value(document).unwrap_or_else(|err| {
        logging::warn!("persisted `{STORE_KEY}` is malformed, starting from defaults: {err}");
        let mut fresh = local_storage_defaults();
        if let Value::Object(map) = &mut fresh {
            map.insert("setting".to_string(), setting);
        }
        serde_json::from_value(fresh).unwrap_or(ScriptLocalStorage {
            logs: Vec::new(),
            work_results: Vec::new(),
            hide: false,
            position: PanelPosition::default(),
            setting: default_setting.clone(),
            extra: Map::new(),
        })
    })
}

struct StoreInner {
    store: Rc<dyn ValueStore>,
    default_setting: Value,
    local: RefCell<ScriptLocalStorage>,
    follower: Cell<Option<ListenerId>>,
}

/// Shared handle to the script store. Clones see the same state.
#[derive(Clone)]
pub struct ScriptStore {
    inner: Rc<StoreInner>,
}

impl fmt::Debug for ScriptStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptStore")
            .field("local", &self.inner.local.borrow())
            .field("following", &self.inner.follower.get().is_some())
            .finish()
    }
}

impl ScriptStore {
    /// Loads the store from `store`, filling missing fields and settings from defaults.
    ///
    /// Nothing is written until the first [`Self::update`].
    pub fn load(store: Rc<dyn ValueStore>, default_setting: Value) -> Self {
        let local = hydrate(store.get_value(STORE_KEY), &default_setting);
        Self {
            inner: Rc::new(StoreInner {
                store,
                default_setting,
                local: RefCell::new(local),
                follower: Cell::new(None),
            }),
        }
    }

    /// Version of the script embedding this store.
    pub fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Returns a copy of the current state.
    pub fn snapshot(&self) -> ScriptLocalStorage {
        self.inner.local.borrow().clone()
    }

    /// Reads the current state without copying it.
    pub fn with<R>(&self, read: impl FnOnce(&ScriptLocalStorage) -> R) -> R {
        read(&self.inner.local.borrow())
    }

    /// Deserializes the settings into a typed view.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialize`] when the settings do not match `T`.
    pub fn setting<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        let setting = self.inner.local.borrow().setting.clone();
        Ok(serde_json::from_value(setting)?)
    }

    /// Applies `edit` and persists the result when anything changed.
    ///
    /// # Errors
    ///
    /// Returns an error when the new state cannot be serialized or written. The in-memory state
    /// keeps the edit either way.
    pub fn update<R>(
        &self,
        edit: impl FnOnce(&mut ScriptLocalStorage) -> R,
    ) -> Result<R, StoreError> {
        let (result, document) = {
            let mut local = self.inner.local.borrow_mut();
            let before = local.clone();
            let result = edit(&mut local);
            if *local == before {
                return Ok(result);
            }
            (result, serde_json::to_value(&*local)?)
        };
        self.inner
            .store
            .set_value(STORE_KEY, document)
            .map_err(StoreError::Store)?;
        Ok(result)
    }

    /// Appends a timestamped entry to the panel log and persists it.
    ///
    /// # Errors
    ///
    /// Same as [`Self::update`].
    pub fn append_log(&self, level: LogLevel, text: impl Into<String>) -> Result<(), StoreError> {
        let entry = json!({
            "level": level,
            "time": next_monotonic_timestamp_ms(),
            "text": text.into(),
        });
        self.update(|local| local.logs.push(entry))
    }

    /// Reloads the state whenever another context rewrites the persisted store.
    ///
    /// Idempotent; returns the id of the underlying subscription.
    pub fn follow_remote_changes(&self) -> ListenerId {
        if let Some(id) = self.inner.follower.get() {
            return id;
        }
        let weak: Weak<StoreInner> = Rc::downgrade(&self.inner);
        let id = self.inner.store.add_change_listener(
            STORE_KEY,
            Box::new(move |change: &ValueChange| {
                if !change.remote {
                    return;
                }
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let reloaded = hydrate(change.new_value.clone(), &inner.default_setting);
                *inner.local.borrow_mut() = reloaded;
            }),
        );
        self.inner.follower.set(Some(id));
        id
    }

    /// Stops following remote changes. Returns whether a subscription was active.
    pub fn stop_following(&self) -> bool {
        match self.inner.follower.take() {
            Some(id) => {
                self.inner.store.remove_change_listener(id);
                true
            }
            None => false,
        }
    }
}
