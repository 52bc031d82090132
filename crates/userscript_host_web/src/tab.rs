//! Tab identity resolved through `GM_getTab` / `GM_saveTab`.

use std::{cell::RefCell, rc::Rc};

use futures::future::{FutureExt, Shared};
use serde_json::{Map, Value};
use userscript_host::{HostFuture, TabContext, TabId};
use uuid::Uuid;

use crate::bridge;

/// Field of the manager's per-tab object holding the tab id.
pub const TAB_ID_FIELD: &str = "tabId";

/// Reads the tab id from a `GM_getTab` object.
///
/// When the object carries no usable id, a fresh 32-character id is generated and the updated
/// object is returned so it can be saved back.
pub fn resolve_tab_id(tab: Value) -> (TabId, Option<Value>) {
    let mut fields = match tab {
        Value::Object(fields) => fields,
        _ => Map::new(),
    };
    if let Some(Value::String(id)) = fields.get(TAB_ID_FIELD) {
        if !id.is_empty() {
            return (TabId::new(id.clone()), None);
        }
    }
    let id = Uuid::new_v4().simple().to_string();
    fields.insert(TAB_ID_FIELD.to_string(), Value::String(id.clone()));
    (TabId::new(id), Some(Value::Object(fields)))
}

/// Storage of the manager's per-tab object.
pub trait TabStore {
    /// Loads the object for the current tab; `{}` when nothing was saved yet.
    fn load_tab(&self) -> HostFuture<'static, Result<Value, String>>;

    /// Replaces the object for the current tab.
    fn save_tab(&self, tab: &Value) -> Result<(), String>;
}

#[derive(Debug, Clone, Copy, Default)]
/// [`TabStore`] backed by `GM_getTab` / `GM_saveTab`.
pub struct GmTabStore;

impl TabStore for GmTabStore {
    fn load_tab(&self) -> HostFuture<'static, Result<Value, String>> {
        Box::pin(bridge::load_tab())
    }

    fn save_tab(&self, tab: &Value) -> Result<(), String> {
        bridge::save_tab(tab)
    }
}

type TabLookup = Shared<HostFuture<'static, Result<TabId, String>>>;

/// Tab context backed by the userscript manager's per-tab object.
///
/// Every lookup in one context shares the first one, including lookups started while it is
/// still in flight, so a missing id is minted and saved once. A failed lookup is retried by the
/// next caller.
#[derive(Clone)]
pub struct GmTabContext {
    store: Rc<dyn TabStore>,
    lookup: Rc<RefCell<Option<TabLookup>>>,
}

impl Default for GmTabContext {
    fn default() -> Self {
        Self::with_store(Rc::new(GmTabStore))
    }
}

impl GmTabContext {
    /// Creates a context over `GM_getTab` / `GM_saveTab`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context over another tab object store.
    pub fn with_store(store: Rc<dyn TabStore>) -> Self {
        Self {
            store,
            lookup: Rc::new(RefCell::new(None)),
        }
    }

    fn start_lookup(&self) -> TabLookup {
        let store = Rc::clone(&self.store);
        let lookup: HostFuture<'static, Result<TabId, String>> = Box::pin(async move {
            let (tab, updated) = resolve_tab_id(store.load_tab().await?);
            if let Some(updated) = updated {
                store.save_tab(&updated)?;
            }
            Ok(tab)
        });
        lookup.shared()
    }
}

impl TabContext for GmTabContext {
    fn current_tab<'a>(&'a self) -> HostFuture<'a, Result<TabId, String>> {
        let lookup = self
            .lookup
            .borrow_mut()
            .get_or_insert_with(|| self.start_lookup())
            .clone();
        let cache = Rc::clone(&self.lookup);
        Box::pin(async move {
            let result = lookup.clone().await;
            if result.is_err() {
                let mut cached = cache.borrow_mut();
                if cached.as_ref().is_some_and(|current| current.ptr_eq(&lookup)) {
                    *cached = None;
                }
            }
            result
        })
    }
}
