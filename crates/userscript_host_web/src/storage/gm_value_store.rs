//! `GM_*`-backed value channel.

use serde_json::Value;
use userscript_host::{ListenerId, ValueListener, ValueStore};

use crate::bridge;

#[derive(Debug, Clone, Copy, Default)]
/// Value channel backed by the userscript manager's `GM_getValue` family.
///
/// Every frame of every tab running the script shares these values. Change listeners receive the
/// manager's `remote` flag unchanged. Without `GM_listValues`, [`ValueStore::list_keys`] reports
/// `None`.
pub struct GmValueStore;

impl ValueStore for GmValueStore {
    fn get_value(&self, key: &str) -> Option<Value> {
        bridge::get_value(key)
    }

    fn set_value(&self, key: &str, value: Value) -> Result<(), String> {
        bridge::set_value(key, &value)
    }

    fn delete_value(&self, key: &str) -> Result<(), String> {
        bridge::delete_value(key)
    }

    fn list_keys(&self) -> Option<Vec<String>> {
        bridge::list_values()
    }

    fn add_change_listener(&self, key: &str, listener: ValueListener) -> ListenerId {
        ListenerId(bridge::add_value_change_listener(key, listener))
    }

    fn remove_change_listener(&self, id: ListenerId) {
        bridge::remove_value_change_listener(id.0)
    }
}
