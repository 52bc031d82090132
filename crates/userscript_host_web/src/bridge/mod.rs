//! `GM_*` capability bridge used by the host adapters in this crate.
//!
//! Listener handles are allocated here rather than by the manager, so a subscription has a
//! stable id even when `GM_addValueChangeListener` is not granted.

mod interop;

use std::cell::Cell;

use serde_json::Value;
use userscript_host::ValueListener;

thread_local! {
    static NEXT_HANDLE: Cell<u64> = const { Cell::new(1) };
}

pub(crate) fn get_value(key: &str) -> Option<Value> {
    interop::get_value(key)
}

pub(crate) fn set_value(key: &str, value: &Value) -> Result<(), String> {
    interop::set_value(key, value)
}

pub(crate) fn delete_value(key: &str) -> Result<(), String> {
    interop::delete_value(key)
}

pub(crate) fn list_values() -> Option<Vec<String>> {
    interop::list_values()
}

pub(crate) fn add_value_change_listener(key: &str, listener: ValueListener) -> u64 {
    let handle = NEXT_HANDLE.with(|next| {
        let handle = next.get();
        next.set(handle + 1);
        handle
    });
    interop::add_value_change_listener(handle, key, listener);
    handle
}

pub(crate) fn remove_value_change_listener(handle: u64) {
    interop::remove_value_change_listener(handle)
}

pub(crate) async fn load_tab() -> Result<Value, String> {
    interop::load_tab().await
}

pub(crate) fn save_tab(tab: &Value) -> Result<(), String> {
    interop::save_tab(tab)
}

pub(crate) fn script_handler() -> Option<String> {
    interop::script_handler()
}
