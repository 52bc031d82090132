//! Target routing for `GM_*` calls.
//!
//! `wasm32` builds talk to the userscript manager; other builds get inert shims with the same
//! signatures so the adapters above compile and test everywhere.

use serde_json::Value;
use userscript_host::ValueListener;

#[cfg(not(target_arch = "wasm32"))]
mod non_wasm;
#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(not(target_arch = "wasm32"))]
use non_wasm as imp;
#[cfg(target_arch = "wasm32")]
use wasm as imp;

pub fn get_value(key: &str) -> Option<Value> {
    imp::get_value(key)
}

pub fn set_value(key: &str, value: &Value) -> Result<(), String> {
    imp::set_value(key, value)
}

pub fn delete_value(key: &str) -> Result<(), String> {
    imp::delete_value(key)
}

pub fn list_values() -> Option<Vec<String>> {
    imp::list_values()
}

pub fn add_value_change_listener(handle: u64, key: &str, listener: ValueListener) {
    imp::add_value_change_listener(handle, key, listener)
}

pub fn remove_value_change_listener(handle: u64) {
    imp::remove_value_change_listener(handle)
}

pub async fn load_tab() -> Result<Value, String> {
    imp::load_tab().await
}

pub fn save_tab(tab: &Value) -> Result<(), String> {
    imp::save_tab(tab)
}

pub fn script_handler() -> Option<String> {
    imp::script_handler()
}
