use std::{cell::RefCell, collections::HashMap};

use js_sys::Promise;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, Serializer};
use userscript_host::ValueChange;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use super::*;

type ChangeCallback = Closure<dyn FnMut(String, JsValue, JsValue, bool)>;

#[wasm_bindgen(inline_js = r#"
const GM = {
  getValue: typeof GM_getValue === 'function' ? GM_getValue : undefined,
  setValue: typeof GM_setValue === 'function' ? GM_setValue : undefined,
  deleteValue: typeof GM_deleteValue === 'function' ? GM_deleteValue : undefined,
  listValues: typeof GM_listValues === 'function' ? GM_listValues : undefined,
  addValueChangeListener:
    typeof GM_addValueChangeListener === 'function' ? GM_addValueChangeListener : undefined,
  removeValueChangeListener:
    typeof GM_removeValueChangeListener === 'function' ? GM_removeValueChangeListener : undefined,
  getTab: typeof GM_getTab === 'function' ? GM_getTab : undefined,
  saveTab: typeof GM_saveTab === 'function' ? GM_saveTab : undefined,
  info: typeof GM_info === 'object' ? GM_info : undefined,
};

function require(name) {
  const fn = GM[name];
  if (!fn) {
    throw new Error('GM_' + name + ' is not granted to this script');
  }
  return fn;
}

export function gmGetValue(key) {
  return GM.getValue ? GM.getValue(key, undefined) : undefined;
}
export function gmSetValue(key, value) { require('setValue')(key, value); }
export function gmDeleteValue(key) { require('deleteValue')(key); }
export function gmListValues() { return GM.listValues ? GM.listValues() : undefined; }

export function gmAddValueChangeListener(key, callback) {
  if (!GM.addValueChangeListener) {
    return undefined;
  }
  return GM.addValueChangeListener(key, (name, oldValue, newValue, remote) =>
    callback(name, oldValue, newValue, !!remote)
  );
}
export function gmRemoveValueChangeListener(id) {
  if (GM.removeValueChangeListener && id !== undefined) {
    GM.removeValueChangeListener(id);
  }
}

export function gmGetTab() {
  return new Promise((resolve, reject) => {
    if (!GM.getTab) {
      reject(new Error('GM_getTab is not granted to this script'));
      return;
    }
    GM.getTab((tab) => resolve(tab || {}));
  });
}
export function gmSaveTab(tab) { require('saveTab')(tab); }

export function gmScriptHandler() {
  return GM.info && typeof GM.info.scriptHandler === 'string' ? GM.info.scriptHandler : undefined;
}
"#)]
extern "C" {
    #[wasm_bindgen(js_name = gmGetValue)]
    fn gm_get_value(key: &str) -> JsValue;
    #[wasm_bindgen(catch, js_name = gmSetValue)]
    fn gm_set_value(key: &str, value: JsValue) -> Result<(), JsValue>;
    #[wasm_bindgen(catch, js_name = gmDeleteValue)]
    fn gm_delete_value(key: &str) -> Result<(), JsValue>;
    #[wasm_bindgen(js_name = gmListValues)]
    fn gm_list_values() -> JsValue;
    #[wasm_bindgen(js_name = gmAddValueChangeListener)]
    fn gm_add_value_change_listener(key: &str, callback: &ChangeCallback) -> JsValue;
    #[wasm_bindgen(js_name = gmRemoveValueChangeListener)]
    fn gm_remove_value_change_listener(id: JsValue);
    #[wasm_bindgen(js_name = gmGetTab)]
    fn gm_get_tab() -> Promise;
    #[wasm_bindgen(catch, js_name = gmSaveTab)]
    fn gm_save_tab(tab: JsValue) -> Result<(), JsValue>;
    #[wasm_bindgen(js_name = gmScriptHandler)]
    fn gm_script_handler() -> Option<String>;
}

struct Subscription {
    manager_id: JsValue,
    _callback: ChangeCallback,
}

thread_local! {
    static SUBSCRIPTIONS: RefCell<HashMap<u64, Subscription>> = RefCell::new(HashMap::new());
}

fn js_error_to_string(err: JsValue) -> String {
    if let Some(text) = err.as_string() {
        return text;
    }
    if let Ok(message) = js_sys::Reflect::get(&err, &JsValue::from_str("message")) {
        if let Some(text) = message.as_string() {
            return text;
        }
    }
    format!("{err:?}")
}

fn to_json(value: JsValue) -> Option<Value> {
    if value.is_undefined() {
        return None;
    }
    from_value(value).ok()
}

fn to_js(value: &Value) -> Result<JsValue, String> {
    value
        .serialize(&Serializer::json_compatible())
        .map_err(|e| e.to_string())
}

pub fn get_value(key: &str) -> Option<Value> {
    to_json(gm_get_value(key))
}

pub fn set_value(key: &str, value: &Value) -> Result<(), String> {
    gm_set_value(key, to_js(value)?).map_err(js_error_to_string)
}

pub fn delete_value(key: &str) -> Result<(), String> {
    gm_delete_value(key).map_err(js_error_to_string)
}

pub fn list_values() -> Option<Vec<String>> {
    let keys = gm_list_values();
    if keys.is_undefined() {
        return None;
    }
    from_value(keys).ok()
}

pub fn add_value_change_listener(handle: u64, key: &str, listener: ValueListener) {
    let callback: ChangeCallback =
        Closure::new(move |key: String, old: JsValue, new: JsValue, remote: bool| {
            listener(&ValueChange {
                key,
                old_value: to_json(old),
                new_value: to_json(new),
                remote,
            });
        });
    let manager_id = gm_add_value_change_listener(key, &callback);
    SUBSCRIPTIONS.with(|subscriptions| {
        subscriptions.borrow_mut().insert(
            handle,
            Subscription {
                manager_id,
                _callback: callback,
            },
        );
    });
}

pub fn remove_value_change_listener(handle: u64) {
    let removed = SUBSCRIPTIONS.with(|subscriptions| subscriptions.borrow_mut().remove(&handle));
    if let Some(subscription) = removed {
        gm_remove_value_change_listener(subscription.manager_id);
    }
}

pub async fn load_tab() -> Result<Value, String> {
    let tab = JsFuture::from(gm_get_tab())
        .await
        .map_err(js_error_to_string)?;
    Ok(to_json(tab).unwrap_or(Value::Null))
}

pub fn save_tab(tab: &Value) -> Result<(), String> {
    gm_save_tab(to_js(tab)?).map_err(js_error_to_string)
}

pub fn script_handler() -> Option<String> {
    gm_script_handler()
}
