use super::*;

fn unsupported() -> String {
    "Userscript manager APIs are only available when compiled for wasm32".to_string()
}

pub fn get_value(_key: &str) -> Option<Value> {
    None
}

pub fn set_value(_key: &str, _value: &Value) -> Result<(), String> {
    Ok(())
}

pub fn delete_value(_key: &str) -> Result<(), String> {
    Ok(())
}

pub fn list_values() -> Option<Vec<String>> {
    None
}

pub fn add_value_change_listener(_handle: u64, _key: &str, _listener: ValueListener) {}

pub fn remove_value_change_listener(_handle: u64) {}

pub async fn load_tab() -> Result<Value, String> {
    Err(unsupported())
}

pub fn save_tab(_tab: &Value) -> Result<(), String> {
    Err(unsupported())
}

pub fn script_handler() -> Option<String> {
    None
}
