//! Facts about the userscript manager running the script.

use crate::bridge;

/// Name of the userscript manager (`GM_info.scriptHandler`), such as `"Tampermonkey"`.
///
/// Returns `None` outside a manager or when `GM_info` is not exposed.
pub fn script_handler() -> Option<String> {
    bridge::script_handler()
}
