//! Start options and update-page selection.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Script page on Greasy Fork, used when running under Tampermonkey.
pub const GREASY_FORK_PAGE: &str = "https://greasyfork.org/zh-CN/scripts/481438";
/// Script page on ScriptCat, used under every other manager.
pub const SCRIPT_CAT_PAGE: &str = "https://scriptcat.org/zh-CN/script-show-page/1398";
/// Panel opened when the user has not picked one yet.
pub const DEFAULT_PANEL_NAME: &str = "common.guide";

/// Returns the page users should visit for updates under the given userscript manager.
pub fn update_page_for(script_handler: Option<&str>) -> &'static str {
    match script_handler {
        Some("Tampermonkey") => GREASY_FORK_PAGE,
        _ => SCRIPT_CAT_PAGE,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Options handed to the entry bootstrap.
pub struct StartOptions {
    /// Stylesheet injected with the panel.
    pub style: String,
    /// Panel shown first.
    pub default_panel_name: String,
    /// Where update notices link to.
    pub update_page: String,
    /// Settings used for any field missing from the persisted store.
    pub default_setting: Value,
}

impl StartOptions {
    /// Options for a script running under `script_handler`, with an empty style and settings.
    pub fn for_handler(script_handler: Option<&str>) -> Self {
        Self {
            style: String::new(),
            default_panel_name: DEFAULT_PANEL_NAME.to_string(),
            update_page: update_page_for(script_handler).to_string(),
            default_setting: json!({}),
        }
    }

    /// Replaces the injected stylesheet.
    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    /// Replaces the default settings.
    pub fn with_default_setting(mut self, default_setting: Value) -> Self {
        self.default_setting = default_setting;
        self
    }
}
