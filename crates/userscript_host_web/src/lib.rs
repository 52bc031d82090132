//! Userscript-manager implementations of [`userscript_host`] service contracts.
//!
//! The adapters here call the manager's `GM_*` API through a small inline JS bridge:
//! - [`GmValueStore`] for the persisted value channel and its change listeners
//! - [`GmTabContext`] for per-tab identity
//! - [`WasmRuntime`] for local task spawning and timers
//! - [`script_handler`] for `GM_info`
//!
//! Builds for targets other than `wasm32` link against inert shims so dependents still compile
//! and test natively.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

mod bridge;
pub mod runtime;
pub mod script_info;
pub mod storage;
pub mod tab;

pub use runtime::WasmRuntime;
pub use script_info::script_handler;
pub use storage::gm_value_store::GmValueStore;
pub use tab::{resolve_tab_id, GmTabContext, GmTabStore, TabStore, TAB_ID_FIELD};
