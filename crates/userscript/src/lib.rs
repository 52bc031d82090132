//! Entry bootstrap for the userscript.
//!
//! [`boot`] wires host adapters into the cross-frame event emitter and the persisted script
//! store. Browser builds with the `csr` feature also get `start`, which uses the userscript
//! manager's adapters and clears stale channel keys once the page has loaded.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

pub mod options;
pub mod services;
#[cfg(all(feature = "csr", target_arch = "wasm32"))]
mod web;

pub use options::{
    update_page_for, StartOptions, DEFAULT_PANEL_NAME, GREASY_FORK_PAGE, SCRIPT_CAT_PAGE,
};
pub use services::{boot, HostServices, ScriptServices};
#[cfg(all(feature = "csr", target_arch = "wasm32"))]
pub use web::{running, start, userscript_host_services};
