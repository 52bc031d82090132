//! Persisted settings store of the userscript.
//!
//! The whole store lives under one value-store key as a JSON object. Loading fills in missing
//! fields from defaults; every update is written back immediately so other tabs pick it up.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

pub mod defaults;
pub mod error;
pub mod store;

pub use defaults::defaults_deep;
pub use error::StoreError;
pub use store::{LogLevel, PanelPosition, ScriptLocalStorage, ScriptStore, STORE_KEY};
