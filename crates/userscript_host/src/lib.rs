//! Typed host contracts shared by the userscript runtime and its browser adapters.
//!
//! This crate is the API-first boundary for the userscript manager's services. It exposes the
//! persisted value channel, tab identity lookup, task scheduling and time helpers as traits plus
//! in-memory implementations. The concrete `GM_*` bindings live in `userscript_host_web`.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

pub mod runtime;
pub mod storage;
pub mod tab;
pub mod time;

pub use runtime::{HostFuture, HostRuntime, LocalPoolRuntime};
pub use storage::value_store::{
    ListenerId, MemoryValueStore, NoopValueStore, ValueChange, ValueListener, ValueStore,
};
pub use tab::{FixedTabContext, TabContext, TabId};
pub use time::next_monotonic_timestamp_ms;
