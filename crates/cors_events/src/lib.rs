//! Cross-tab/cross-origin event channel for userscripts.
//!
//! Two execution contexts that share nothing but the userscript manager's persisted value store
//! exchange request/response calls through [`CorsEventEmitter`]. The store is reached through
//! the [`userscript_host::ValueStore`] contract, so the protocol runs unchanged over the `GM_*`
//! bindings in a browser and over [`userscript_host::MemoryValueStore`] in tests.
//!
//! - [`keys`] builds and parses every persisted key.
//! - [`queue`] maintains the per-tab queue of pending call ids.
//! - [`sweep`] removes records abandoned by previous page sessions.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

pub mod config;
pub mod emitter;
pub mod error;
pub mod keys;
pub mod queue;
pub mod state;
pub mod sweep;

pub use config::{EmitterConfig, EMITTER_CONFIG_KEY};
pub use emitter::{CallReply, CorsEventEmitter, EventHandler, PendingCall};
pub use error::CorsError;
pub use keys::{CallId, CallKey, CallSlot, EventName, QueueKey};
pub use queue::{CallQueue, QueueOrder};
pub use state::CallState;
pub use sweep::{sweep_stale_keys, SweepReport};
