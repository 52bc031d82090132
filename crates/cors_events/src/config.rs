//! Emitter configuration.

use leptos::logging;
use serde::{Deserialize, Serialize};
use userscript_host::ValueStore;

use crate::queue::QueueOrder;

/// Store key holding an optional [`EmitterConfig`] override.
pub const EMITTER_CONFIG_KEY: &str = "cors.config";
/// Default pause between writing a result and flipping the call state.
pub const DEFAULT_COMPLETION_DELAY_MS: u64 = 100;
/// Default compare-and-set attempts for queue updates.
pub const DEFAULT_QUEUE_CAS_ATTEMPTS: u32 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// Tunables for [`crate::CorsEventEmitter`].
pub struct EmitterConfig {
    /// Pause between the `return` write and the `state` flip. Without it the host may coalesce
    /// the two writes and the caller misses the state change.
    pub completion_delay_ms: u64,
    /// End of the queue the listener services first.
    pub queue_order: QueueOrder,
    /// Compare-and-set attempts before a queue update is reported as contended.
    pub queue_cas_attempts: u32,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            completion_delay_ms: DEFAULT_COMPLETION_DELAY_MS,
            queue_order: QueueOrder::default(),
            queue_cas_attempts: DEFAULT_QUEUE_CAS_ATTEMPTS,
        }
    }
}

impl EmitterConfig {
    /// Loads the override stored under [`EMITTER_CONFIG_KEY`], falling back to defaults when it
    /// is absent or malformed.
    pub fn load_from(store: &dyn ValueStore) -> Self {
        let Some(raw) = store.get_value(EMITTER_CONFIG_KEY) else {
            return Self::default();
        };
        serde_json::from_value(raw).unwrap_or_else(|err| {
            logging::warn!("ignoring malformed `{EMITTER_CONFIG_KEY}`: {err}");
            Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use userscript_host::MemoryValueStore;

    use super::*;

    #[test]
    fn missing_config_uses_defaults() {
        let store = MemoryValueStore::default();
        let config = EmitterConfig::load_from(&store);
        assert_eq!(config, EmitterConfig::default());
        assert_eq!(config.completion_delay_ms, 100);
        assert_eq!(config.queue_order, QueueOrder::Lifo);
    }

    #[test]
    fn partial_override_keeps_remaining_defaults() {
        let store = MemoryValueStore::default();
        store
            .set_value(EMITTER_CONFIG_KEY, json!({"queue_order": "fifo"}))
            .expect("set");
        let config = EmitterConfig::load_from(&store);
        assert_eq!(
            config,
            EmitterConfig {
                queue_order: QueueOrder::Fifo,
                ..EmitterConfig::default()
            }
        );
    }

    #[test]
    fn malformed_override_falls_back_to_defaults() {
        let store = MemoryValueStore::default();
        store
            .set_value(EMITTER_CONFIG_KEY, json!({"completion_delay_ms": "soon"}))
            .expect("set");
        assert_eq!(EmitterConfig::load_from(&store), EmitterConfig::default());
    }
}
