//! Startup garbage collection of call records and queues abandoned by earlier page sessions.
//!
//! The sweep is best effort and not transactional: records of calls still in flight in other
//! open tabs match the same patterns and are removed too.

use userscript_host::ValueStore;

use crate::keys::{is_generated_tab_id, CallKey, QueueKey};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Outcome of [`sweep_stale_keys`].
pub struct SweepReport {
    /// `false` when the store cannot enumerate keys; nothing was inspected then.
    pub enumeration_supported: bool,
    /// Deleted `_temp_.event.<id>.<slot>` keys.
    pub removed_call_keys: Vec<String>,
    /// Deleted `<tab>.cors.events.<name>` keys.
    pub removed_queue_keys: Vec<String>,
    /// Matching keys whose deletion failed.
    pub failed_keys: Vec<String>,
}

impl SweepReport {
    /// Total number of deleted keys.
    pub fn removed(&self) -> usize {
        self.removed_call_keys.len() + self.removed_queue_keys.len()
    }
}

enum StaleKind {
    Call,
    Queue,
}

fn classify(key: &str) -> Option<StaleKind> {
    if CallKey::parse(key).is_some() {
        return Some(StaleKind::Call);
    }
    QueueKey::parse(key)
        .filter(|queue| is_generated_tab_id(queue.tab.as_str()))
        .map(|_| StaleKind::Queue)
}

/// Deletes every call-record key and every generated-tab queue key in `store`.
pub fn sweep_stale_keys(store: &dyn ValueStore) -> SweepReport {
    let Some(keys) = store.list_keys() else {
        return SweepReport::default();
    };

    let mut report = SweepReport {
        enumeration_supported: true,
        ..SweepReport::default()
    };
    for key in keys {
        let Some(kind) = classify(&key) else {
            continue;
        };
        if store.delete_value(&key).is_err() {
            report.failed_keys.push(key);
            continue;
        }
        match kind {
            StaleKind::Call => report.removed_call_keys.push(key),
            StaleKind::Queue => report.removed_queue_keys.push(key),
        }
    }
    report
}
