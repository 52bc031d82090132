//! Tab identity contracts.
//!
//! Channel keys are namespaced by the id of the browser tab that owns them so that events never
//! cross between unrelated tabs. Frames inside one tab resolve the same id.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::runtime::HostFuture;

/// Identifier unique to one browser tab.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(String);

impl TabId {
    /// Wraps a raw tab identifier.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Host service resolving the id of the tab the caller runs in.
pub trait TabContext {
    /// Resolves the current tab id. The lookup is asynchronous on every real host.
    fn current_tab<'a>(&'a self) -> HostFuture<'a, Result<TabId, String>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Tab context that always resolves the same id. Used for tests and headless hosts.
pub struct FixedTabContext {
    tab: TabId,
}

impl FixedTabContext {
    /// Creates a context resolving `tab`.
    pub fn new(tab: impl Into<String>) -> Self {
        Self {
            tab: TabId::new(tab),
        }
    }
}

impl TabContext for FixedTabContext {
    fn current_tab<'a>(&'a self) -> HostFuture<'a, Result<TabId, String>> {
        let tab = self.tab.clone();
        Box::pin(async move { Ok(tab) })
    }
}
