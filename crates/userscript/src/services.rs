//! Wiring of host adapters into the emitter and the script store.

use std::rc::Rc;

use cors_events::{sweep_stale_keys, CorsEventEmitter, EmitterConfig, SweepReport};
use script_store::ScriptStore;
use userscript_host::{HostRuntime, TabContext, ValueStore};

#[derive(Clone)]
/// Host adapters the script runs on.
pub struct HostServices {
    /// Persisted value channel shared by every tab and frame.
    pub store: Rc<dyn ValueStore>,
    /// Current tab lookup.
    pub tabs: Rc<dyn TabContext>,
    /// Task spawning and timers.
    pub runtime: Rc<dyn HostRuntime>,
}

#[derive(Clone)]
/// Services available to the rest of the script after [`boot`].
pub struct ScriptServices {
    /// Options the script was started with.
    pub options: Rc<crate::StartOptions>,
    /// Cross-frame event emitter for this context.
    pub emitter: CorsEventEmitter,
    /// Persisted script store, following writes from other tabs.
    pub store: ScriptStore,
    host: HostServices,
}

impl ScriptServices {
    /// Deletes call records and queues abandoned by earlier page sessions.
    pub fn sweep_stale_keys(&self) -> SweepReport {
        sweep_stale_keys(self.host.store.as_ref())
    }

    /// Host adapters backing these services.
    pub fn host(&self) -> &HostServices {
        &self.host
    }
}

/// Builds the emitter and the script store over `host`.
///
/// The emitter configuration is read from the value channel. Nothing is written during boot.
pub fn boot(host: HostServices, options: crate::StartOptions) -> ScriptServices {
    let config = EmitterConfig::load_from(host.store.as_ref());
    let emitter = CorsEventEmitter::new(
        Rc::clone(&host.store),
        Rc::clone(&host.tabs),
        Rc::clone(&host.runtime),
        config,
    );
    let store = ScriptStore::load(Rc::clone(&host.store), options.default_setting.clone());
    store.follow_remote_changes();
    ScriptServices {
        options: Rc::new(options),
        emitter,
        store,
        host,
    }
}
