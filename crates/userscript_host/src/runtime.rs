//! Cooperative task scheduling contracts.
//!
//! Every execution context is single-threaded, so spawned work is `!Send` and runs on the
//! context's local executor. Hosts also provide a timer, used by the event channel to space out
//! writes that would otherwise be coalesced by the store's change detection.

use std::{cell::Cell, future::Future, pin::Pin, rc::Rc};

use futures::{
    executor::LocalSpawner,
    task::LocalSpawnExt,
};

/// Object-safe boxed future used by host service traits.
pub type HostFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Host service for spawning local tasks and waiting.
pub trait HostRuntime {
    /// Spawns `task` on the current context's executor.
    fn spawn_local(&self, task: HostFuture<'static, ()>);

    /// Resolves after roughly `ms` milliseconds.
    fn sleep_ms(&self, ms: u64) -> HostFuture<'static, ()>;
}

/// Runtime backed by a [`futures::executor::LocalPool`].
///
/// Sleeps resolve immediately; the requested durations are accumulated so tests can assert on
/// them.
#[derive(Clone)]
pub struct LocalPoolRuntime {
    spawner: LocalSpawner,
    slept_ms: Rc<Cell<u64>>,
    sleeps: Rc<Cell<u64>>,
}

impl LocalPoolRuntime {
    /// Creates a runtime that spawns onto the pool owning `spawner`.
    pub fn new(spawner: LocalSpawner) -> Self {
        Self {
            spawner,
            slept_ms: Rc::new(Cell::new(0)),
            sleeps: Rc::new(Cell::new(0)),
        }
    }

    /// Total milliseconds requested through [`HostRuntime::sleep_ms`].
    pub fn slept_ms(&self) -> u64 {
        self.slept_ms.get()
    }

    /// Number of [`HostRuntime::sleep_ms`] calls.
    pub fn sleep_count(&self) -> u64 {
        self.sleeps.get()
    }
}

impl HostRuntime for LocalPoolRuntime {
    fn spawn_local(&self, task: HostFuture<'static, ()>) {
        // Only fails once the pool is gone, at which point nothing could run the task anyway.
        let _ = self.spawner.spawn_local(task);
    }

    fn sleep_ms(&self, ms: u64) -> HostFuture<'static, ()> {
        self.slept_ms.set(self.slept_ms.get().saturating_add(ms));
        self.sleeps.set(self.sleeps.get() + 1);
        Box::pin(async {})
    }
}
