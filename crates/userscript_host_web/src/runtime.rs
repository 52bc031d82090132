//! Browser task scheduling.

use gloo_timers::future::TimeoutFuture;
use userscript_host::{HostFuture, HostRuntime};

#[derive(Debug, Clone, Copy, Default)]
/// Runtime spawning onto the page's microtask queue and sleeping with `setTimeout`.
pub struct WasmRuntime;

impl HostRuntime for WasmRuntime {
    fn spawn_local(&self, task: HostFuture<'static, ()>) {
        wasm_bindgen_futures::spawn_local(task);
    }

    fn sleep_ms(&self, ms: u64) -> HostFuture<'static, ()> {
        let ms = u32::try_from(ms).unwrap_or(u32::MAX);
        Box::pin(TimeoutFuture::new(ms))
    }
}
