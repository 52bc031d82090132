use std::{cell::RefCell, rc::Rc};

use leptos::logging;
use userscript_host_web::{script_handler, GmTabContext, GmValueStore, WasmRuntime};
use wasm_bindgen::{closure::Closure, JsCast};

use crate::{boot, HostServices, ScriptServices, StartOptions};

thread_local! {
    static RUNNING: RefCell<Option<ScriptServices>> = const { RefCell::new(None) };
}

/// Host adapters backed by the userscript manager.
pub fn userscript_host_services() -> HostServices {
    HostServices {
        store: Rc::new(GmValueStore),
        tabs: Rc::new(GmTabContext::new()),
        runtime: Rc::new(WasmRuntime),
    }
}

/// Services of the running script, once [`start`] has been called.
pub fn running() -> Option<ScriptServices> {
    RUNNING.with(|running| running.borrow().clone())
}

/// Boots the script in the current frame. Calling it again returns the running services.
pub fn start(style: &str) -> ScriptServices {
    if let Some(services) = running() {
        return services;
    }
    console_error_panic_hook::set_once();

    let options = StartOptions::for_handler(script_handler().as_deref()).with_style(style);
    let services = boot(userscript_host_services(), options);
    RUNNING.with(|running| *running.borrow_mut() = Some(services.clone()));
    sweep_after_load(services.clone());
    services
}

fn sweep_after_load(services: ScriptServices) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let sweep = move || {
        let report = services.sweep_stale_keys();
        if !report.failed_keys.is_empty() {
            logging::warn!("could not delete stale keys: {:?}", report.failed_keys);
        }
    };

    let loaded = window
        .document()
        .is_some_and(|document| document.ready_state() == "complete");
    if loaded {
        sweep();
        return;
    }
    let handler = Closure::once_into_js(sweep);
    if let Err(err) = window.add_event_listener_with_callback("load", handler.unchecked_ref()) {
        logging::warn!("could not schedule stale key sweep: {err:?}");
    }
}
