//! Log stamps.
//!
//! Entries appended to the persisted panel log are ordered by their stamp, so stamps handed out
//! by one context never repeat or go backwards even when the wall clock does.

use std::cell::Cell;

thread_local! {
    static LAST_STAMP_MS: Cell<u64> = const { Cell::new(0) };
}

fn wall_clock_ms() -> u64 {
    #[cfg(target_arch = "wasm32")]
    {
        js_sys::Date::now().max(0.0) as u64
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis() as u64)
    }
}

/// Next log stamp in unix milliseconds: the wall clock, bumped past the previous stamp.
pub fn next_monotonic_timestamp_ms() -> u64 {
    let wall = wall_clock_ms();
    LAST_STAMP_MS.with(|last| {
        let stamp = wall.max(last.get().saturating_add(1));
        last.set(stamp);
        stamp
    })
}
