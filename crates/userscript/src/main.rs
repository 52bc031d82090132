//! Binary entrypoint for the userscript bundle.

#[cfg(all(target_arch = "wasm32", feature = "csr"))]
fn main() {
    userscript::start("");
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    eprintln!(
        "This binary is intended for the userscript/WASM workflow. Build `userscript_app` for wasm32 with the `csr` feature and bundle it into the userscript."
    );
}

#[cfg(all(target_arch = "wasm32", not(feature = "csr")))]
fn main() {}
