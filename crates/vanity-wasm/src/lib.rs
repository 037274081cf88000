//! WebAssembly bindings for the vanity transaction ID miner.
//!
//! This crate provides JavaScript-accessible APIs for:
//! - Building envelopes and checking identifier patterns
//! - Step-driven mining over envelopes or a JS transaction builder
//! - Verifying the identifier a network reports after broadcast

use wasm_bindgen::prelude::*;

pub mod builder;
pub mod codec;
pub mod miner;
pub mod state;

// Re-export main types for JS access
pub use builder::JsTransactionBuilder;
pub use miner::{BuilderMiner, VanityMiner};

/// Initialize the WASM module with better panic messages.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Get the library version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
