//! BadgeCore: Symbol Detection + Badge Annotation Engine
//!
//! A Rust/WASM engine that finds configured ticker symbols in page text and
//! rewrites each occurrence into an inline badge, keeping up with dynamic
//! content through debounced incremental scans.
//!
//! # Architecture
//!
//! - `config.rs` - Configuration parsing (groups, categories, URL filter)
//! - `index.rs` - SymbolIndex: Aho-Corasick alphabet with word-bounded matching
//! - `dom.rs` - Arena document tree, the engine's only view of the page
//! - `scanner.rs` - DomScanner: full and incremental match discovery
//! - `annotator.rs` - BadgeAnnotator: text-node splicing, chips, tooltips
//! - `urlfilter.rs` - Whitelist/blacklist page activation
//! - `debounce.rs` - Deadline timer coalescing mutation bursts
//! - `coordinator.rs` - MutationCoordinator: lifecycle state machine
//! - `wasm.rs` - BadgeEngine: the JS-facing facade
//!
//! # Usage (WASM)
//! ```javascript,ignore
//! import init, { BadgeEngine } from 'badgecore';
//!
//! await init();
//!
//! const engine = new BadgeEngine();
//! engine.loadDocument(snapshotOf(document.body));
//! engine.activate(config, location.href);
//!
//! observer = new MutationObserver((records) => {
//!   engine.recordMutations(idsOf(records));
//! });
//! setInterval(() => engine.pump(), 50);
//! ```

pub mod engine;

pub use engine::*;

use wasm_bindgen::prelude::*;

// When the `wee_alloc` feature is enabled, use `wee_alloc` as the global
// allocator for smaller WASM bundle size.
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Get version information
#[wasm_bindgen]
pub fn version() -> String {
    format!("badgecore v{}", env!("CARGO_PKG_VERSION"))
}
