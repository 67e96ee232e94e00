//! Symbol badge engine
//!
//! Pipeline: configuration -> symbol index -> scan -> annotate, driven by
//! the mutation coordinator. `dom` is the capability layer the whole
//! pipeline runs on; `wasm` is the only module that touches the JS boundary.

pub mod annotator;
pub mod config;
pub mod coordinator;
pub mod debounce;
pub mod dom;
pub mod index;
pub mod scanner;
pub mod urlfilter;
pub mod wasm;

pub use annotator::{
    annotate, teardown, DefaultIconPolicy, IconUrlPolicy, BADGE_ORIGIN_ATTR, BADGE_SOURCE_ATTR,
    BADGE_SYMBOL_ATTR, BADGE_TAG,
};
pub use config::{
    Category, Configuration, FilterMode, Group, PatternKind, UrlFilterConfig, UrlPattern,
};
pub use coordinator::{EngineState, EngineStats, MutationCoordinator};
pub use debounce::{DebounceTimer, DEFAULT_DEBOUNCE_MS};
pub use dom::{DomTree, NodeId, NodeKind, NodeSpec};
pub use index::{CategoryRef, OwnerGroup, SymbolEntry, SymbolIndex, TextMatch};
pub use scanner::{find_matches, find_matches_in, MatchSite, ScanMatches, SKIPPED_TAGS};
pub use urlfilter::is_active_for_url;
pub use wasm::BadgeEngine;

#[cfg(test)]
mod tests;
