//! WASM boundary for the badge engine.
//!
//! The content script feeds the engine a document snapshot, forwards
//! MutationObserver batches as raw node ids, and pumps the debounce clock
//! from its own timer. All JsValue conversion and console reporting lives
//! here; the native modules stay `Result<_, String>` and browser-free.

use wasm_bindgen::prelude::*;

use instant::Instant;

use crate::engine::config::Configuration;
use crate::engine::coordinator::MutationCoordinator;
use crate::engine::dom::{DomTree, NodeId, NodeSpec};

#[wasm_bindgen]
pub struct BadgeEngine {
    dom: DomTree,
    coordinator: MutationCoordinator,
}

#[wasm_bindgen]
impl BadgeEngine {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        BadgeEngine {
            dom: DomTree::new(),
            coordinator: MutationCoordinator::new(),
        }
    }

    /// Replace the engine's document with a snapshot of the page.
    #[wasm_bindgen(js_name = loadDocument)]
    pub fn load_document(&mut self, snapshot: JsValue) -> Result<(), JsValue> {
        let spec: NodeSpec = serde_wasm_bindgen::from_value(snapshot)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        self.dom = DomTree::from_spec(&spec);
        Ok(())
    }

    /// Mirror a page-side insertion: build the subtree and append it under
    /// `parent_id`. Returns the new subtree's root id for the observer glue.
    #[wasm_bindgen(js_name = appendNode)]
    pub fn append_node(&mut self, parent_id: usize, snapshot: JsValue) -> Result<usize, JsValue> {
        let spec: NodeSpec = serde_wasm_bindgen::from_value(snapshot)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        let node = self.dom.build_spec(&spec);
        self.dom.append_child(NodeId::from_index(parent_id), node);
        Ok(node.index())
    }

    /// Load a configuration and run the initial full scan if the URL filter
    /// allows this page. Returns the number of badges created.
    #[wasm_bindgen]
    pub fn activate(&mut self, config: JsValue, url: &str) -> Result<usize, JsValue> {
        let value: serde_json::Value = serde_wasm_bindgen::from_value(config)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        let config = Configuration::from_value(&value);
        self.coordinator
            .activate(&mut self.dom, config, url, Instant::now())
            .map_err(|e| {
                web_sys::console::error_1(&format!("[BadgeEngine] activate failed: {}", e).into());
                JsValue::from_str(&e)
            })
    }

    /// Swap in a new configuration and rescan. On failure the previous
    /// configuration and its badges stay live.
    #[wasm_bindgen(js_name = reloadConfiguration)]
    pub fn reload_configuration(&mut self, config: JsValue, url: &str) -> Result<usize, JsValue> {
        let value: serde_json::Value = serde_wasm_bindgen::from_value(config)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        let config = Configuration::from_value(&value);
        self.coordinator
            .reload_configuration(&mut self.dom, config, url, Instant::now())
            .map_err(|e| {
                web_sys::console::error_1(&format!("[BadgeEngine] reload failed: {}", e).into());
                JsValue::from_str(&e)
            })
    }

    /// Remove all badges and restore the original text. Returns the number
    /// of badges removed.
    #[wasm_bindgen]
    pub fn deactivate(&mut self) -> usize {
        self.coordinator.deactivate(&mut self.dom)
    }

    /// Forward a MutationObserver batch of added node ids.
    #[wasm_bindgen(js_name = recordMutations)]
    pub fn record_mutations(&mut self, added: Vec<usize>) {
        let nodes: Vec<NodeId> = added.into_iter().map(NodeId::from_index).collect();
        self.coordinator
            .record_mutations(&self.dom, &nodes, Instant::now());
    }

    /// Run the pending incremental scan if the debounce window has elapsed.
    /// The content script calls this from its timer. Returns badges created.
    #[wasm_bindgen]
    pub fn pump(&mut self) -> usize {
        self.coordinator.pump(&mut self.dom, Instant::now())
    }

    #[wasm_bindgen(js_name = badgeCount)]
    pub fn badge_count(&self) -> usize {
        self.coordinator.badge_count()
    }

    #[wasm_bindgen(js_name = stateName)]
    pub fn state_name(&self) -> String {
        self.coordinator.state_name().to_string()
    }

    #[wasm_bindgen(js_name = isActive)]
    pub fn is_active(&self) -> bool {
        self.coordinator.is_active()
    }

    /// Snapshot the engine's document, badges included, for the glue layer
    /// to diff against the page.
    #[wasm_bindgen(js_name = exportDocument)]
    pub fn export_document(&self) -> Result<JsValue, JsValue> {
        let spec = self.dom.to_spec(self.dom.root());
        serde_wasm_bindgen::to_value(&spec).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Diagnostic counters as a plain JS object.
    #[wasm_bindgen(js_name = getStats)]
    pub fn get_stats(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(self.coordinator.stats())
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }
}

impl Default for BadgeEngine {
    fn default() -> Self {
        Self::new()
    }
}
