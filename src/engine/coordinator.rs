//! MutationCoordinator: lifecycle and incremental scan orchestration
//!
//! Owns the active configuration, the compiled symbol index, and the debounce
//! timer, and drives the scan/annotate pipeline through a small state
//! machine:
//!
//!   Inactive -> Idle          activate (URL filter allows, index built)
//!   Idle -> ScanScheduled     mutation batch survives self-exclusion
//!   ScanScheduled -> Scanning pump with an elapsed debounce window
//!   Scanning -> Idle          incremental pass applied
//!
//! Mutation batches produced by the engine's own annotation are filtered out
//! before they can schedule anything, so annotate -> observe -> annotate
//! never loops. Configuration swaps build the replacement index before
//! touching the document; a failed build leaves the previous index and its
//! badges in place.

use instant::Instant;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;

use crate::engine::annotator::{
    self, DefaultIconPolicy, IconUrlPolicy, BADGE_ORIGIN_ATTR,
};
use crate::engine::config::Configuration;
use crate::engine::debounce::DebounceTimer;
use crate::engine::dom::{DomTree, NodeId};
use crate::engine::index::SymbolIndex;
use crate::engine::scanner::{find_matches, find_matches_in};
use crate::engine::urlfilter::is_active_for_url;

// =============================================================================
// State and stats
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No index loaded, or the URL filter excluded this page.
    Inactive,
    /// Active, nothing pending.
    Idle,
    /// A mutation batch is waiting for the debounce window.
    ScanScheduled,
    /// An incremental pass is being applied.
    Scanning,
}

impl EngineState {
    pub fn name(self) -> &'static str {
        match self {
            EngineState::Inactive => "inactive",
            EngineState::Idle => "idle",
            EngineState::ScanScheduled => "scan_scheduled",
            EngineState::Scanning => "scanning",
        }
    }
}

/// Counters exposed for diagnostics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineStats {
    pub full_scans: usize,
    pub incremental_scans: usize,
    pub badges_created: usize,
    pub badges_live: usize,
    pub mutation_batches: usize,
    pub batches_ignored: usize,
}

// =============================================================================
// MutationCoordinator
// =============================================================================

pub struct MutationCoordinator {
    state: EngineState,
    config: Option<Configuration>,
    index: Option<SymbolIndex>,
    policy: Box<dyn IconUrlPolicy>,
    debounce: DebounceTimer,
    pending: Vec<NodeId>,
    pending_set: HashSet<NodeId>,
    stats: EngineStats,
}

impl Default for MutationCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl MutationCoordinator {
    pub fn new() -> Self {
        Self::with_policy(Box::new(DefaultIconPolicy))
    }

    pub fn with_policy(policy: Box<dyn IconUrlPolicy>) -> Self {
        Self {
            state: EngineState::Inactive,
            config: None,
            index: None,
            policy,
            debounce: DebounceTimer::default(),
            pending: Vec::new(),
            pending_set: HashSet::new(),
            stats: EngineStats::default(),
        }
    }

    pub fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debounce = DebounceTimer::new(window);
        self
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn state_name(&self) -> &'static str {
        self.state.name()
    }

    pub fn is_active(&self) -> bool {
        self.state != EngineState::Inactive
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn badge_count(&self) -> usize {
        self.stats.badges_live
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Load a configuration and, if the URL filter allows this page, run the
    /// initial full scan. Returns the number of badges created.
    ///
    /// The replacement index is built before any badge is touched, so an
    /// index build failure leaves the document exactly as it was.
    pub fn activate(
        &mut self,
        dom: &mut DomTree,
        config: Configuration,
        url: &str,
        _now: Instant,
    ) -> Result<usize, String> {
        self.clear_pending();

        if !is_active_for_url(url, &config.url_filter) {
            let _ = annotator::teardown(dom);
            self.stats.badges_live = 0;
            self.config = Some(config);
            self.index = None;
            self.state = EngineState::Inactive;
            return Ok(0);
        }

        let index = SymbolIndex::build(&config.groups)?;

        annotator::teardown(dom);
        self.stats.badges_live = 0;

        let matches = find_matches(dom, &index);
        let created = annotator::annotate(dom, &matches, &index, self.policy.as_ref());

        self.stats.full_scans += 1;
        self.stats.badges_created += created;
        self.stats.badges_live = created;
        self.config = Some(config);
        self.index = Some(index);
        self.state = EngineState::Idle;
        Ok(created)
    }

    /// Swap in a new configuration: tear down the old badges, rebuild the
    /// index, rescan the whole document. Equivalent to a fresh `activate`
    /// with the same failure guarantee.
    pub fn reload_configuration(
        &mut self,
        dom: &mut DomTree,
        config: Configuration,
        url: &str,
        now: Instant,
    ) -> Result<usize, String> {
        self.activate(dom, config, url, now)
    }

    /// Remove every badge and return to `Inactive`. Returns the number of
    /// badges removed; the restored text is byte-identical to the original.
    pub fn deactivate(&mut self, dom: &mut DomTree) -> usize {
        self.clear_pending();
        let removed = annotator::teardown(dom);
        self.stats.badges_live = 0;
        self.index = None;
        self.state = EngineState::Inactive;
        removed
    }

    // -------------------------------------------------------------------------
    // Mutation intake
    // -------------------------------------------------------------------------

    /// Record a batch of nodes added to the document. Nodes the engine
    /// created itself (badge output, split text pieces) are dropped here;
    /// a batch with no page-originated nodes schedules nothing.
    pub fn record_mutations(&mut self, dom: &DomTree, added: &[NodeId], now: Instant) {
        if self.state == EngineState::Inactive || self.index.is_none() {
            return;
        }
        self.stats.mutation_batches += 1;

        let mut survived = false;
        for &node in added {
            if dom.is_engine_created(node)
                || dom.ancestor_or_self_has_attr(node, BADGE_ORIGIN_ATTR)
            {
                continue;
            }
            if self.pending_set.insert(node) {
                self.pending.push(node);
            }
            survived = true;
        }

        if survived {
            self.debounce.schedule(now);
            self.state = EngineState::ScanScheduled;
        } else {
            self.stats.batches_ignored += 1;
        }
    }

    /// Run the pending incremental scan if the debounce window has elapsed.
    /// Returns the number of badges created (0 when nothing fired).
    pub fn pump(&mut self, dom: &mut DomTree, now: Instant) -> usize {
        if self.state != EngineState::ScanScheduled || !self.debounce.fire(now) {
            return 0;
        }
        self.state = EngineState::Scanning;

        let roots = std::mem::take(&mut self.pending);
        self.pending_set.clear();

        let created = match &self.index {
            Some(index) => {
                let matches = find_matches_in(dom, index, &roots);
                annotator::annotate(dom, &matches, index, self.policy.as_ref())
            }
            None => 0,
        };

        self.stats.incremental_scans += 1;
        self.stats.badges_created += created;
        self.stats.badges_live += created;
        self.state = EngineState::Idle;
        created
    }

    fn clear_pending(&mut self) {
        self.debounce.cancel();
        self.pending.clear();
        self.pending_set.clear();
    }
}

// =============================================================================
// Tests
// =============================================================================
