//! DomScanner: locate symbol occurrences in the document tree
//!
//! Read-only depth-first walk over text-bearing nodes. Script/style content,
//! editable regions, and the engine's own badge output are skipped, so
//! synthesized content is never re-scanned and annotation can never feed
//! itself. Sites come out in document order, left-to-right within a node -
//! the order the annotator needs to apply offsets safely.

use std::collections::{HashMap, HashSet};

use crate::engine::annotator::BADGE_ORIGIN_ATTR;
use crate::engine::dom::{DomTree, NodeId};
use crate::engine::index::SymbolIndex;

/// Element tags whose subtrees are never scanned.
pub const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "textarea"];

/// A located occurrence of a symbol in a specific text node. Transient:
/// produced by a scan, consumed immediately by the annotator.
#[derive(Debug, Clone)]
pub struct MatchSite {
    pub node: NodeId,
    pub start: usize,
    pub end: usize,
    /// Index into the symbol index's entry table.
    pub entry: usize,
    pub symbol: String,
}

/// Scan output: sites in document order, then offset order within a node.
#[derive(Debug, Default)]
pub struct ScanMatches {
    pub sites: Vec<MatchSite>,
}

impl ScanMatches {
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Symbol -> ordered sites. Nodes without matches have no entry.
    pub fn by_symbol(&self) -> HashMap<&str, Vec<&MatchSite>> {
        let mut map: HashMap<&str, Vec<&MatchSite>> = HashMap::new();
        for site in &self.sites {
            map.entry(site.symbol.as_str()).or_default().push(site);
        }
        map
    }
}

/// Full-document scan from the root.
pub fn find_matches(dom: &DomTree, index: &SymbolIndex) -> ScanMatches {
    let mut matches = ScanMatches::default();
    let mut seen = HashSet::new();
    scan_subtree(dom, index, dom.root(), &mut seen, &mut matches);
    matches
}

/// Incremental scan over a batch of added nodes. Batch roots nested inside
/// other batch roots are deduplicated so no text node is visited twice;
/// detached roots and roots inside skipped context are ignored.
pub fn find_matches_in(dom: &DomTree, index: &SymbolIndex, roots: &[NodeId]) -> ScanMatches {
    let mut matches = ScanMatches::default();
    let mut seen = HashSet::new();
    let root_set: HashSet<NodeId> = roots.iter().copied().collect();

    for &root in roots {
        if !dom.is_attached(root) {
            continue;
        }
        if has_batch_ancestor(dom, root, &root_set) {
            continue;
        }
        if in_skipped_context(dom, root) {
            continue;
        }
        scan_subtree(dom, index, root, &mut seen, &mut matches);
    }
    matches
}

fn scan_subtree(
    dom: &DomTree,
    index: &SymbolIndex,
    node: NodeId,
    seen: &mut HashSet<NodeId>,
    out: &mut ScanMatches,
) {
    if let Some(text) = dom.text(node) {
        if !seen.insert(node) {
            return;
        }
        for m in index.find_in(text) {
            out.sites.push(MatchSite {
                node,
                start: m.start,
                end: m.end,
                entry: m.entry,
                symbol: index.entry(m.entry).symbol.clone(),
            });
        }
        return;
    }

    if should_skip_element(dom, node) {
        return;
    }
    for &child in dom.children(node) {
        scan_subtree(dom, index, child, seen, out);
    }
}

/// Subtrees the scanner must not descend into.
fn should_skip_element(dom: &DomTree, node: NodeId) -> bool {
    if let Some(tag) = dom.tag(node) {
        if SKIPPED_TAGS.contains(&tag) {
            return true;
        }
    }
    if matches!(dom.attr(node, "contenteditable"), Some("") | Some("true")) {
        return true;
    }
    dom.has_attr(node, BADGE_ORIGIN_ATTR)
}

/// True if the node sits inside content the scanner would skip (checked for
/// incremental batch roots, whose context the walk itself never sees).
fn in_skipped_context(dom: &DomTree, node: NodeId) -> bool {
    let mut current = Some(node);
    while let Some(id) = current {
        if dom.is_element(id) && should_skip_element(dom, id) {
            return true;
        }
        current = dom.parent(id);
    }
    false
}

fn has_batch_ancestor(dom: &DomTree, node: NodeId, roots: &HashSet<NodeId>) -> bool {
    let mut current = dom.parent(node);
    while let Some(id) = current {
        if roots.contains(&id) {
            return true;
        }
        current = dom.parent(id);
    }
    false
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::{Category, Group};

    fn index_of(symbols: &[&str]) -> SymbolIndex {
        SymbolIndex::build(&[Group {
            name: "G".to_string(),
            icon_url: None,
            color: None,
            categories: vec![Category {
                name: "C".to_string(),
                symbols: symbols.iter().map(|s| s.to_string()).collect(),
                url: None,
            }],
        }])
        .unwrap()
    }

    fn append_paragraph(dom: &mut DomTree, text: &str) -> NodeId {
        let p = dom.create_element("p");
        let t = dom.create_text(text);
        dom.append_child(p, t);
        let root = dom.root();
        dom.append_child(root, p);
        t
    }

    #[test]
    fn test_document_order_and_offsets() {
        let mut dom = DomTree::new();
        let t1 = append_paragraph(&mut dom, "NVDA up, MSFT down");
        let t2 = append_paragraph(&mut dom, "more on GOOGL");
        let index = index_of(&["NVDA", "MSFT", "GOOGL"]);

        let matches = find_matches(&dom, &index);
        let found: Vec<(&str, NodeId)> = matches
            .sites
            .iter()
            .map(|s| (s.symbol.as_str(), s.node))
            .collect();
        assert_eq!(found, vec![("NVDA", t1), ("MSFT", t1), ("GOOGL", t2)]);
        assert_eq!(matches.sites[0].start, 0);
        assert_eq!(matches.sites[1].start, 9);
    }

    #[test]
    fn test_zero_match_nodes_yield_nothing() {
        let mut dom = DomTree::new();
        append_paragraph(&mut dom, "nothing to see");
        let index = index_of(&["NVDA"]);

        let matches = find_matches(&dom, &index);
        assert!(matches.is_empty());
        assert!(matches.by_symbol().is_empty());
    }

    #[test]
    fn test_skips_script_and_style_content() {
        let mut dom = DomTree::new();
        for tag in ["script", "style", "template", "textarea"] {
            let el = dom.create_element(tag);
            let t = dom.create_text("NVDA");
            dom.append_child(el, t);
            let root = dom.root();
            dom.append_child(root, el);
        }
        let index = index_of(&["NVDA"]);

        assert!(find_matches(&dom, &index).is_empty());
    }

    #[test]
    fn test_skips_editable_regions() {
        let mut dom = DomTree::new();
        let editor = dom.create_element("div");
        dom.set_attr(editor, "contenteditable", "true");
        let t = dom.create_text("NVDA");
        dom.append_child(editor, t);
        let root = dom.root();
        dom.append_child(root, editor);
        let index = index_of(&["NVDA"]);

        assert!(find_matches(&dom, &index).is_empty());
    }

    #[test]
    fn test_skips_badge_output() {
        let mut dom = DomTree::new();
        let badge = dom.create_element("span");
        dom.set_attr(badge, BADGE_ORIGIN_ATTR, "1");
        let t = dom.create_text("NVDA");
        dom.append_child(badge, t);
        let root = dom.root();
        dom.append_child(root, badge);
        let index = index_of(&["NVDA"]);

        assert!(find_matches(&dom, &index).is_empty());
    }

    #[test]
    fn test_incremental_scan_limited_to_batch() {
        let mut dom = DomTree::new();
        append_paragraph(&mut dom, "NVDA already here");
        let fresh = dom.create_element("p");
        let fresh_text = dom.create_text("GOOGL arrived");
        dom.append_child(fresh, fresh_text);
        let root = dom.root();
        dom.append_child(root, fresh);
        let index = index_of(&["NVDA", "GOOGL"]);

        let matches = find_matches_in(&dom, &index, &[fresh]);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches.sites[0].symbol, "GOOGL");
    }

    #[test]
    fn test_incremental_dedupes_nested_batch_roots() {
        let mut dom = DomTree::new();
        let outer = dom.create_element("div");
        let inner = dom.create_element("p");
        let t = dom.create_text("NVDA");
        dom.append_child(inner, t);
        dom.append_child(outer, inner);
        let root = dom.root();
        dom.append_child(root, outer);
        let index = index_of(&["NVDA"]);

        // Observer reports outer, inner, and the text node of one insertion
        let matches = find_matches_in(&dom, &index, &[outer, inner, t]);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_incremental_ignores_detached_roots() {
        let mut dom = DomTree::new();
        let t = dom.create_text("NVDA");
        let index = index_of(&["NVDA"]);

        assert!(find_matches_in(&dom, &index, &[t]).is_empty());
    }

    #[test]
    fn test_incremental_respects_skipped_context() {
        let mut dom = DomTree::new();
        let editor = dom.create_element("div");
        dom.set_attr(editor, "contenteditable", "");
        let root = dom.root();
        dom.append_child(root, editor);
        let t = dom.create_text("NVDA typed live");
        dom.append_child(editor, t);
        let index = index_of(&["NVDA"]);

        assert!(find_matches_in(&dom, &index, &[t]).is_empty());
    }

    #[test]
    fn test_by_symbol_mapping() {
        let mut dom = DomTree::new();
        append_paragraph(&mut dom, "NVDA and NVDA again, MSFT once");
        let index = index_of(&["NVDA", "MSFT"]);

        let matches = find_matches(&dom, &index);
        let map = matches.by_symbol();
        assert_eq!(map["NVDA"].len(), 2);
        assert_eq!(map["MSFT"].len(), 1);
    }
}
