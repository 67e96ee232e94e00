//! BadgeAnnotator: rewrite matched text runs into badge elements
//!
//! Each match site splits its text node into text-before / badge /
//! text-after, spliced in a single pass per node so earlier insertions never
//! invalidate later offsets. The badge keeps the matched text verbatim as a
//! text child (copy/paste and accessibility stay intact) and as a source
//! attribute, which is what teardown restores.
//!
//! Idempotence comes from the scanner: badge output carries
//! `BADGE_ORIGIN_ATTR` and is never scanned again. The annotator does not
//! re-check the live tree.

use crate::engine::dom::{DomTree, NodeId};
use crate::engine::index::{OwnerGroup, SymbolIndex};
use crate::engine::scanner::{MatchSite, ScanMatches};

pub const BADGE_TAG: &str = "span";
/// Matched symbol, as rendered on the badge element.
pub const BADGE_SYMBOL_ATTR: &str = "data-badge-symbol";
/// Marks every synthesized element; checked by the scanner and the
/// coordinator's mutation self-exclusion.
pub const BADGE_ORIGIN_ATTR: &str = "data-badge-origin";
/// Original text the badge replaced; teardown restores it bit-for-bit.
pub const BADGE_SOURCE_ATTR: &str = "data-badge-source";

const CHIP_CLASS: &str = "badge-chip";
const TOOLTIP_CLASS: &str = "badge-tooltip";
const TOOLTIP_GROUP_CLASS: &str = "badge-tooltip-group";

// =============================================================================
// Icon URL policy (external collaborator)
// =============================================================================

/// Decides icon-vs-color-only rendering. Never fatal to annotation.
pub trait IconUrlPolicy {
    fn is_trusted_image_url(&self, url: &str) -> bool;
}

/// Default policy: https only, recognized image extension.
#[derive(Debug, Default)]
pub struct DefaultIconPolicy;

const ALLOWED_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "webp", "ico"];

impl IconUrlPolicy for DefaultIconPolicy {
    fn is_trusted_image_url(&self, url: &str) -> bool {
        let Some(rest) = url.strip_prefix("https://") else {
            return false;
        };
        if rest.is_empty() || rest.starts_with('/') {
            return false;
        }
        let path = rest
            .split(|c| c == '?' || c == '#')
            .next()
            .unwrap_or("");
        match path.rsplit_once('.') {
            Some((_, ext)) => ALLOWED_IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()),
            None => false,
        }
    }
}

// =============================================================================
// Annotation
// =============================================================================

/// Apply match sites to the tree. Returns the number of badges created.
/// Sites whose node detached (or changed shape) between scan and annotate
/// are skipped without error.
pub fn annotate(
    dom: &mut DomTree,
    matches: &ScanMatches,
    index: &SymbolIndex,
    policy: &dyn IconUrlPolicy,
) -> usize {
    let mut created = 0;

    // Sites arrive in document order, so per-node runs are contiguous.
    let sites = &matches.sites;
    let mut i = 0;
    while i < sites.len() {
        let node = sites[i].node;
        let mut j = i;
        while j < sites.len() && sites[j].node == node {
            j += 1;
        }
        created += annotate_node(dom, &sites[i..j], index, policy);
        i = j;
    }

    created
}

/// Rebuild one text node as [text][badge][text]... and splice it in.
fn annotate_node(
    dom: &mut DomTree,
    sites: &[MatchSite],
    index: &SymbolIndex,
    policy: &dyn IconUrlPolicy,
) -> usize {
    let node = sites[0].node;
    if !dom.is_attached(node) {
        return 0;
    }
    let Some(text) = dom.text(node).map(str::to_string) else {
        return 0;
    };

    let mut pieces: Vec<NodeId> = Vec::new();
    let mut cursor = 0;
    let mut created = 0;

    for site in sites {
        // Offsets no longer line up with the live content: skip the site.
        if site.start < cursor || site.end > text.len() || site.start >= site.end {
            continue;
        }
        if site.start > cursor {
            pieces.push(new_text(dom, &text[cursor..site.start]));
        }
        let owners = index.entry(site.entry).owners.clone();
        let badge = build_badge(dom, &site.symbol, &text[site.start..site.end], &owners, policy);
        pieces.push(badge);
        created += 1;
        cursor = site.end;
    }

    if created == 0 {
        return 0;
    }
    if cursor < text.len() {
        pieces.push(new_text(dom, &text[cursor..]));
    }
    dom.replace_with(node, pieces);
    created
}

fn build_badge(
    dom: &mut DomTree,
    symbol: &str,
    matched_text: &str,
    owners: &[OwnerGroup],
    policy: &dyn IconUrlPolicy,
) -> NodeId {
    let badge = new_element(dom, BADGE_TAG);
    dom.set_attr(badge, BADGE_SYMBOL_ATTR, symbol);
    dom.set_attr(badge, BADGE_ORIGIN_ATTR, "1");
    dom.set_attr(badge, BADGE_SOURCE_ATTR, matched_text);

    // One chip per owning group, in index-recorded (stacking) order.
    for owner in owners {
        let chip = build_chip(dom, owner, policy);
        dom.append_child(badge, chip);
    }

    // The matched text itself, verbatim.
    let label = new_text(dom, matched_text);
    dom.append_child(badge, label);

    let total_categories: usize = owners.iter().map(|o| o.categories.len()).sum();
    let any_url = owners
        .iter()
        .any(|o| o.categories.iter().any(|c| c.url.is_some()));
    if total_categories > 1 || any_url {
        let tooltip = build_tooltip(dom, owners);
        dom.append_child(badge, tooltip);
    }

    badge
}

fn build_chip(dom: &mut DomTree, owner: &OwnerGroup, policy: &dyn IconUrlPolicy) -> NodeId {
    if let Some(icon_url) = owner
        .icon_url
        .as_deref()
        .filter(|url| policy.is_trusted_image_url(url))
    {
        let img = new_element(dom, "img");
        dom.set_attr(img, "class", CHIP_CLASS);
        dom.set_attr(img, "src", icon_url);
        dom.set_attr(img, "alt", &owner.name);
        return img;
    }

    // Untrusted or absent icon: color-only marker.
    let marker = new_element(dom, "span");
    dom.set_attr(marker, "class", CHIP_CLASS);
    dom.set_attr(marker, "title", &owner.name);
    if let Some(color) = &owner.color {
        dom.set_attr(marker, "style", &format!("background-color:{}", color));
    }
    marker
}

/// Category names listed per owning group; names become links when the
/// category declares a URL.
fn build_tooltip(dom: &mut DomTree, owners: &[OwnerGroup]) -> NodeId {
    let tooltip = new_element(dom, "span");
    dom.set_attr(tooltip, "class", TOOLTIP_CLASS);

    for owner in owners {
        let section = new_element(dom, "span");
        dom.set_attr(section, "class", TOOLTIP_GROUP_CLASS);
        let heading = new_text(dom, &owner.name);
        dom.append_child(section, heading);

        for category in &owner.categories {
            let item = match &category.url {
                Some(url) => {
                    let link = new_element(dom, "a");
                    dom.set_attr(link, "href", url);
                    let label = new_text(dom, &category.name);
                    dom.append_child(link, label);
                    link
                }
                None => {
                    let label = new_element(dom, "span");
                    let text = new_text(dom, &category.name);
                    dom.append_child(label, text);
                    label
                }
            };
            dom.append_child(section, item);
        }
        dom.append_child(tooltip, section);
    }

    tooltip
}

// =============================================================================
// Teardown
// =============================================================================

/// Replace every badge with its original text and merge the split text nodes
/// back together. Returns the number of badges removed.
///
/// Only the direct children of nodes that actually held a badge are merged;
/// adjacent text nodes the page authored elsewhere stay separate.
pub fn teardown(dom: &mut DomTree) -> usize {
    let badges: Vec<NodeId> = dom
        .descendants(dom.root())
        .into_iter()
        .filter(|&id| dom.has_attr(id, BADGE_SYMBOL_ATTR))
        .collect();

    let mut parents: Vec<NodeId> = Vec::new();
    for &badge in &badges {
        if let Some(parent) = dom.parent(badge) {
            if !parents.contains(&parent) {
                parents.push(parent);
            }
        }
        let source = dom
            .attr(badge, BADGE_SOURCE_ATTR)
            .map(str::to_string)
            .unwrap_or_default();
        let restored = new_text(dom, &source);
        dom.replace_with(badge, vec![restored]);
    }

    for &parent in &parents {
        dom.normalize_children(parent);
    }
    badges.len()
}

// =============================================================================
// Engine-marked node creation (mutation self-exclusion)
// =============================================================================

fn new_element(dom: &mut DomTree, tag: &str) -> NodeId {
    let id = dom.create_element(tag);
    dom.mark_engine_created(id);
    id
}

fn new_text(dom: &mut DomTree, content: &str) -> NodeId {
    let id = dom.create_text(content);
    dom.mark_engine_created(id);
    id
}

// =============================================================================
// Tests
// =============================================================================
