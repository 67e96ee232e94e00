//! SymbolIndex: multi-pattern symbol matching via Aho-Corasick
//!
//! Maps every configured symbol to the ordered set of groups (and the
//! categories within each group) that reference it, and compiles the whole
//! alphabet into one automaton. Matching is case-sensitive, exact, and
//! word-bounded; symbols containing regex metacharacters are plain literal
//! patterns here, so no escaping discipline is needed.
//!
//! Rebuilding is the only way to change the alphabet. `build` produces a
//! fresh index; the caller swaps it in on success, so a failed rebuild never
//! disturbs the live one.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::engine::config::Group;

// =============================================================================
// Types
// =============================================================================

/// A category that owns a symbol, within one owning group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub name: String,
    pub url: Option<String>,
}

/// One group that owns a symbol. `group` is the position in the configured
/// group list (chip stacking order). A symbol appears at most once per group
/// even when several of that group's categories list it; every listing
/// category is recorded for tooltip rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerGroup {
    pub group: usize,
    pub name: String,
    pub icon_url: Option<String>,
    pub color: Option<String>,
    pub categories: Vec<CategoryRef>,
}

/// Index entry for one symbol: owners in first-seen group order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolEntry {
    pub symbol: String,
    pub owners: Vec<OwnerGroup>,
}

/// A word-bounded occurrence of a symbol within a single string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextMatch {
    /// Index into the entry table (`SymbolIndex::entry`).
    pub entry: usize,
    pub start: usize,
    pub end: usize,
}

// =============================================================================
// SymbolIndex
// =============================================================================

pub struct SymbolIndex {
    /// None when the alphabet is empty (matches nothing).
    automaton: Option<AhoCorasick>,
    entries: Vec<SymbolEntry>,
    /// Pattern id -> entry index.
    pattern_entry: Vec<usize>,
    by_symbol: HashMap<String, usize>,
}

impl SymbolIndex {
    /// Build a complete index from the configured groups.
    ///
    /// Flattens every group's categories into (symbol, group, category)
    /// triples, aggregates by symbol preserving first-seen order, then
    /// compiles one case-sensitive automaton over the alphabet sorted by
    /// descending length then lexicographically (deterministic pattern ids,
    /// longer symbols ahead of their substrings).
    pub fn build(groups: &[Group]) -> Result<Self, String> {
        let mut entries: Vec<SymbolEntry> = Vec::new();
        let mut by_symbol: HashMap<String, usize> = HashMap::new();

        for (group_idx, group) in groups.iter().enumerate() {
            for category in &group.categories {
                for symbol in &category.symbols {
                    if symbol.is_empty() {
                        continue;
                    }
                    let entry_idx = *by_symbol.entry(symbol.clone()).or_insert_with(|| {
                        entries.push(SymbolEntry {
                            symbol: symbol.clone(),
                            owners: Vec::new(),
                        });
                        entries.len() - 1
                    });

                    let entry = &mut entries[entry_idx];
                    let owner = match entry.owners.iter_mut().find(|o| o.group == group_idx) {
                        Some(owner) => owner,
                        None => {
                            entry.owners.push(OwnerGroup {
                                group: group_idx,
                                name: group.name.clone(),
                                icon_url: group.icon_url.clone(),
                                color: group.color.clone(),
                                categories: Vec::new(),
                            });
                            entry.owners.last_mut().expect("just pushed")
                        }
                    };
                    if !owner.categories.iter().any(|c| c.name == category.name) {
                        owner.categories.push(CategoryRef {
                            name: category.name.clone(),
                            url: category.url.clone(),
                        });
                    }
                }
            }
        }

        if entries.is_empty() {
            return Ok(Self {
                automaton: None,
                entries,
                pattern_entry: Vec::new(),
                by_symbol,
            });
        }

        let mut pattern_entry: Vec<usize> = (0..entries.len()).collect();
        pattern_entry.sort_by(|&a, &b| {
            let (sa, sb) = (&entries[a].symbol, &entries[b].symbol);
            sb.len().cmp(&sa.len()).then_with(|| sa.cmp(sb))
        });
        let patterns: Vec<&str> = pattern_entry
            .iter()
            .map(|&i| entries[i].symbol.as_str())
            .collect();

        // MatchKind::Standard so the overlap iterator is available; the
        // longest-at-position rule is applied in find_in after boundary
        // filtering, where a rejected long match must not hide a valid
        // shorter one starting at the same offset.
        let automaton = AhoCorasickBuilder::new()
            .match_kind(MatchKind::Standard)
            .build(&patterns)
            .map_err(|e| format!("symbol automaton build error: {}", e))?;

        Ok(Self {
            automaton: Some(automaton),
            entries,
            pattern_entry,
            by_symbol,
        })
    }

    /// Empty index: matches nothing.
    pub fn empty() -> Self {
        Self {
            automaton: None,
            entries: Vec::new(),
            pattern_entry: Vec::new(),
            by_symbol: HashMap::new(),
        }
    }

    pub fn has_symbol(&self, symbol: &str) -> bool {
        self.by_symbol.contains_key(symbol)
    }

    /// Owners of a symbol in first-seen group order.
    pub fn groups_for(&self, symbol: &str) -> Option<&[OwnerGroup]> {
        self.by_symbol
            .get(symbol)
            .map(|&idx| self.entries[idx].owners.as_slice())
    }

    pub fn entry(&self, idx: usize) -> &SymbolEntry {
        &self.entries[idx]
    }

    /// The matcher's alphabet, in first-seen order.
    pub fn alphabet(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.symbol.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All word-bounded, non-overlapping occurrences in `text`, left to
    /// right. At each position the longest boundary-valid symbol wins.
    pub fn find_in(&self, text: &str) -> Vec<TextMatch> {
        let Some(automaton) = &self.automaton else {
            return Vec::new();
        };

        let mut candidates: Vec<TextMatch> = automaton
            .find_overlapping_iter(text)
            .filter(|m| is_word_bounded(text, m.start(), m.end()))
            .map(|m| TextMatch {
                entry: self.pattern_entry[m.pattern().as_usize()],
                start: m.start(),
                end: m.end(),
            })
            .collect();

        // Earliest start first; longest span wins ties at the same start.
        candidates.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

        let mut matches = Vec::new();
        let mut last_end = 0;
        for candidate in candidates {
            if candidate.start >= last_end {
                last_end = candidate.end;
                matches.push(candidate);
            }
        }
        matches
    }
}

/// Word boundary: the match must not touch a word character (letter, digit,
/// or underscore) on either side. String edges count as boundaries.
fn is_word_bounded(text: &str, start: usize, end: usize) -> bool {
    let before_ok = text[..start]
        .chars()
        .next_back()
        .map_or(true, |c| !is_word_char(c));
    let after_ok = text[end..].chars().next().map_or(true, |c| !is_word_char(c));
    before_ok && after_ok
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::Category;

    fn group(name: &str, categories: Vec<(&str, Vec<&str>)>) -> Group {
        Group {
            name: name.to_string(),
            icon_url: None,
            color: None,
            categories: categories
                .into_iter()
                .map(|(cat_name, symbols)| Category {
                    name: cat_name.to_string(),
                    symbols: symbols.into_iter().map(str::to_string).collect(),
                    url: None,
                })
                .collect(),
        }
    }

    fn symbols_in(index: &SymbolIndex, text: &str) -> Vec<String> {
        index
            .find_in(text)
            .iter()
            .map(|m| index.entry(m.entry).symbol.clone())
            .collect()
    }

    #[test]
    fn test_word_boundary_invariant() {
        let index = SymbolIndex::build(&[group("G", vec![("C", vec!["APP"])])]).unwrap();

        assert!(index.find_in("APPLICATION").is_empty());
        assert_eq!(symbols_in(&index, "APP is here"), vec!["APP"]);
        assert_eq!(symbols_in(&index, "(APP)"), vec!["APP"]);
        assert_eq!(symbols_in(&index, "APP"), vec!["APP"]);
        assert!(index.find_in("APP_CONFIG").is_empty(), "underscore is a word char");
    }

    #[test]
    fn test_longest_match_precedence() {
        let index =
            SymbolIndex::build(&[group("G", vec![("C", vec!["A", "AB", "ABC"])])]).unwrap();

        let matches = index.find_in("ABC");
        assert_eq!(matches.len(), 1);
        assert_eq!(index.entry(matches[0].entry).symbol, "ABC");
        assert_eq!((matches[0].start, matches[0].end), (0, 3));
    }

    #[test]
    fn test_rejected_long_match_does_not_hide_shorter() {
        // "AB-" fails the boundary check before "X"; "AB" at the same
        // position is still valid and must be reported.
        let index = SymbolIndex::build(&[group("G", vec![("C", vec!["AB", "AB-"])])]).unwrap();

        assert_eq!(symbols_in(&index, "AB-X"), vec!["AB"]);
        assert_eq!(symbols_in(&index, "AB- X"), vec!["AB-"]);
    }

    #[test]
    fn test_case_sensitive_exact() {
        let index = SymbolIndex::build(&[group("G", vec![("C", vec!["AAPL"])])]).unwrap();

        assert!(index.find_in("aapl and Aapl").is_empty());
        assert_eq!(symbols_in(&index, "buy AAPL now"), vec!["AAPL"]);
    }

    #[test]
    fn test_metacharacters_matched_literally() {
        let index =
            SymbolIndex::build(&[group("G", vec![("C", vec!["C++", "A.B", "$SPX"])])]).unwrap();

        assert_eq!(symbols_in(&index, "learn C++ today"), vec!["C++"]);
        assert_eq!(symbols_in(&index, "A.B holds"), vec!["A.B"]);
        assert_eq!(symbols_in(&index, "watch $SPX move"), vec!["$SPX"]);
        assert!(index.find_in("AxB").is_empty(), "dot must not act as wildcard");
    }

    #[test]
    fn test_multiple_matches_left_to_right() {
        let index =
            SymbolIndex::build(&[group("G", vec![("C", vec!["NVDA", "MSFT", "GOOGL"])])]).unwrap();

        assert_eq!(
            symbols_in(&index, "NVDA MSFT GOOGL"),
            vec!["NVDA", "MSFT", "GOOGL"]
        );
    }

    #[test]
    fn test_symbol_in_two_categories_single_owner_entry() {
        let index = SymbolIndex::build(&[group(
            "G",
            vec![("AI", vec!["NVDA", "AAPL"]), ("Portfolio", vec!["AAPL"])],
        )])
        .unwrap();

        let owners = index.groups_for("AAPL").unwrap();
        assert_eq!(owners.len(), 1, "one entry per owning group");
        let names: Vec<&str> = owners[0].categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["AI", "Portfolio"]);
    }

    #[test]
    fn test_symbol_shared_across_groups_keeps_group_order() {
        let index = SymbolIndex::build(&[
            group("First", vec![("A", vec!["TSLA"])]),
            group("Second", vec![("B", vec!["TSLA"])]),
        ])
        .unwrap();

        let owners = index.groups_for("TSLA").unwrap();
        assert_eq!(owners.len(), 2);
        assert_eq!(owners[0].name, "First");
        assert_eq!(owners[1].name, "Second");
    }

    #[test]
    fn test_alphabet_size_counts_distinct_symbols() {
        let index = SymbolIndex::build(&[
            group("A", vec![("X", vec!["NVDA", "MSFT"])]),
            group("B", vec![("Y", vec!["NVDA", "GOOGL"])]),
        ])
        .unwrap();

        assert_eq!(index.len(), 3);
        assert!(index.has_symbol("NVDA"));
        assert!(!index.has_symbol("nvda"));
    }

    #[test]
    fn test_empty_configuration_builds_empty_index() {
        let index = SymbolIndex::build(&[]).unwrap();
        assert!(index.is_empty());
        assert!(index.find_in("NVDA MSFT").is_empty());
    }

    #[test]
    fn test_empty_symbols_skipped() {
        let index = SymbolIndex::build(&[group("G", vec![("C", vec!["", "NVDA"])])]).unwrap();
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_offsets_with_multibyte_context() {
        let index = SymbolIndex::build(&[group("G", vec![("C", vec!["NVDA"])])]).unwrap();

        let text = "цена NVDA растёт";
        let matches = index.find_in(text);
        assert_eq!(matches.len(), 1);
        assert_eq!(&text[matches[0].start..matches[0].end], "NVDA");
    }

    #[test]
    fn test_unicode_word_chars_block_boundary() {
        let index = SymbolIndex::build(&[group("G", vec![("C", vec!["NVDA"])])]).unwrap();
        assert!(index.find_in("фNVDAф").is_empty());
    }
}
