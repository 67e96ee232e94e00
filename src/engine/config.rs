//! Configuration model: groups, categories, url filters
//!
//! Stored configuration is loosely typed (hand-edited JSON, imports from
//! older versions), so everything funnels through `Configuration::from_value`
//! which coerces what it can and silently drops what it cannot. The
//! array-or-object category shape is resolved here exactly once - downstream
//! code only ever sees the normalized `Category`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Normalized shapes
// =============================================================================

/// A named sub-collection of symbols, optionally carrying a link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub symbols: Vec<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// A named collection of categories sharing an icon/color. Group identity is
/// its position in the configuration's group list (chip stacking order).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default)]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub categories: Vec<Category>,
}

/// Whitelist activates only on a match; blacklist deactivates on a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    Whitelist,
    Blacklist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    Domain,
    Regex,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlPattern {
    pub pattern: String,
    #[serde(rename = "type")]
    pub kind: PatternKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlFilterConfig {
    pub mode: FilterMode,
    #[serde(default)]
    pub patterns: Vec<UrlPattern>,
}

impl Default for UrlFilterConfig {
    /// Blacklist with no patterns: always active.
    fn default() -> Self {
        Self {
            mode: FilterMode::Blacklist,
            patterns: Vec::new(),
        }
    }
}

/// Fully normalized configuration consumed by the coordinator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub url_filter: UrlFilterConfig,
}

// =============================================================================
// Loose-shape normalization
// =============================================================================

impl Configuration {
    /// Parse a raw JSON configuration string. Malformed JSON is an error;
    /// malformed entries inside valid JSON are dropped, never fatal.
    pub fn from_json(raw: &str) -> Result<Self, String> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| format!("invalid configuration JSON: {}", e))?;
        Ok(Self::from_value(&value))
    }

    /// Normalize a loosely-typed configuration value. Groups without a name,
    /// categories with an unrecognized shape, and non-string symbols are
    /// silently dropped; missing optional fields take defaults.
    pub fn from_value(value: &Value) -> Self {
        let groups = value
            .get("groups")
            .and_then(Value::as_array)
            .map(|entries| entries.iter().filter_map(normalize_group).collect())
            .unwrap_or_default();

        let url_filter = value
            .get("urlFilter")
            .or_else(|| value.get("url_filter"))
            .map(normalize_url_filter)
            .unwrap_or_default();

        Self { groups, url_filter }
    }
}

fn normalize_group(raw: &Value) -> Option<Group> {
    let name = raw.get("name")?.as_str()?.trim();
    if name.is_empty() {
        return None;
    }

    let categories = raw
        .get("categories")
        .and_then(Value::as_object)
        .map(|map| {
            // serde_json's preserve_order feature keeps insertion order here
            map.iter()
                .filter_map(|(cat_name, cat_value)| normalize_category(cat_name, cat_value))
                .collect()
        })
        .unwrap_or_default();

    Some(Group {
        name: name.to_string(),
        icon_url: string_field(raw, "iconUrl").or_else(|| string_field(raw, "icon_url")),
        color: string_field(raw, "color"),
        categories,
    })
}

/// Resolve the array-or-object category union into the normalized shape.
fn normalize_category(name: &str, raw: &Value) -> Option<Category> {
    match raw {
        Value::Array(entries) => Some(Category {
            name: name.to_string(),
            symbols: collect_symbols(entries),
            url: None,
        }),
        Value::Object(fields) => {
            let symbols = fields
                .get("symbols")
                .and_then(Value::as_array)
                .map(|entries| collect_symbols(entries))
                .unwrap_or_default();
            Some(Category {
                name: name.to_string(),
                symbols,
                url: fields
                    .get("url")
                    .and_then(Value::as_str)
                    .filter(|u| !u.is_empty())
                    .map(str::to_string),
            })
        }
        _ => None,
    }
}

fn collect_symbols(entries: &[Value]) -> Vec<String> {
    entries
        .iter()
        .filter_map(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn string_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn normalize_url_filter(raw: &Value) -> UrlFilterConfig {
    let mode = match raw.get("mode").and_then(Value::as_str) {
        Some("whitelist") => FilterMode::Whitelist,
        _ => FilterMode::Blacklist,
    };

    let patterns = raw
        .get("patterns")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let pattern = entry.get("pattern")?.as_str()?;
                    if pattern.is_empty() {
                        return None;
                    }
                    let kind = match entry.get("type").and_then(Value::as_str) {
                        Some("regex") => PatternKind::Regex,
                        _ => PatternKind::Domain,
                    };
                    Some(UrlPattern {
                        pattern: pattern.to_string(),
                        kind,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    UrlFilterConfig { mode, patterns }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_array_category_normalizes() {
        let raw = json!({
            "groups": [
                { "name": "G", "categories": { "AI": ["NVDA", "GOOGL"] } }
            ]
        });
        let config = Configuration::from_value(&raw);

        assert_eq!(config.groups.len(), 1);
        let cat = &config.groups[0].categories[0];
        assert_eq!(cat.name, "AI");
        assert_eq!(cat.symbols, vec!["NVDA", "GOOGL"]);
        assert_eq!(cat.url, None);
    }

    #[test]
    fn test_object_category_with_url_normalizes() {
        let raw = json!({
            "groups": [
                { "name": "G", "categories": {
                    "Cloud": { "symbols": ["MSFT"], "url": "https://example.com/cloud" }
                } }
            ]
        });
        let config = Configuration::from_value(&raw);

        let cat = &config.groups[0].categories[0];
        assert_eq!(cat.symbols, vec!["MSFT"]);
        assert_eq!(cat.url.as_deref(), Some("https://example.com/cloud"));
    }

    #[test]
    fn test_category_order_preserved() {
        let config = Configuration::from_json(
            r#"{"groups":[{"name":"G","categories":{"Zeta":["A"],"Alpha":["B"],"Mid":["C"]}}]}"#,
        )
        .unwrap();

        let names: Vec<&str> = config.groups[0]
            .categories
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn test_malformed_entries_dropped_not_fatal() {
        let raw = json!({
            "groups": [
                { "categories": { "AI": ["NVDA"] } },            // no name: dropped
                { "name": "OK", "categories": {
                    "Good": ["AAPL", 42, "", "MSFT"],            // non-strings dropped
                    "Bad": "not-a-category"                       // wrong shape: dropped
                } },
                "not-a-group"
            ]
        });
        let config = Configuration::from_value(&raw);

        assert_eq!(config.groups.len(), 1);
        assert_eq!(config.groups[0].name, "OK");
        assert_eq!(config.groups[0].categories.len(), 1);
        assert_eq!(config.groups[0].categories[0].symbols, vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn test_missing_sections_take_defaults() {
        let config = Configuration::from_value(&json!({}));
        assert!(config.groups.is_empty());
        assert_eq!(config.url_filter.mode, FilterMode::Blacklist);
        assert!(config.url_filter.patterns.is_empty());
    }

    #[test]
    fn test_url_filter_normalizes() {
        let raw = json!({
            "urlFilter": {
                "mode": "whitelist",
                "patterns": [
                    { "pattern": "news.example.com", "type": "domain" },
                    { "pattern": "finance\\..*", "type": "regex" },
                    { "pattern": "" },
                    { "type": "domain" }
                ]
            }
        });
        let config = Configuration::from_value(&raw);

        assert_eq!(config.url_filter.mode, FilterMode::Whitelist);
        assert_eq!(config.url_filter.patterns.len(), 2);
        assert_eq!(config.url_filter.patterns[0].kind, PatternKind::Domain);
        assert_eq!(config.url_filter.patterns[1].kind, PatternKind::Regex);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(Configuration::from_json("{not json").is_err());
    }
}
