//! Result enhancement: XPath deduplication, DOM context and count recomputation.
//!
//! The raw WAVE payload is loosely shaped. It is read into [`RawResults`]
//! with every category name parsed into a [`CategoryKey`]; only `error` and
//! `contrast` survive [`enhance`]. Each unique XPath of a rule is resolved
//! exactly once in the live page through a [`DomInspector`].

use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use tracing::{debug, warn};

use crate::errors::ScanError;
use crate::types::{
    Category, CategoryKey, ContrastData, DomInfo, DomLookup, RuleInstanceGroup,
    ViolationCategory, Violations,
};
use crate::webdriver::PageScripting;

/// Maximum characters of element text kept in [`DomInfo`]
pub const TEXT_LIMIT: usize = 100;
/// Maximum characters of inner HTML kept in [`DomInfo`]
pub const HTML_LIMIT: usize = 200;

/// How positional arrays are aligned with the deduplicated XPath list
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PositionalAlignment {
    /// Each kept XPath takes the entries found at its first raw occurrence
    #[default]
    FirstOccurrence,
    /// Arrays are cut to the deduplicated length, index for index
    Truncate,
}

/// Raw WAVE output, grouped by category
#[derive(Debug, Default)]
pub struct RawResults {
    pub categories: Vec<(CategoryKey, Vec<RawRule>)>,
}

/// One rule as reported by WAVE, before deduplication
#[derive(Debug, Default, Clone)]
pub struct RawRule {
    pub id: String,
    pub description: Option<String>,
    /// Non-string entries are kept as `None` so indices stay aligned
    pub xpaths: Vec<Option<String>>,
    pub selectors: Option<Vec<Value>>,
    pub text: Option<Vec<Value>>,
    pub hidden: Option<Vec<Value>>,
    pub contrastdata: Option<Vec<Value>>,
}

impl RawResults {
    /// Read the payload returned by the in-page run call.
    ///
    /// Categories may sit under a `categories` key or at the top level.
    pub fn from_value(value: &Value) -> Result<Self, ScanError> {
        let root = value.as_object().ok_or_else(|| {
            ScanError::Payload(format!("expected an object, got {}", kind(value)))
        })?;

        let categories = match root.get("categories") {
            Some(Value::Object(categories)) => categories,
            Some(other) => {
                return Err(ScanError::Payload(format!(
                    "'categories' must be an object, got {}",
                    kind(other)
                )));
            }
            None => root,
        };

        let mut results = RawResults::default();
        for (name, category) in categories {
            let rules = match category.get("items") {
                Some(Value::Object(items)) => items
                    .iter()
                    .map(|(key, rule)| RawRule::from_value(key, rule))
                    .collect(),
                _ => Vec::new(),
            };
            results.categories.push((CategoryKey::parse(name), rules));
        }

        Ok(results)
    }
}

impl RawRule {
    /// `key` is the rule's entry in `items`; an inner `id` field is ignored
    /// so that entries sharing it never collapse into one group
    fn from_value(key: &str, value: &Value) -> Self {
        let id = key.to_string();
        let description = value
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);
        let xpaths = value
            .get("xpaths")
            .and_then(Value::as_array)
            .map(|xs| xs.iter().map(|x| x.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let array = |name: &str| value.get(name).and_then(Value::as_array).cloned();

        RawRule {
            id,
            description,
            xpaths,
            selectors: array("selectors"),
            text: array("text"),
            hidden: array("hidden"),
            contrastdata: array("contrastdata"),
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Unique XPaths in first-occurrence order, each paired with the raw index
/// it was first seen at.
pub fn first_occurrences(xpaths: &[Option<String>]) -> Vec<(usize, String)> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for (index, xpath) in xpaths.iter().enumerate() {
        if let Some(xpath) = xpath
            && seen.insert(xpath.as_str())
        {
            unique.push((index, xpath.clone()));
        }
    }
    unique
}

fn align<'a>(
    values: &'a [Value],
    origins: &[usize],
    alignment: PositionalAlignment,
) -> Vec<Option<&'a Value>> {
    match alignment {
        PositionalAlignment::FirstOccurrence => origins.iter().map(|&i| values.get(i)).collect(),
        PositionalAlignment::Truncate => values.iter().take(origins.len()).map(Some).collect(),
    }
}

fn as_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => s == "true" || s == "1",
        _ => false,
    }
}

fn as_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches(":1").parse().ok(),
        _ => None,
    }
}

/// Parse one contrast entry: `[ratio, foreground, background, ...]` or an
/// object with `ratio` and `foreground`/`fcolor`, `background`/`bcolor`.
pub fn parse_contrast(value: &Value) -> Option<ContrastData> {
    let (ratio, foreground, background) = match value {
        Value::Array(parts) => (parts.first(), parts.get(1), parts.get(2)),
        Value::Object(map) => (
            map.get("ratio"),
            map.get("foreground").or_else(|| map.get("fcolor")),
            map.get("background").or_else(|| map.get("bcolor")),
        ),
        _ => return None,
    };

    Some(ContrastData {
        ratio: as_number(ratio)?,
        foreground: as_text(foreground)?,
        background: as_text(background)?,
    })
}

/// Best-effort selector: `#id`, else up to two classes, else the tag name
pub fn derive_selector(tag: &str, id: Option<&str>, classes: &[String]) -> String {
    if let Some(id) = id.filter(|id| !id.is_empty()) {
        return format!("#{}", id);
    }
    if !classes.is_empty() {
        return classes
            .iter()
            .take(2)
            .map(|class| format!(".{}", class))
            .collect();
    }
    tag.to_lowercase()
}

/// Resolves XPaths against the live document
pub trait DomInspector {
    /// Returns exactly one lookup per requested XPath, in order
    fn inspect(&self, xpaths: &[String]) -> impl Future<Output = Result<Vec<DomLookup>>>;
}

/// Evaluates every XPath with `document.evaluate` and reports the first
/// matching element; a throwing lookup yields `{error}` for that entry only.
const INSPECT_XPATHS_SCRIPT: &str = r#"
    const xpaths = arguments[0];
    const textLimit = arguments[1];
    const htmlLimit = arguments[2];
    return xpaths.map(function (xpath) {
        try {
            const node = document.evaluate(
                xpath, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null
            ).singleNodeValue;
            if (!node) return null;
            const el = node.nodeType === Node.ELEMENT_NODE ? node : node.parentElement;
            if (!el) return null;
            const attributes = {};
            for (const attr of Array.from(el.attributes || [])) {
                attributes[attr.name] = attr.value;
            }
            return {
                tagName: el.tagName,
                id: el.id || null,
                className: el.getAttribute('class') || '',
                text: (el.textContent || '').trim().substring(0, textLimit),
                html: (el.innerHTML || '').substring(0, htmlLimit),
                attributes: attributes
            };
        } catch (e) {
            return { error: String(e && e.message ? e.message : e) };
        }
    });
"#;

/// [`DomInspector`] backed by a browser page
pub struct PageInspector<'a, P> {
    page: &'a P,
}

impl<'a, P: PageScripting> PageInspector<'a, P> {
    pub fn new(page: &'a P) -> Self {
        Self { page }
    }
}

impl<P: PageScripting> DomInspector for PageInspector<'_, P> {
    async fn inspect(&self, xpaths: &[String]) -> Result<Vec<DomLookup>> {
        let result = self
            .page
            .execute(
                INSPECT_XPATHS_SCRIPT,
                vec![json!(xpaths), json!(TEXT_LIMIT), json!(HTML_LIMIT)],
            )
            .await
            .context("XPath inspection script failed")?;

        let entries = result
            .as_array()
            .context("XPath inspection returned a non-array value")?;
        Ok(entries.iter().map(lookup_from_value).collect())
    }
}

/// Convert one entry produced by the inspection script
pub fn lookup_from_value(value: &Value) -> DomLookup {
    let Some(map) = value.as_object() else {
        return DomLookup::Missing;
    };
    if let Some(error) = map.get("error") {
        return DomLookup::Failed {
            error: error
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
        };
    }
    let Some(tag) = map.get("tagName").and_then(Value::as_str) else {
        return DomLookup::Failed {
            error: "element without a tag name".to_string(),
        };
    };

    let id = map
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string);
    let classes: Vec<String> = map
        .get("className")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    let attributes: BTreeMap<String, String> = map
        .get("attributes")
        .and_then(Value::as_object)
        .map(|attrs| {
            attrs
                .iter()
                .map(|(name, value)| {
                    let value = value.as_str().map(str::to_string);
                    (name.clone(), value.unwrap_or_default())
                })
                .collect()
        })
        .unwrap_or_default();
    let selector = derive_selector(tag, id.as_deref(), &classes);

    DomLookup::Found(DomInfo {
        tag: tag.to_string(),
        id,
        classes,
        text: map
            .get("text")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(|t| truncate_chars(t, TEXT_LIMIT)),
        html: map
            .get("html")
            .and_then(Value::as_str)
            .filter(|h| !h.is_empty())
            .map(|h| truncate_chars(h, HTML_LIMIT)),
        attributes,
        selector,
    })
}

pub(crate) fn truncate_chars(s: &str, limit: usize) -> String {
    s.chars().take(limit).collect()
}

async fn inspect_rule<I: DomInspector>(
    inspector: &I,
    rule_id: &str,
    xpaths: &[String],
) -> Vec<DomLookup> {
    if xpaths.is_empty() {
        return Vec::new();
    }

    match inspector.inspect(xpaths).await {
        Ok(lookups) if lookups.len() == xpaths.len() => lookups,
        Ok(lookups) => {
            warn!(
                "DOM inspection for rule {} returned {} entries for {} XPaths",
                rule_id,
                lookups.len(),
                xpaths.len()
            );
            let marker = DomLookup::Failed {
                error: format!(
                    "inspection returned {} entries for {} XPaths",
                    lookups.len(),
                    xpaths.len()
                ),
            };
            vec![marker; xpaths.len()]
        }
        Err(e) => {
            warn!("DOM inspection failed for rule {}: {:#}", rule_id, e);
            let marker = DomLookup::Failed {
                error: format!("{:#}", e),
            };
            vec![marker; xpaths.len()]
        }
    }
}

/// Build one enhanced rule group
pub async fn enhance_rule<I: DomInspector>(
    raw: RawRule,
    inspector: &I,
    alignment: PositionalAlignment,
) -> RuleInstanceGroup {
    let occurrences = first_occurrences(&raw.xpaths);
    let (origins, xpaths): (Vec<usize>, Vec<String>) = occurrences.into_iter().unzip();

    let dom_info = inspect_rule(inspector, &raw.id, &xpaths).await;

    let selectors = raw
        .selectors
        .as_deref()
        .map(|values| align(values, &origins, alignment).into_iter().map(as_text).collect());
    let text = raw
        .text
        .as_deref()
        .map(|values| align(values, &origins, alignment).into_iter().map(as_text).collect());
    let hidden = raw
        .hidden
        .as_deref()
        .map(|values| align(values, &origins, alignment).into_iter().map(as_flag).collect());
    let contrastdata = raw.contrastdata.as_deref().map(|values| {
        align(values, &origins, alignment)
            .into_iter()
            .map(|v| v.and_then(parse_contrast))
            .collect()
    });

    RuleInstanceGroup {
        id: raw.id,
        count: xpaths.len(),
        description: raw.description,
        xpaths,
        selectors,
        text,
        hidden,
        contrastdata,
        dom_info,
    }
}

/// Deduplicate, enrich and recount the raw results.
///
/// Never fails: lookup problems are recorded inline on the affected elements.
pub async fn enhance<I: DomInspector>(
    raw: RawResults,
    inspector: &I,
    alignment: PositionalAlignment,
) -> Violations {
    let mut violations = Violations::new();

    for (key, rules) in raw.categories {
        let category = match key {
            CategoryKey::Known(category) => category,
            CategoryKey::Ignored(name) => {
                debug!("Dropping WAVE category '{}' ({} rules)", name, rules.len());
                continue;
            }
        };

        let bucket = violations.entry(category).or_default();
        for rule in rules {
            let group = enhance_rule(rule, inspector, alignment).await;
            bucket.items.insert(group.id.clone(), group);
        }
    }

    for bucket in violations.values_mut() {
        recount(bucket);
    }
    debug!(
        "Enhanced results: {}",
        violations
            .iter()
            .map(|(category, bucket)| format!("{}={}", category, bucket.count))
            .collect::<Vec<_>>()
            .join(", ")
    );

    violations
}

/// Restore the count invariants of a category bucket
pub fn recount(bucket: &mut ViolationCategory) {
    for rule in bucket.items.values_mut() {
        rule.count = rule.xpaths.len();
    }
    bucket.count = bucket.items.values().map(|rule| rule.count).sum();
}

/// Total instance count across the retained categories
pub fn total_instances(violations: &Violations) -> usize {
    Category::ALL
        .iter()
        .filter_map(|category| violations.get(category))
        .map(|bucket| bucket.count)
        .sum()
}

#[cfg(test)]
#[path = "enhance_test.rs"]
mod enhance_test;
