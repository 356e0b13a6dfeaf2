use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Violation categories retained from the WAVE payload
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Accessibility errors
    Error,
    /// Contrast errors
    Contrast,
}

impl Category {
    /// Report order: errors first, then contrast
    pub const ALL: [Category; 2] = [Category::Error, Category::Contrast];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Error => "error",
            Category::Contrast => "contrast",
        }
    }

    /// Upper-case label used in CSV rows
    pub fn label(&self) -> &'static str {
        match self {
            Category::Error => "ERROR",
            Category::Contrast => "CONTRAST",
        }
    }

    /// Fixed impact mapping for report rows
    pub fn impact(&self) -> Impact {
        match self {
            Category::Error => Impact::Critical,
            Category::Contrast => Impact::Serious,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A category name as found in the raw payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CategoryKey {
    Known(Category),
    /// alert, feature, structure, aria, ... (dropped during enhancement)
    Ignored(String),
}

impl CategoryKey {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "error" => CategoryKey::Known(Category::Error),
            "contrast" => CategoryKey::Known(Category::Contrast),
            _ => CategoryKey::Ignored(name.to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum Impact {
    Critical,
    Serious,
}

impl Impact {
    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::Critical => "Critical",
            Impact::Serious => "Serious",
        }
    }
}

/// Foreground/background pair and ratio reported for a contrast instance
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ContrastData {
    pub ratio: f64,
    pub foreground: String,
    pub background: String,
}

/// Snapshot of one XPath-resolved element at analysis time
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct DomInfo {
    /// Tag name as reported by the DOM (usually upper-case)
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    /// Text content, truncated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Inner HTML, truncated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Best-effort CSS-like selector
    pub selector: String,
}

/// Result of resolving one XPath in the page
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum DomLookup {
    Found(DomInfo),
    Failed { error: String },
    /// No node matched; serialized as `null`
    Missing,
}

impl DomLookup {
    pub fn info(&self) -> Option<&DomInfo> {
        match self {
            DomLookup::Found(info) => Some(info),
            _ => None,
        }
    }
}

/// All occurrences of one rule after enhancement
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct RuleInstanceGroup {
    pub id: String,
    /// Always equal to `xpaths.len()`
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Deduplicated, first-occurrence order
    pub xpaths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selectors: Option<Vec<Option<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<Vec<Option<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<Vec<bool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contrastdata: Option<Vec<Option<ContrastData>>>,
    /// One lookup per entry of `xpaths`
    #[serde(default)]
    pub dom_info: Vec<DomLookup>,
}

impl RuleInstanceGroup {
    pub fn selector_at(&self, index: usize) -> Option<&str> {
        self.selectors
            .as_ref()
            .and_then(|s| s.get(index))
            .and_then(|s| s.as_deref())
    }

    pub fn hidden_at(&self, index: usize) -> bool {
        self.hidden
            .as_ref()
            .and_then(|h| h.get(index).copied())
            .unwrap_or(false)
    }

    pub fn contrast_at(&self, index: usize) -> Option<&ContrastData> {
        self.contrastdata
            .as_ref()
            .and_then(|c| c.get(index))
            .and_then(|c| c.as_ref())
    }

    pub fn dom_at(&self, index: usize) -> Option<&DomInfo> {
        self.dom_info.get(index).and_then(DomLookup::info)
    }
}

/// A retained category bucket
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct ViolationCategory {
    /// Sum of the contained rule counts
    pub count: usize,
    pub items: BTreeMap<String, RuleInstanceGroup>,
}

/// Enhanced violations keyed by category
pub type Violations = BTreeMap<Category, ViolationCategory>;

/// Browser viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportSize {
    /// Viewport width in pixels
    pub width: u32,
    /// Viewport height in pixels
    pub height: u32,
}

impl ViewportSize {
    /// Parse viewport size from "WIDTHxHEIGHT" format (e.g., "1920x1080")
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('x').collect();
        if parts.len() != 2 {
            anyhow::bail!("Invalid viewport format. Use WIDTHxHEIGHT (e.g., 1920x1080)");
        }

        let width = parts[0]
            .parse::<u32>()
            .map_err(|_| anyhow::anyhow!("Invalid width in viewport size"))?;
        let height = parts[1]
            .parse::<u32>()
            .map_err(|_| anyhow::anyhow!("Invalid height in viewport size"))?;

        Ok(ViewportSize { width, height })
    }

    pub fn orientation(&self) -> Orientation {
        if self.width >= self.height {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }
}

impl fmt::Display for ViewportSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Landscape => "landscape",
            Orientation::Portrait => "portrait",
        }
    }
}

/// Browser environment captured alongside each analysis
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct PageEnvironment {
    pub user_agent: String,
    pub viewport: ViewportSize,
    pub orientation: Orientation,
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
