//! Compiled-module metadata descriptions.
//!
//! The compiler emits a JSON description alongside every module: the
//! arena state size, audio channel counts, and a recursive tree of UI
//! groups and controls. Items in the tree are duck-shaped in the JSON
//! (`"type"` strings, optional fields); classification into the closed
//! control set happens at traversal time via [`ControlKind`], and items
//! with unrecognized types are skipped rather than rejected, since the
//! description is only partially trusted.

use serde::Deserialize;

use crate::error::ConfigError;

/// Immutable description of one compiled module.
///
/// Produced once at compile time and read-only thereafter.
#[derive(Debug, Clone, Deserialize)]
pub struct DspMetadata {
    /// Module name, as given to the compiler.
    #[serde(default)]
    pub name: String,
    /// State region size in bytes.
    pub size: u32,
    /// Number of audio input channels.
    #[serde(default)]
    pub inputs: u32,
    /// Number of audio output channels.
    #[serde(default)]
    pub outputs: u32,
    /// Recursive tree of UI groups and controls.
    #[serde(default)]
    pub ui: Vec<UiItem>,
    /// Module-level key/value metadata entries.
    #[serde(default)]
    pub meta: Vec<serde_json::Map<String, serde_json::Value>>,
}

impl DspMetadata {
    /// Parses a description from its JSON text.
    pub fn parse(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Visits every module-level metadata entry as a key/value pair.
    /// Entries are single-key objects in the source JSON; any extra keys
    /// are visited too.
    pub fn meta_entries(&self, mut handler: impl FnMut(&str, &serde_json::Value)) {
        for entry in &self.meta {
            for (key, value) in entry {
                handler(key, value);
            }
        }
    }
}

/// One raw node of the UI tree: a group or a control, as emitted by the
/// compiler. Group nodes carry `items`; controls carry `address`,
/// `index`, and their range fields. Absent fields default to empty/zero.
#[derive(Debug, Clone, Deserialize)]
pub struct UiItem {
    /// Raw item type tag (`"vgroup"`, `"hslider"`, `"button"`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Display label.
    #[serde(default)]
    pub label: String,
    /// Unique address path of a control (empty for groups).
    #[serde(default)]
    pub address: String,
    /// Index into the module's parameter vector.
    #[serde(default)]
    pub index: u32,
    /// Initial value.
    #[serde(default)]
    pub init: f32,
    /// Range minimum.
    #[serde(default)]
    pub min: f32,
    /// Range maximum.
    #[serde(default)]
    pub max: f32,
    /// Step increment.
    #[serde(default)]
    pub step: f32,
    /// Free-form metadata tags attached to this item.
    #[serde(default)]
    pub meta: Vec<serde_json::Map<String, serde_json::Value>>,
    /// Children, for group nodes.
    #[serde(default)]
    pub items: Vec<UiItem>,
}

/// Closed classification of UI control leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// Continuous input control (`vslider` / `hslider`).
    Slider,
    /// Numeric entry field (`nentry`).
    NumericEntry,
    /// Momentary trigger (`button`).
    Button,
    /// Two-state toggle (`checkbox`).
    Checkbox,
    /// Output-only level display (`vbargraph` / `hbargraph`).
    BarGraph,
}

impl ControlKind {
    /// Classifies a raw item type tag. Group tags and anything
    /// unrecognized classify as `None`.
    pub fn from_type(kind: &str) -> Option<Self> {
        match kind {
            "vslider" | "hslider" => Some(Self::Slider),
            "nentry" => Some(Self::NumericEntry),
            "button" => Some(Self::Button),
            "checkbox" => Some(Self::Checkbox),
            "vbargraph" | "hbargraph" => Some(Self::BarGraph),
            _ => None,
        }
    }

    /// True for controls that accept external input; false for
    /// output-only displays.
    pub fn is_input(self) -> bool {
        !matches!(self, Self::BarGraph)
    }
}

fn is_group(kind: &str) -> bool {
    matches!(kind, "vgroup" | "hgroup" | "tgroup")
}

/// Walks every classified control leaf in a UI tree, in document order.
/// Groups are transparent containers; leaves with unrecognized types are
/// skipped silently.
pub fn visit_controls<'a>(items: &'a [UiItem], visit: &mut impl FnMut(&'a UiItem, ControlKind)) {
    for item in items {
        if is_group(&item.kind) {
            visit_controls(&item.items, visit);
        } else if let Some(kind) = ControlKind::from_type(&item.kind) {
            visit(item, kind);
        }
    }
}
