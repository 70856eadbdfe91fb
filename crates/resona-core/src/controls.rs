//! Control-surface tables built from a module's metadata.
//!
//! One traversal of the UI tree produces everything the runtime needs to
//! route parameters: the address→index table, the ordered input and
//! output address lists, and the MIDI binding tables (one fan-out list
//! per controller number plus a pitch-wheel list). Binding directives
//! live in each control's free-form `midi` metadata tag (`"ctrl 7"`,
//! `"pitchwheel"`); malformed tags are skipped, never raised, because
//! tags are only partially trusted.

use std::collections::HashMap;

use crate::metadata::{UiItem, visit_controls};

/// Number of MIDI controller slots.
const CTRL_SLOTS: usize = 128;

/// A control bound to a MIDI controller or the pitch wheel, with the
/// range its incoming values are remapped onto.
#[derive(Debug, Clone, PartialEq)]
pub struct MidiBinding {
    /// Bound control address.
    pub path: String,
    /// Control range minimum.
    pub min: f32,
    /// Control range maximum.
    pub max: f32,
}

impl MidiBinding {
    fn for_item(item: &UiItem) -> Self {
        Self {
            path: item.address.clone(),
            min: item.min,
            max: item.max,
        }
    }
}

enum MidiTag {
    Ctrl(u8),
    PitchWheel,
}

/// Parses a `midi` metadata tag. Accepts `pitchwheel` and `ctrl <N>`
/// with N in 0..=127; anything else, including out-of-range controller
/// numbers, parses to `None`.
fn parse_midi_tag(tag: &str) -> Option<MidiTag> {
    let tag = tag.trim();
    if tag == "pitchwheel" {
        return Some(MidiTag::PitchWheel);
    }
    let rest = tag.strip_prefix("ctrl")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let digits: &str = rest
        .trim_start()
        .split(|c: char| !c.is_ascii_digit())
        .next()?;
    let number: u32 = digits.parse().ok()?;
    u8::try_from(number).ok().filter(|&n| n < 128).map(MidiTag::Ctrl)
}

/// Address→index bindings and MIDI routing tables for one node.
///
/// Built once from one or more metadata trees (a polyphonic node absorbs
/// its voice tree and its effect tree into the same map) and immutable
/// afterwards.
#[derive(Debug)]
pub struct ControlMap {
    path_table: HashMap<String, u32>,
    inputs: Vec<String>,
    outputs: Vec<String>,
    ctrl: Vec<Vec<MidiBinding>>,
    pitchwheel: Vec<MidiBinding>,
}

impl Default for ControlMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self {
            path_table: HashMap::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            ctrl: vec![Vec::new(); CTRL_SLOTS],
            pitchwheel: Vec::new(),
        }
    }

    /// Records every control leaf of `ui`: address→index, input/output
    /// classification, and any MIDI binding directives on input controls.
    pub fn absorb(&mut self, ui: &[UiItem]) {
        visit_controls(ui, &mut |item, kind| {
            self.path_table.insert(item.address.clone(), item.index);
            if !kind.is_input() {
                self.outputs.push(item.address.clone());
                return;
            }
            self.inputs.push(item.address.clone());
            for tag in &item.meta {
                let Some(midi) = tag.get("midi").and_then(|value| value.as_str()) else {
                    continue;
                };
                match parse_midi_tag(midi) {
                    Some(MidiTag::PitchWheel) => self.pitchwheel.push(MidiBinding::for_item(item)),
                    Some(MidiTag::Ctrl(number)) => {
                        self.ctrl[number as usize].push(MidiBinding::for_item(item));
                    }
                    None => {}
                }
            }
        });
    }

    /// Resolves an address to its parameter index.
    pub fn index_of(&self, path: &str) -> Option<u32> {
        self.path_table.get(path).copied()
    }

    /// True when `path` names a known control.
    pub fn contains(&self, path: &str) -> bool {
        self.path_table.contains_key(path)
    }

    /// Input control addresses, in metadata order.
    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    /// Output-only control addresses, in metadata order.
    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    /// Controls bound to MIDI controller `ctrl`.
    pub fn ctrl_bindings(&self, ctrl: u8) -> &[MidiBinding] {
        &self.ctrl[ctrl as usize]
    }

    /// Controls bound to the pitch wheel.
    pub fn pitchwheel_bindings(&self) -> &[MidiBinding] {
        &self.pitchwheel
    }
}

/// Linearly remaps `value` from `[lo0, hi0]` onto `[lo1, hi1]`.
///
/// # Example
///
/// ```rust
/// use resona_core::remap;
///
/// assert_eq!(remap(0.0, 0.0, 127.0, 20.0, 2000.0), 20.0);
/// assert_eq!(remap(127.0, 0.0, 127.0, 20.0, 2000.0), 2000.0);
/// ```
#[inline]
pub fn remap(value: f32, lo0: f32, hi0: f32, lo1: f32, hi1: f32) -> f32 {
    (value - lo0) / (hi0 - lo0) * (hi1 - lo1) + lo1
}
