//! Resona core - compiled-module metadata, control tables, and arena
//! layout.
//!
//! This crate holds the leaf layer of the resona runtime: everything a
//! node needs to know about a compiled DSP module before a single block
//! of audio runs, with no knowledge of voices or nodes.
//!
//! # Components
//!
//! - [`DspMetadata`] / [`UiItem`] / [`ControlKind`] - the compiler's JSON
//!   description of a module: arena size, channel counts, and the
//!   recursive UI tree, classified into a closed control set at
//!   traversal time via [`visit_controls`]
//! - [`ControlMap`] - address→index bindings plus MIDI controller and
//!   pitch-wheel routing tables, built in one traversal; [`remap`] is
//!   the linear range mapping the MIDI router applies
//! - [`MemoryLayout`] / [`LayoutConfig`] - deterministic placement of
//!   channel pointer tables and sample regions inside the arena, in the
//!   exact order the module ABI expects
//! - [`LinearMemory`] - the byte-addressable arena itself; offsets in,
//!   offsets out, no pointers
//! - [`DspApi`] / [`MixerApi`] - the consumed ABI contracts, bound by
//!   the host to a compiled module's exports
//! - [`ConfigError`] - construction-time failures
//!
//! # Example
//!
//! ```rust
//! use resona_core::{ControlMap, DspMetadata, MemoryLayout};
//!
//! let metadata = DspMetadata::parse(
//!     r#"{
//!         "size": 128, "inputs": 0, "outputs": 1,
//!         "ui": [{ "type": "vgroup", "label": "s", "items": [
//!             { "type": "hslider", "label": "gain", "address": "/s/gain",
//!               "index": 0, "init": 0.5, "min": 0, "max": 1, "step": 0.01 }
//!         ]}]
//!     }"#,
//! )?;
//!
//! let mut controls = ControlMap::new();
//! controls.absorb(&metadata.ui);
//! assert_eq!(controls.index_of("/s/gain"), Some(0));
//!
//! let layout = MemoryLayout::mono(metadata.size, metadata.inputs, metadata.outputs, 128);
//! assert_eq!(layout.audio_inputs, 128);
//! # Ok::<(), resona_core::ConfigError>(())
//! ```

pub mod api;
pub mod controls;
pub mod error;
pub mod layout;
pub mod memory;
pub mod metadata;

pub use api::{DspApi, MixerApi};
pub use controls::{ControlMap, MidiBinding, remap};
pub use error::ConfigError;
pub use layout::{DEFAULT_POINTER_WIDTH, DEFAULT_SAMPLE_WIDTH, LayoutConfig, MemoryLayout};
pub use memory::LinearMemory;
pub use metadata::{ControlKind, DspMetadata, UiItem, visit_controls};
