//! Resona node - live audio nodes over compiled DSP modules.
//!
//! This crate turns a compiled DSP module (consumed through the ABI
//! traits in `resona-core`) into a live, schedulable audio-processing
//! node: the host's audio callback drives [`AudioNode::compute`] once
//! per block, MIDI and parameter writes arrive asynchronously between
//! blocks, and output-only controls are polled on a decimated schedule
//! for the UI.
//!
//! # Core Components
//!
//! ## Nodes
//!
//! - [`AudioNode`] - the closed mono/poly variant set the host schedules
//! - [`MonoNode`] - a single module instance
//! - [`PolyNode`] - a voice bank with an optional shared effect
//!
//! ## Polyphony
//!
//! - [`VoicePool`] / [`PolyInstance`] - fixed voice bank over one shared
//!   module instance, with oldest-first two-tier stealing
//! - [`Voice`] / [`VoiceState`] / [`VoiceBindings`] - one voice's
//!   lifecycle and its resolved key/gate/gain parameter bindings
//! - [`BufferMixer`] - the stock arena-backed voice mixer
//!
//! ## MIDI
//!
//! - [`MidiEvent`] - typed channel-voice messages decoded from raw bytes
//!
//! # Example
//!
//! ```rust,ignore
//! use resona_core::{DspMetadata, LinearMemory};
//! use resona_node::{AudioNode, MonoNode};
//!
//! let metadata = DspMetadata::parse(&module_json)?;
//! let node = MonoNode::new(module_api, LinearMemory::new(1 << 16), &metadata, 48_000, 128)?;
//! let mut node = AudioNode::Mono(node);
//!
//! node.set_output_param_handler(Some(Box::new(|path, value| {
//!     println!("{path} = {value}");
//! })));
//!
//! // Inside the audio callback, once per block:
//! let running = node.compute(&input_channels, &mut output_channels);
//! ```

pub mod midi;
pub mod mixer;
pub mod node;
pub mod pool;
pub mod voice;

pub use midi::MidiEvent;
pub use mixer::BufferMixer;
pub use node::{AudioNode, ComputeHandler, MonoNode, OutputParamHandler, PolyNode};
pub use pool::{PolyInstance, VoicePool};
pub use voice::{VOICE_STOP_LEVEL, Voice, VoiceBindings, VoiceState, midi_to_freq};
