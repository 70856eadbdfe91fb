//! Mono and polyphonic audio nodes over compiled DSP modules.
//!
//! A node is the externally visible unit: the host's audio callback
//! hands it one block of channel buffers per period, and everything else
//! (parameter writes, MIDI, output polling) arrives between blocks.
//! `compute` copies the host input into the arena's input region,
//! delegates to the module (or the voice pool), copies the output region
//! back out, and polls output-only controls on a decimated schedule so
//! the UI is not flooded at block rate.
//!
//! Nothing on the compute path blocks, allocates, or returns errors:
//! empty or undersized host buffers early-return, and `compute` reports
//! `false` only once the node has been destroyed.

use std::collections::HashSet;

use resona_core::{
    ConfigError, ControlMap, DspApi, DspMetadata, LinearMemory, MemoryLayout, remap,
    visit_controls,
};

use crate::midi::MidiEvent;
use crate::pool::{PolyInstance, VoicePool};
use crate::voice::VoiceBindings;

/// Callback receiving `(address, value)` for output-control polls and
/// router-driven writes. Fires synchronously from the calling thread,
/// immediately after the triggering write.
pub type OutputParamHandler = Box<dyn FnMut(&str, f32) + Send>;

/// Callback receiving the block size at the top of every compute call.
pub type ComputeHandler = Box<dyn FnMut(usize) + Send>;

/// Blocks skipped between output-control notifications.
const OUTPUT_POLL_PERIOD: u32 = 5;

/// Decimation counter for throttled output-control notification.
#[derive(Debug)]
struct OutputPoll {
    countdown: u32,
}

impl OutputPoll {
    fn new() -> Self {
        Self {
            countdown: OUTPUT_POLL_PERIOD,
        }
    }

    /// True when this block should notify; reopens the window when it
    /// fires.
    fn tick(&mut self) -> bool {
        if self.countdown == 0 {
            self.countdown = OUTPUT_POLL_PERIOD;
            true
        } else {
            self.countdown -= 1;
            false
        }
    }
}

/// A single module instance wrapped as a live audio node.
pub struct MonoNode {
    api: Box<dyn DspApi>,
    mem: LinearMemory,
    layout: MemoryLayout,
    controls: ControlMap,
    poll: OutputPoll,
    output_handler: Option<OutputParamHandler>,
    compute_handler: Option<ComputeHandler>,
    buffer_size: usize,
    num_inputs: usize,
    num_outputs: usize,
    destroyed: bool,
}

impl MonoNode {
    /// Builds a node over a fresh arena: computes and installs the
    /// channel layout, then initializes the module instance at offset 0.
    pub fn new(
        mut api: Box<dyn DspApi>,
        mut memory: LinearMemory,
        metadata: &DspMetadata,
        sample_rate: i32,
        buffer_size: usize,
    ) -> Result<Self, ConfigError> {
        if buffer_size == 0 {
            return Err(ConfigError::ZeroBufferSize);
        }

        let mut controls = ControlMap::new();
        controls.absorb(&metadata.ui);

        let num_inputs = api.num_inputs(&mut memory, 0);
        let num_outputs = api.num_outputs(&mut memory, 0);
        let layout = MemoryLayout::mono(metadata.size, num_inputs, num_outputs, buffer_size as u32);
        if !layout.fits(&memory) {
            return Err(ConfigError::ArenaTooSmall {
                needed: layout.total_size,
                available: memory.len(),
            });
        }
        layout.install(&mut memory);
        api.init(&mut memory, 0, sample_rate);

        tracing::debug!(
            name = %metadata.name,
            state = metadata.size,
            inputs = num_inputs,
            outputs = num_outputs,
            total = layout.total_size,
            "mono arena layout"
        );

        Ok(Self {
            api,
            mem: memory,
            layout,
            controls,
            poll: OutputPoll::new(),
            output_handler: None,
            compute_handler: None,
            buffer_size,
            num_inputs: num_inputs as usize,
            num_outputs: num_outputs as usize,
            destroyed: false,
        })
    }

    /// Number of audio input channels.
    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    /// Number of audio output channels.
    pub fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    /// Input control addresses, in metadata order.
    pub fn params(&self) -> &[String] {
        self.controls.inputs()
    }

    /// Registers (or clears) the output-parameter callback.
    pub fn set_output_param_handler(&mut self, handler: Option<OutputParamHandler>) {
        self.output_handler = handler;
    }

    /// Registers (or clears) the per-block compute hook.
    pub fn set_compute_handler(&mut self, handler: Option<ComputeHandler>) {
        self.compute_handler = handler;
    }

    /// Runs one block. Returns `false` only once destroyed; blocks with
    /// missing or empty host buffers are skipped and still report `true`.
    pub fn compute(&mut self, inputs: &[&[f32]], outputs: &mut [&mut [f32]]) -> bool {
        if self.destroyed {
            return false;
        }
        if self.num_inputs > 0 && inputs.first().is_none_or(|chan| chan.is_empty()) {
            return true;
        }
        if self.num_outputs > 0 && outputs.first().is_none_or(|chan| chan.is_empty()) {
            return true;
        }

        for (chan, host) in inputs.iter().enumerate().take(self.num_inputs) {
            let frames = host.len().min(self.buffer_size);
            self.mem
                .write_samples(self.layout.input_channels[chan], &host[..frames]);
        }

        if let Some(hook) = self.compute_handler.as_mut() {
            hook(self.buffer_size);
        }
        self.api.compute(
            &mut self.mem,
            0,
            self.buffer_size as u32,
            self.layout.audio_inputs,
            self.layout.audio_outputs,
        );
        self.update_outputs();

        for (chan, host) in outputs.iter_mut().enumerate().take(self.num_outputs) {
            let frames = host.len().min(self.buffer_size);
            self.mem
                .read_samples(self.layout.output_channels[chan], &mut host[..frames]);
        }
        true
    }

    fn update_outputs(&mut self) {
        if self.controls.outputs().is_empty() || self.output_handler.is_none() {
            return;
        }
        if !self.poll.tick() {
            return;
        }
        let Some(handler) = self.output_handler.as_mut() else {
            return;
        };
        for path in self.controls.outputs() {
            let Some(index) = self.controls.index_of(path) else {
                continue;
            };
            let value = self.api.param_value(&mut self.mem, 0, index);
            handler(path, value);
        }
    }

    /// Writes a parameter by address. Unknown addresses are logged
    /// no-ops: they may legitimately come from loosely validated
    /// external metadata.
    pub fn set_param_value(&mut self, path: &str, value: f32) {
        match self.controls.index_of(path) {
            Some(index) => self.api.set_param_value(&mut self.mem, 0, index, value),
            None => tracing::warn!(path, "set_param_value: unknown parameter address"),
        }
    }

    /// Reads a parameter by address; unknown addresses read as 0.
    pub fn param_value(&mut self, path: &str) -> f32 {
        match self.controls.index_of(path) {
            Some(index) => self.api.param_value(&mut self.mem, 0, index),
            None => {
                tracing::warn!(path, "param_value: unknown parameter address");
                0.0
            }
        }
    }

    /// Remaps a controller value onto every control bound to `ctrl` and
    /// notifies the output handler with each value read back.
    pub fn ctrl_change(&mut self, _channel: u8, ctrl: u8, value: u8) {
        for binding in self.controls.ctrl_bindings(ctrl) {
            let Some(index) = self.controls.index_of(&binding.path) else {
                continue;
            };
            let mapped = remap(f32::from(value), 0.0, 127.0, binding.min, binding.max);
            self.api.set_param_value(&mut self.mem, 0, index, mapped);
            if let Some(handler) = self.output_handler.as_mut() {
                let read_back = self.api.param_value(&mut self.mem, 0, index);
                handler(&binding.path, read_back);
            }
        }
    }

    /// Remaps a 14-bit wheel position onto every pitch-wheel-bound
    /// control.
    pub fn pitch_wheel(&mut self, _channel: u8, wheel: u16) {
        for binding in self.controls.pitchwheel_bindings() {
            let Some(index) = self.controls.index_of(&binding.path) else {
                continue;
            };
            let mapped = remap(f32::from(wheel), 0.0, 16383.0, binding.min, binding.max);
            self.api.set_param_value(&mut self.mem, 0, index, mapped);
            if let Some(handler) = self.output_handler.as_mut() {
                let read_back = self.api.param_value(&mut self.mem, 0, index);
                handler(&binding.path, read_back);
            }
        }
    }

    /// Routes a raw MIDI message. A mono node routes controllers and the
    /// pitch wheel; note messages have no voice to land on.
    pub fn midi_message(&mut self, data: &[u8]) {
        match MidiEvent::parse(data) {
            Some(MidiEvent::CtrlChange {
                channel,
                ctrl,
                value,
            }) => self.ctrl_change(channel, ctrl, value),
            Some(MidiEvent::PitchWheel { channel, value }) => self.pitch_wheel(channel, value),
            _ => {}
        }
    }

    /// Revokes the node. Idempotent; every later `compute` reports
    /// `false` and the handlers are dropped.
    pub fn destroy(&mut self) {
        self.destroyed = true;
        self.output_handler = None;
        self.compute_handler = None;
    }
}

/// A polyphonic voice bank wrapped as a live audio node.
pub struct PolyNode {
    pool: VoicePool,
    controls: ControlMap,
    effect_paths: HashSet<String>,
    poll: OutputPoll,
    output_handler: Option<OutputParamHandler>,
    compute_handler: Option<ComputeHandler>,
    buffer_size: usize,
    num_inputs: usize,
    num_outputs: usize,
    destroyed: bool,
}

impl PolyNode {
    /// Builds a polyphonic node: absorbs the voice UI (and the effect UI,
    /// when an effect module and its description are both supplied) into
    /// one control map, resolves the voices' key/gate/gain bindings, and
    /// lays out the shared arena for the whole bank.
    pub fn new(
        mut instance: PolyInstance,
        voice_metadata: &DspMetadata,
        effect_metadata: Option<&DspMetadata>,
        sample_rate: i32,
        buffer_size: usize,
    ) -> Result<Self, ConfigError> {
        if buffer_size == 0 {
            return Err(ConfigError::ZeroBufferSize);
        }

        let mut controls = ControlMap::new();
        controls.absorb(&voice_metadata.ui);

        // The effect is usable only with both its module and description.
        let effect_metadata = if instance.effect_api.is_some() {
            effect_metadata
        } else {
            None
        };
        if effect_metadata.is_none() {
            instance.effect_api = None;
        }

        let mut effect_paths = HashSet::new();
        let mut effect_size = 0;
        if let Some(effect) = effect_metadata {
            visit_controls(&effect.ui, &mut |item, _| {
                effect_paths.insert(item.address.clone());
            });
            controls.absorb(&effect.ui);
            effect_size = effect.size;
        }

        let bindings = VoiceBindings::from_controls(&controls);
        let voices = instance.voices;
        let pool = VoicePool::new(
            instance,
            voice_metadata.size,
            effect_size,
            &bindings,
            sample_rate,
            buffer_size as u32,
        )?;

        tracing::debug!(
            name = %voice_metadata.name,
            voices,
            voice_state = voice_metadata.size,
            effect_state = effect_size,
            total = pool.layout().total_size,
            "poly arena layout"
        );

        let num_inputs = pool.num_inputs() as usize;
        let num_outputs = pool.num_outputs() as usize;
        Ok(Self {
            pool,
            controls,
            effect_paths,
            poll: OutputPoll::new(),
            output_handler: None,
            compute_handler: None,
            buffer_size,
            num_inputs,
            num_outputs,
            destroyed: false,
        })
    }

    /// Number of audio input channels.
    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    /// Number of audio output channels.
    pub fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    /// Input control addresses, in metadata order.
    pub fn params(&self) -> &[String] {
        self.controls.inputs()
    }

    /// Read access to the voice pool.
    pub fn pool(&self) -> &VoicePool {
        &self.pool
    }

    /// Registers (or clears) the output-parameter callback.
    pub fn set_output_param_handler(&mut self, handler: Option<OutputParamHandler>) {
        self.output_handler = handler;
    }

    /// Registers (or clears) the per-block compute hook.
    pub fn set_compute_handler(&mut self, handler: Option<ComputeHandler>) {
        self.compute_handler = handler;
    }

    /// Runs one block through the pool. Same early-return and destroy
    /// semantics as [`MonoNode::compute`].
    pub fn compute(&mut self, inputs: &[&[f32]], outputs: &mut [&mut [f32]]) -> bool {
        if self.destroyed {
            return false;
        }
        if self.num_inputs > 0 && inputs.first().is_none_or(|chan| chan.is_empty()) {
            return true;
        }
        if self.num_outputs > 0 && outputs.first().is_none_or(|chan| chan.is_empty()) {
            return true;
        }

        for (chan, host) in inputs.iter().enumerate().take(self.num_inputs) {
            let frames = host.len().min(self.buffer_size);
            self.pool.write_input(chan, &host[..frames]);
        }

        if let Some(hook) = self.compute_handler.as_mut() {
            hook(self.buffer_size);
        }
        self.pool.compute(self.buffer_size as u32);
        self.update_outputs();

        for (chan, host) in outputs.iter_mut().enumerate().take(self.num_outputs) {
            let frames = host.len().min(self.buffer_size);
            self.pool.read_output(chan, &mut host[..frames]);
        }
        true
    }

    fn update_outputs(&mut self) {
        if self.controls.outputs().is_empty() || self.output_handler.is_none() {
            return;
        }
        if !self.poll.tick() {
            return;
        }
        let Some(handler) = self.output_handler.as_mut() else {
            return;
        };
        for path in self.controls.outputs() {
            let Some(index) = self.controls.index_of(path) else {
                continue;
            };
            let value = if self.effect_paths.contains(path) && self.pool.has_effect() {
                self.pool.effect_param(index)
            } else {
                self.pool.voice_param(index)
            };
            handler(path, value);
        }
    }

    /// Writes a parameter by address: to the global effect when the
    /// address belongs to its tree, otherwise fanned out to every voice.
    pub fn set_param_value(&mut self, path: &str, value: f32) {
        let Some(index) = self.controls.index_of(path) else {
            tracing::warn!(path, "set_param_value: unknown parameter address");
            return;
        };
        if self.effect_paths.contains(path) && self.pool.has_effect() {
            self.pool.set_effect_param(index, value);
        } else {
            self.pool.set_voice_param(index, value);
        }
    }

    /// Reads a parameter by address, from the effect or from the first
    /// voice; unknown addresses read as 0.
    pub fn param_value(&mut self, path: &str) -> f32 {
        let Some(index) = self.controls.index_of(path) else {
            tracing::warn!(path, "param_value: unknown parameter address");
            return 0.0;
        };
        if self.effect_paths.contains(path) && self.pool.has_effect() {
            self.pool.effect_param(index)
        } else {
            self.pool.voice_param(index)
        }
    }

    /// Allocates a voice for the note and binds it.
    pub fn key_on(&mut self, _channel: u8, pitch: u8, velocity: u8) {
        self.pool.key_on(pitch, velocity);
    }

    /// Releases the voice bound to the note into its decay tail.
    pub fn key_off(&mut self, _channel: u8, pitch: u8) {
        self.pool.key_off(pitch);
    }

    /// Releases every voice; `hard` silences immediately.
    pub fn all_notes_off(&mut self, hard: bool) {
        self.pool.all_notes_off(hard);
    }

    /// Remaps a controller value onto its bound controls. Controllers
    /// 120 (all sound off) and 123 (all notes off) hard-release the pool
    /// instead.
    pub fn ctrl_change(&mut self, _channel: u8, ctrl: u8, value: u8) {
        if ctrl == 120 || ctrl == 123 {
            self.all_notes_off(true);
            return;
        }
        for binding in self.controls.ctrl_bindings(ctrl) {
            let Some(index) = self.controls.index_of(&binding.path) else {
                continue;
            };
            let mapped = remap(f32::from(value), 0.0, 127.0, binding.min, binding.max);
            let to_effect = self.effect_paths.contains(&binding.path) && self.pool.has_effect();
            if to_effect {
                self.pool.set_effect_param(index, mapped);
            } else {
                self.pool.set_voice_param(index, mapped);
            }
            if let Some(handler) = self.output_handler.as_mut() {
                let read_back = if to_effect {
                    self.pool.effect_param(index)
                } else {
                    self.pool.voice_param(index)
                };
                handler(&binding.path, read_back);
            }
        }
    }

    /// Remaps a 14-bit wheel position onto every pitch-wheel-bound
    /// control.
    pub fn pitch_wheel(&mut self, _channel: u8, wheel: u16) {
        for binding in self.controls.pitchwheel_bindings() {
            let Some(index) = self.controls.index_of(&binding.path) else {
                continue;
            };
            let mapped = remap(f32::from(wheel), 0.0, 16383.0, binding.min, binding.max);
            let to_effect = self.effect_paths.contains(&binding.path) && self.pool.has_effect();
            if to_effect {
                self.pool.set_effect_param(index, mapped);
            } else {
                self.pool.set_voice_param(index, mapped);
            }
            if let Some(handler) = self.output_handler.as_mut() {
                let read_back = if to_effect {
                    self.pool.effect_param(index)
                } else {
                    self.pool.voice_param(index)
                };
                handler(&binding.path, read_back);
            }
        }
    }

    /// Routes a raw MIDI message: notes to the pool, controllers and the
    /// pitch wheel through the control router.
    pub fn midi_message(&mut self, data: &[u8]) {
        match MidiEvent::parse(data) {
            Some(MidiEvent::NoteOn {
                channel,
                pitch,
                velocity,
            }) => self.key_on(channel, pitch, velocity),
            Some(MidiEvent::NoteOff { channel, pitch }) => self.key_off(channel, pitch),
            Some(MidiEvent::CtrlChange {
                channel,
                ctrl,
                value,
            }) => self.ctrl_change(channel, ctrl, value),
            Some(MidiEvent::PitchWheel { channel, value }) => self.pitch_wheel(channel, value),
            None => {}
        }
    }

    /// Revokes the node. Idempotent; every later `compute` reports
    /// `false` and the handlers are dropped.
    pub fn destroy(&mut self) {
        self.destroyed = true;
        self.output_handler = None;
        self.compute_handler = None;
    }
}

/// The externally visible node: one compiled program, mono or
/// polyphonic. Dispatch is a plain match over the closed variant set.
pub enum AudioNode {
    /// A single module instance.
    Mono(MonoNode),
    /// A voice bank with optional global effect.
    Poly(PolyNode),
}

impl AudioNode {
    /// Runs one block. See [`MonoNode::compute`].
    pub fn compute(&mut self, inputs: &[&[f32]], outputs: &mut [&mut [f32]]) -> bool {
        match self {
            Self::Mono(node) => node.compute(inputs, outputs),
            Self::Poly(node) => node.compute(inputs, outputs),
        }
    }

    /// Number of audio input channels.
    pub fn num_inputs(&self) -> usize {
        match self {
            Self::Mono(node) => node.num_inputs(),
            Self::Poly(node) => node.num_inputs(),
        }
    }

    /// Number of audio output channels.
    pub fn num_outputs(&self) -> usize {
        match self {
            Self::Mono(node) => node.num_outputs(),
            Self::Poly(node) => node.num_outputs(),
        }
    }

    /// Input control addresses, in metadata order.
    pub fn params(&self) -> &[String] {
        match self {
            Self::Mono(node) => node.params(),
            Self::Poly(node) => node.params(),
        }
    }

    /// Writes a parameter by address.
    pub fn set_param_value(&mut self, path: &str, value: f32) {
        match self {
            Self::Mono(node) => node.set_param_value(path, value),
            Self::Poly(node) => node.set_param_value(path, value),
        }
    }

    /// Reads a parameter by address.
    pub fn param_value(&mut self, path: &str) -> f32 {
        match self {
            Self::Mono(node) => node.param_value(path),
            Self::Poly(node) => node.param_value(path),
        }
    }

    /// Registers (or clears) the output-parameter callback.
    pub fn set_output_param_handler(&mut self, handler: Option<OutputParamHandler>) {
        match self {
            Self::Mono(node) => node.set_output_param_handler(handler),
            Self::Poly(node) => node.set_output_param_handler(handler),
        }
    }

    /// Registers (or clears) the per-block compute hook.
    pub fn set_compute_handler(&mut self, handler: Option<ComputeHandler>) {
        match self {
            Self::Mono(node) => node.set_compute_handler(handler),
            Self::Poly(node) => node.set_compute_handler(handler),
        }
    }

    /// Routes a raw MIDI message.
    pub fn midi_message(&mut self, data: &[u8]) {
        match self {
            Self::Mono(node) => node.midi_message(data),
            Self::Poly(node) => node.midi_message(data),
        }
    }

    /// Remaps a controller value onto its bound controls.
    pub fn ctrl_change(&mut self, channel: u8, ctrl: u8, value: u8) {
        match self {
            Self::Mono(node) => node.ctrl_change(channel, ctrl, value),
            Self::Poly(node) => node.ctrl_change(channel, ctrl, value),
        }
    }

    /// Remaps a 14-bit wheel position onto its bound controls.
    pub fn pitch_wheel(&mut self, channel: u8, wheel: u16) {
        match self {
            Self::Mono(node) => node.pitch_wheel(channel, wheel),
            Self::Poly(node) => node.pitch_wheel(channel, wheel),
        }
    }

    /// Binds a note; a mono node has no voices and ignores it.
    pub fn key_on(&mut self, channel: u8, pitch: u8, velocity: u8) {
        match self {
            Self::Mono(_) => tracing::trace!(pitch, "key_on ignored on mono node"),
            Self::Poly(node) => node.key_on(channel, pitch, velocity),
        }
    }

    /// Releases a note; a mono node has no voices and ignores it.
    pub fn key_off(&mut self, channel: u8, pitch: u8) {
        match self {
            Self::Mono(_) => tracing::trace!(pitch, "key_off ignored on mono node"),
            Self::Poly(node) => node.key_off(channel, pitch),
        }
    }

    /// Releases every voice; a mono node has no voices and ignores it.
    pub fn all_notes_off(&mut self, hard: bool) {
        match self {
            Self::Mono(_) => {}
            Self::Poly(node) => node.all_notes_off(hard),
        }
    }

    /// Revokes the node. Idempotent.
    pub fn destroy(&mut self) {
        match self {
            Self::Mono(node) => node.destroy(),
            Self::Poly(node) => node.destroy(),
        }
    }
}
