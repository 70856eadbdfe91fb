//! One polyphonic voice: a module instance bound to a note.
//!
//! A voice owns no module of its own: all voices in a pool share one
//! [`DspApi`] and address their private state by byte offset. What a
//! voice does own is its lifecycle: the state tag, the bound note, the
//! allocation stamp the pool uses for stealing, and the release window
//! that bounds how long a tail may ring after the gate drops.

use resona_core::{ControlMap, DspApi, LinearMemory};

/// Output level below which a releasing voice is considered silent.
pub const VOICE_STOP_LEVEL: f32 = 0.0005;

/// Lifecycle of a voice slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    /// Available for allocation.
    Free,
    /// Sounding with the gate held.
    Active,
    /// Gate released, tail decaying.
    Releasing,
}

/// How a MIDI note number reaches the module's pitch control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum PitchMapping {
    /// Equal-tempered frequency, A4 (note 69) = 440 Hz.
    #[default]
    Frequency,
    /// The raw note number.
    Key,
}

/// How MIDI velocity reaches the module's level control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum VelocityMapping {
    /// Normalized to 0..1 (`velocity / 127`).
    #[default]
    Normalized,
    /// The raw velocity value.
    Raw,
}

/// Parameter indices a voice drives on key events, resolved once from
/// the control map by conventional address suffix.
///
/// `/freq` and `/key` are mutually exclusive pitch conventions
/// (last-registered wins), as are `/gain` versus `/vel` and `/velocity`
/// for level. `/vel` and `/velocity` are synonyms.
#[derive(Debug, Clone, Default)]
pub struct VoiceBindings {
    pitch: PitchMapping,
    velocity: VelocityMapping,
    freq: Vec<u32>,
    gate: Vec<u32>,
    gain: Vec<u32>,
}

impl VoiceBindings {
    /// Scans the input controls for the key/gate/gain conventions.
    pub fn from_controls(controls: &ControlMap) -> Self {
        let mut bindings = Self::default();
        for path in controls.inputs() {
            let Some(index) = controls.index_of(path) else {
                continue;
            };
            if path.ends_with("/gate") {
                bindings.gate.push(index);
            } else if path.ends_with("/freq") {
                bindings.pitch = PitchMapping::Frequency;
                bindings.freq.push(index);
            } else if path.ends_with("/key") {
                bindings.pitch = PitchMapping::Key;
                bindings.freq.push(index);
            } else if path.ends_with("/gain") {
                bindings.velocity = VelocityMapping::Normalized;
                bindings.gain.push(index);
            } else if path.ends_with("/vel") || path.ends_with("/velocity") {
                bindings.velocity = VelocityMapping::Raw;
                bindings.gain.push(index);
            }
        }
        bindings
    }

    fn pitch_value(&self, pitch: u8) -> f32 {
        match self.pitch {
            PitchMapping::Frequency => midi_to_freq(pitch),
            PitchMapping::Key => f32::from(pitch),
        }
    }

    fn velocity_value(&self, velocity: u8) -> f32 {
        match self.velocity {
            VelocityMapping::Normalized => f32::from(velocity) / 127.0,
            VelocityMapping::Raw => f32::from(velocity),
        }
    }
}

/// One voice slot of a polyphonic pool.
#[derive(Debug)]
pub struct Voice {
    dsp: u32,
    state: VoiceState,
    note: Option<u8>,
    stamp: u64,
    release: i64,
    max_release: i64,
    level: f32,
    bindings: VoiceBindings,
}

impl Voice {
    /// Creates and initializes a voice whose state lives at offset `dsp`.
    pub(crate) fn new(
        api: &mut dyn DspApi,
        mem: &mut LinearMemory,
        dsp: u32,
        bindings: VoiceBindings,
        sample_rate: i32,
    ) -> Self {
        api.init(mem, dsp, sample_rate);
        Self {
            dsp,
            state: VoiceState::Free,
            note: None,
            stamp: 0,
            release: 0,
            max_release: i64::from(sample_rate) / 2,
            level: 0.0,
            bindings,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> VoiceState {
        self.state
    }

    /// The bound MIDI note while Active or Releasing.
    pub fn note(&self) -> Option<u8> {
        self.note
    }

    /// Pool-issued allocation stamp; smaller means allocated earlier.
    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    /// Peak output level of the last computed block.
    pub fn level(&self) -> f32 {
        self.level
    }

    /// True when the slot is available.
    pub fn is_free(&self) -> bool {
        self.state == VoiceState::Free
    }

    /// Binds the voice to a note: clears the instance's signal state,
    /// writes pitch, gate and velocity through the resolved bindings, and
    /// marks the slot Active under a fresh allocation stamp.
    pub(crate) fn key_on(
        &mut self,
        api: &mut dyn DspApi,
        mem: &mut LinearMemory,
        pitch: u8,
        velocity: u8,
        stamp: u64,
    ) {
        api.instance_clear(mem, self.dsp);
        let freq = self.bindings.pitch_value(pitch);
        for &index in &self.bindings.freq {
            api.set_param_value(mem, self.dsp, index, freq);
        }
        for &index in &self.bindings.gate {
            api.set_param_value(mem, self.dsp, index, 1.0);
        }
        let gain = self.bindings.velocity_value(velocity);
        for &index in &self.bindings.gain {
            api.set_param_value(mem, self.dsp, index, gain);
        }
        self.note = Some(pitch);
        self.state = VoiceState::Active;
        self.stamp = stamp;
    }

    /// Drops the gate. A hard release frees the slot immediately; a soft
    /// release opens the bounded tail window of `sample_rate / 2` frames.
    pub(crate) fn key_off(&mut self, api: &mut dyn DspApi, mem: &mut LinearMemory, hard: bool) {
        for &index in &self.bindings.gate {
            api.set_param_value(mem, self.dsp, index, 0.0);
        }
        if hard {
            self.state = VoiceState::Free;
            self.note = None;
        } else {
            self.release = self.max_release;
            self.state = VoiceState::Releasing;
        }
    }

    /// Runs one block unconditionally (a releasing tail still sounds)
    /// and burns down the release window.
    pub(crate) fn compute(
        &mut self,
        api: &mut dyn DspApi,
        mem: &mut LinearMemory,
        count: u32,
        inputs: u32,
        outputs: u32,
    ) {
        api.compute(mem, self.dsp, count, inputs, outputs);
        self.release -= i64::from(count);
    }

    /// Records the mixed block's peak level. A releasing voice frees its
    /// slot once the tail goes quiet or the release window runs out,
    /// whichever comes first.
    pub(crate) fn settle(&mut self, level: f32) {
        self.level = level;
        if self.state == VoiceState::Releasing && (level < VOICE_STOP_LEVEL || self.release < 0) {
            self.state = VoiceState::Free;
            self.note = None;
        }
    }

    /// Writes a parameter on this voice's instance.
    pub(crate) fn set_param_value(
        &self,
        api: &mut dyn DspApi,
        mem: &mut LinearMemory,
        index: u32,
        value: f32,
    ) {
        api.set_param_value(mem, self.dsp, index, value);
    }

    /// Reads a parameter from this voice's instance.
    pub(crate) fn param_value(
        &self,
        api: &mut dyn DspApi,
        mem: &mut LinearMemory,
        index: u32,
    ) -> f32 {
        api.param_value(mem, self.dsp, index)
    }
}

/// MIDI note number to frequency, A4 (note 69) = 440 Hz.
#[inline]
pub fn midi_to_freq(note: u8) -> f32 {
    440.0 * libm::powf(2.0, (f32::from(note) - 69.0) / 12.0)
}
