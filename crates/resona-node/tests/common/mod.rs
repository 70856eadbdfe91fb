//! Scripted module doubles shared by the integration tests.
//!
//! `FakeDsp` honors the real module conventions: parameters live in the
//! arena at `dsp + 4 * index`, and audio is written through the channel
//! pointer tables, so the tests exercise the computed layout for real.
#![allow(dead_code)]

use resona_core::{DspApi, LinearMemory};

/// What a `FakeDsp` instance does per block.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// Writes the constant `gate * gain` to every output channel, reading
    /// both factors from the instance's parameter slots.
    GainGate {
        /// Parameter index of the gate.
        gate: u32,
        /// Parameter index of the gain.
        gain: u32,
    },
    /// Copies each input channel to the matching output channel.
    PassThrough,
    /// Multiplies every output channel in place by parameter 0
    /// (initialized to 1.0), a stand-in for a global effect.
    ScaleByParam0,
}

/// Scripted stand-in for a compiled module.
pub struct FakeDsp {
    /// Declared input channel count.
    pub inputs: u32,
    /// Declared output channel count.
    pub outputs: u32,
    /// Per-block behavior.
    pub behavior: Behavior,
}

impl FakeDsp {
    pub fn gain_gate(outputs: u32) -> Self {
        Self {
            inputs: 0,
            outputs,
            behavior: Behavior::GainGate { gate: 1, gain: 2 },
        }
    }

    pub fn pass_through(channels: u32) -> Self {
        Self {
            inputs: channels,
            outputs: channels,
            behavior: Behavior::PassThrough,
        }
    }

    pub fn scale_effect(outputs: u32) -> Self {
        Self {
            inputs: outputs,
            outputs,
            behavior: Behavior::ScaleByParam0,
        }
    }
}

impl DspApi for FakeDsp {
    fn init(&mut self, mem: &mut LinearMemory, dsp: u32, _sample_rate: i32) {
        if matches!(self.behavior, Behavior::ScaleByParam0) {
            mem.write_f32(dsp, 1.0);
        }
    }

    fn instance_clear(&mut self, _mem: &mut LinearMemory, _dsp: u32) {}

    fn compute(&mut self, mem: &mut LinearMemory, dsp: u32, count: u32, inputs: u32, outputs: u32) {
        match self.behavior {
            Behavior::GainGate { gate, gain } => {
                let value = mem.read_f32(dsp + 4 * gate) * mem.read_f32(dsp + 4 * gain);
                for chan in 0..self.outputs {
                    let base = mem.read_u32(outputs + 4 * chan);
                    mem.fill_samples(base, count as usize, value);
                }
            }
            Behavior::PassThrough => {
                let mut block = vec![0.0f32; count as usize];
                for chan in 0..self.outputs.min(self.inputs) {
                    let src = mem.read_u32(inputs + 4 * chan);
                    let dst = mem.read_u32(outputs + 4 * chan);
                    mem.read_samples(src, &mut block);
                    mem.write_samples(dst, &block);
                }
            }
            Behavior::ScaleByParam0 => {
                let scale = mem.read_f32(dsp);
                let mut block = vec![0.0f32; count as usize];
                for chan in 0..self.outputs {
                    let base = mem.read_u32(outputs + 4 * chan);
                    mem.read_samples(base, &mut block);
                    for sample in &mut block {
                        *sample *= scale;
                    }
                    mem.write_samples(base, &block);
                }
            }
        }
    }

    fn param_value(&mut self, mem: &mut LinearMemory, dsp: u32, index: u32) -> f32 {
        mem.read_f32(dsp + 4 * index)
    }

    fn set_param_value(&mut self, mem: &mut LinearMemory, dsp: u32, index: u32, value: f32) {
        mem.write_f32(dsp + 4 * index, value);
    }

    fn num_inputs(&mut self, _mem: &mut LinearMemory, _dsp: u32) -> u32 {
        self.inputs
    }

    fn num_outputs(&mut self, _mem: &mut LinearMemory, _dsp: u32) -> u32 {
        self.outputs
    }
}

/// Voice metadata: freq/gate/gain at indices 0/1/2, a bound volume
/// slider at 3, a pitch-wheel bend at 4, and an output bar graph at 5.
pub const VOICE_JSON: &str = r#"{
    "name": "vtone",
    "size": 32,
    "inputs": 0,
    "outputs": 1,
    "ui": [{
        "type": "vgroup",
        "label": "vtone",
        "items": [
            { "type": "hslider", "label": "freq", "address": "/vtone/freq",
              "index": 0, "init": 440, "min": 20, "max": 2000, "step": 1 },
            { "type": "button", "label": "gate", "address": "/vtone/gate", "index": 1 },
            { "type": "hslider", "label": "gain", "address": "/vtone/gain",
              "index": 2, "init": 0.5, "min": 0, "max": 1, "step": 0.01 },
            { "type": "hslider", "label": "volume", "address": "/vtone/volume",
              "index": 3, "init": 20, "min": 20, "max": 2000, "step": 1,
              "meta": [{ "midi": "ctrl 7" }] },
            { "type": "hslider", "label": "bend", "address": "/vtone/bend",
              "index": 4, "init": 0, "min": -2, "max": 2, "step": 0.01,
              "meta": [{ "midi": "pitchwheel" }] },
            { "type": "hbargraph", "label": "level", "address": "/vtone/level",
              "index": 5, "min": 0, "max": 1 }
        ]
    }]
}"#;

/// Effect metadata: a single scale control at index 0.
pub const EFFECT_JSON: &str = r#"{
    "name": "fx",
    "size": 16,
    "inputs": 1,
    "outputs": 1,
    "ui": [{
        "type": "vgroup",
        "label": "fx",
        "items": [
            { "type": "hslider", "label": "scale", "address": "/fx/scale",
              "index": 0, "init": 1, "min": 0, "max": 1, "step": 0.01 }
        ]
    }]
}"#;

/// Voice state size declared by `VOICE_JSON`.
pub const VOICE_SIZE: u32 = 32;

/// Effect state size declared by `EFFECT_JSON`.
pub const EFFECT_SIZE: u32 = 16;
