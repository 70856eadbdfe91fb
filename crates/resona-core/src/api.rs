//! ABI contracts for compiled modules and the voice mixer.
//!
//! The runtime consumes these interfaces; it never implements the DSP
//! itself. A production host binds them to a compiled module's exports;
//! tests bind them to scripted doubles. Every call takes the arena
//! explicitly and addresses instance state by byte offset (the `dsp`
//! argument), so one module can serve many instances (a voice bank) out
//! of a single address space.

use crate::memory::LinearMemory;

/// Calls into one compiled DSP module.
///
/// `dsp` is the byte offset of an instance's state region inside `mem`.
/// `inputs` and `outputs` are offsets of pointer tables whose 4-byte
/// slots hold the per-channel sample region offsets (see the layout
/// module); the module dereferences the channels itself.
pub trait DspApi {
    /// Initializes the instance at `dsp` for `sample_rate`, including its
    /// user-facing parameter defaults.
    fn init(&mut self, mem: &mut LinearMemory, dsp: u32, sample_rate: i32);

    /// Resets the instance's internal signal state (delay lines, phases)
    /// without touching its parameters.
    fn instance_clear(&mut self, mem: &mut LinearMemory, dsp: u32);

    /// Runs one block of `count` frames.
    fn compute(&mut self, mem: &mut LinearMemory, dsp: u32, count: u32, inputs: u32, outputs: u32);

    /// Reads the parameter at `index` in the instance's parameter vector.
    fn param_value(&mut self, mem: &mut LinearMemory, dsp: u32, index: u32) -> f32;

    /// Writes the parameter at `index`. A single aligned write, safe to
    /// issue from outside the audio callback without locks.
    fn set_param_value(&mut self, mem: &mut LinearMemory, dsp: u32, index: u32, value: f32);

    /// Number of audio input channels the module was compiled with.
    fn num_inputs(&mut self, mem: &mut LinearMemory, dsp: u32) -> u32;

    /// Number of audio output channels the module was compiled with.
    fn num_outputs(&mut self, mem: &mut LinearMemory, dsp: u32) -> u32;
}

/// Mixes voice blocks into a shared accumulator.
///
/// Both methods address channel buffers through pointer tables, exactly
/// like [`DspApi::compute`].
pub trait MixerApi {
    /// Zero-fills `num_outputs` channel buffers of `count` frames,
    /// addressed through the pointer table at `outputs`.
    fn clear_output(&mut self, mem: &mut LinearMemory, count: u32, num_outputs: u32, outputs: u32);

    /// Adds the channels addressed through `inputs` into the channels
    /// addressed through `outputs`, sample-wise with no normalization,
    /// and returns the peak absolute sample seen in the source block.
    fn mix_voice(
        &mut self,
        mem: &mut LinearMemory,
        count: u32,
        num_outputs: u32,
        inputs: u32,
        outputs: u32,
    ) -> f32;
}
