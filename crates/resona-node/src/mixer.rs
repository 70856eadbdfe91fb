//! Stock arena-backed voice mixer.
//!
//! Polyphonic pools consume the mixer through the [`MixerApi`] contract;
//! hosts that ship a compiled mixer module bind that instead. This
//! implementation works directly on the shared arena: clear, sample-wise
//! add with no per-voice normalization, and a running peak as the
//! returned level.

use resona_core::{LinearMemory, MixerApi};

/// Mixer over the shared arena's channel pointer tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct BufferMixer;

impl MixerApi for BufferMixer {
    fn clear_output(&mut self, mem: &mut LinearMemory, count: u32, num_outputs: u32, outputs: u32) {
        for chan in 0..num_outputs {
            let base = mem.read_u32(outputs + 4 * chan);
            mem.fill_samples(base, count as usize, 0.0);
        }
    }

    fn mix_voice(
        &mut self,
        mem: &mut LinearMemory,
        count: u32,
        num_outputs: u32,
        inputs: u32,
        outputs: u32,
    ) -> f32 {
        let mut peak = 0.0f32;
        for chan in 0..num_outputs {
            let src = mem.read_u32(inputs + 4 * chan);
            let dst = mem.read_u32(outputs + 4 * chan);
            for frame in 0..count {
                let sample = mem.read_f32(src + 4 * frame);
                peak = peak.max(sample.abs());
                let sum = mem.read_f32(dst + 4 * frame) + sample;
                mem.write_f32(dst + 4 * frame, sum);
            }
        }
        peak
    }
}
