//! Arena layout for audio channel buffers.
//!
//! A compiled module is handed a single base address and dereferences its
//! channel buffers itself, through pointer tables the host fills in. The
//! placement order inside the arena is part of the module ABI and is
//! reproduced here exactly: the module's state region first, then the
//! input and output pointer tables, then the per-channel input and output
//! sample regions. Polyphonic banks add a third "mixing" pointer table
//! and sample region, shaped like the output region, so a voice's raw
//! block can be summed into the shared accumulator without aliasing it.
//!
//! [`MemoryLayout::compute`] is a pure function: identical configuration
//! always yields identical offsets (see the property suite).

use crate::memory::LinearMemory;

/// Pointer-table slot width in bytes for a 32-bit module address space.
pub const DEFAULT_POINTER_WIDTH: u32 = 4;

/// Sample width in bytes for single-precision audio.
pub const DEFAULT_SAMPLE_WIDTH: u32 = 4;

/// Inputs to the layout computation.
///
/// `state_size` is the module's own state region: the metadata `size` for
/// a mono node, or `voices * voice_size + effect_size` for a polyphonic
/// bank. The widths default to 4 bytes each and only change for modules
/// compiled against a different ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutConfig {
    /// Bytes reserved for module state at the front of the arena.
    pub state_size: u32,
    /// Number of audio input channels.
    pub num_inputs: u32,
    /// Number of audio output channels.
    pub num_outputs: u32,
    /// Frames per compute block.
    pub buffer_size: u32,
    /// Pointer-table slot width in bytes.
    pub pointer_width: u32,
    /// Sample width in bytes.
    pub sample_width: u32,
    /// Whether to lay out the extra mixing table and sample region.
    pub with_mixing: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            state_size: 0,
            num_inputs: 0,
            num_outputs: 0,
            buffer_size: 0,
            pointer_width: DEFAULT_POINTER_WIDTH,
            sample_width: DEFAULT_SAMPLE_WIDTH,
            with_mixing: false,
        }
    }
}

/// Byte offsets of every host-visible region inside one arena.
///
/// All offsets are absolute (relative to the arena base, which is also
/// the module's address 0).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryLayout {
    /// Offset of the input-channel pointer table.
    pub audio_inputs: u32,
    /// Offset of the output-channel pointer table.
    pub audio_outputs: u32,
    /// Offset of the mixing pointer table, for polyphonic banks.
    pub audio_mixing: Option<u32>,
    /// Per-channel input sample region offsets.
    pub input_channels: Vec<u32>,
    /// Per-channel output sample region offsets.
    pub output_channels: Vec<u32>,
    /// Per-channel mixing sample region offsets, for polyphonic banks.
    pub mixing_channels: Vec<u32>,
    /// One past the last laid-out byte.
    pub total_size: u32,
}

impl MemoryLayout {
    /// Computes the layout for `config`. Deterministic and allocation-free
    /// apart from the channel offset vectors.
    pub fn compute(config: &LayoutConfig) -> Self {
        let ptr = config.pointer_width;
        let block = config.buffer_size * config.sample_width;

        let audio_inputs = config.state_size;
        let audio_outputs = audio_inputs + config.num_inputs * ptr;
        let (audio_mixing, tables_end) = if config.with_mixing {
            let mixing = audio_outputs + config.num_outputs * ptr;
            (Some(mixing), mixing + config.num_outputs * ptr)
        } else {
            (None, audio_outputs + config.num_outputs * ptr)
        };

        let inputs_base = tables_end;
        let outputs_base = inputs_base + config.num_inputs * block;
        let mixing_base = outputs_base + config.num_outputs * block;

        let input_channels = (0..config.num_inputs)
            .map(|chan| inputs_base + chan * block)
            .collect();
        let output_channels = (0..config.num_outputs)
            .map(|chan| outputs_base + chan * block)
            .collect();
        let mixing_channels = if config.with_mixing {
            (0..config.num_outputs)
                .map(|chan| mixing_base + chan * block)
                .collect()
        } else {
            Vec::new()
        };

        let total_size = if config.with_mixing {
            mixing_base + config.num_outputs * block
        } else {
            mixing_base
        };

        Self {
            audio_inputs,
            audio_outputs,
            audio_mixing,
            input_channels,
            output_channels,
            mixing_channels,
            total_size,
        }
    }

    /// Layout for a single module instance.
    ///
    /// # Example
    ///
    /// ```rust
    /// use resona_core::MemoryLayout;
    ///
    /// let layout = MemoryLayout::mono(256, 1, 2, 128);
    /// assert_eq!(layout.audio_inputs, 256);
    /// assert_eq!(layout.audio_outputs, 260);
    /// assert_eq!(layout.input_channels, vec![268]);
    /// assert_eq!(layout.output_channels, vec![780, 1292]);
    /// ```
    pub fn mono(state_size: u32, num_inputs: u32, num_outputs: u32, buffer_size: u32) -> Self {
        Self::compute(&LayoutConfig {
            state_size,
            num_inputs,
            num_outputs,
            buffer_size,
            ..LayoutConfig::default()
        })
    }

    /// Layout for a polyphonic bank: `voices` instances of `voice_size`
    /// bytes back to back, then an optional shared effect instance, then
    /// the tables and sample regions including the mixing scratch.
    pub fn poly(
        voice_size: u32,
        voices: u32,
        effect_size: u32,
        num_inputs: u32,
        num_outputs: u32,
        buffer_size: u32,
    ) -> Self {
        Self::compute(&LayoutConfig {
            state_size: voice_size * voices + effect_size,
            num_inputs,
            num_outputs,
            buffer_size,
            with_mixing: true,
            ..LayoutConfig::default()
        })
    }

    /// Writes each pointer-table slot with the absolute offset of its
    /// sample region, so the module can dereference channels itself.
    ///
    /// Slots are 4 bytes; layouts computed with a non-default
    /// `pointer_width` cannot be installed through this method.
    pub fn install(&self, mem: &mut LinearMemory) {
        for (chan, &offset) in self.input_channels.iter().enumerate() {
            mem.write_u32(self.audio_inputs + 4 * chan as u32, offset);
        }
        for (chan, &offset) in self.output_channels.iter().enumerate() {
            mem.write_u32(self.audio_outputs + 4 * chan as u32, offset);
        }
        if let Some(mixing) = self.audio_mixing {
            for (chan, &offset) in self.mixing_channels.iter().enumerate() {
                mem.write_u32(mixing + 4 * chan as u32, offset);
            }
        }
    }

    /// True when the whole layout fits inside `mem`.
    pub fn fits(&self, mem: &LinearMemory) -> bool {
        self.total_size as usize <= mem.len()
    }
}
