//! Polyphonic voice pool: allocation, stealing, and mixdown.
//!
//! All voices share one compiled module instance; each addresses its
//! private state at `voice_size * index` inside the shared arena, with
//! the optional global effect instance placed directly after the last
//! voice. Computation is two-stage: every sounding voice renders into
//! the private mixing scratch region, the mixer sums that block into the
//! shared accumulator, and the effect, if present, then runs once over
//! the fully mixed accumulator in place. One reverb covers every voice
//! without being instantiated per voice.

use resona_core::{ConfigError, DspApi, LinearMemory, MemoryLayout, MixerApi};

use crate::voice::{Voice, VoiceBindings, VoiceState};

/// Everything the host hands over to build a polyphonic bank: the shared
/// arena, the module and mixer bindings, the optional effect module, and
/// the configured voice count.
pub struct PolyInstance {
    /// Shared arena, sized by the host for the whole bank.
    pub memory: LinearMemory,
    /// The voice module's ABI binding.
    pub voice_api: Box<dyn DspApi>,
    /// The mixer binding (see [`crate::BufferMixer`] for the stock one).
    pub mixer_api: Box<dyn MixerApi>,
    /// Optional global effect module, applied after the mix.
    pub effect_api: Option<Box<dyn DspApi>>,
    /// Number of voices to lay out.
    pub voices: usize,
}

/// Fixed-size pool of voices over one shared module instance.
pub struct VoicePool {
    voices: Vec<Voice>,
    api: Box<dyn DspApi>,
    mixer: Box<dyn MixerApi>,
    effect: Option<Box<dyn DspApi>>,
    effect_dsp: u32,
    mem: LinearMemory,
    layout: MemoryLayout,
    clock: u64,
    num_inputs: u32,
    num_outputs: u32,
}

impl VoicePool {
    /// Lays out and initializes a bank of `instance.voices` voices of
    /// `voice_size` bytes each, plus `effect_size` bytes of effect state.
    ///
    /// Fails without side effects when the configuration is degenerate or
    /// the arena cannot hold the computed layout.
    pub fn new(
        instance: PolyInstance,
        voice_size: u32,
        effect_size: u32,
        bindings: &VoiceBindings,
        sample_rate: i32,
        buffer_size: u32,
    ) -> Result<Self, ConfigError> {
        let PolyInstance {
            memory: mut mem,
            voice_api: mut api,
            mixer_api: mixer,
            effect_api: mut effect,
            voices: voice_count,
        } = instance;

        if voice_count == 0 {
            return Err(ConfigError::NoVoices);
        }

        let num_inputs = api.num_inputs(&mut mem, 0);
        let num_outputs = api.num_outputs(&mut mem, 0);
        let layout = MemoryLayout::poly(
            voice_size,
            voice_count as u32,
            effect_size,
            num_inputs,
            num_outputs,
            buffer_size,
        );
        if !layout.fits(&mem) {
            return Err(ConfigError::ArenaTooSmall {
                needed: layout.total_size,
                available: mem.len(),
            });
        }
        layout.install(&mut mem);

        let voices = (0..voice_count)
            .map(|index| {
                Voice::new(
                    api.as_mut(),
                    &mut mem,
                    voice_size * index as u32,
                    bindings.clone(),
                    sample_rate,
                )
            })
            .collect();

        let effect_dsp = voice_size * voice_count as u32;
        if let Some(effect) = effect.as_mut() {
            effect.init(&mut mem, effect_dsp, sample_rate);
        }

        Ok(Self {
            voices,
            api,
            mixer,
            effect,
            effect_dsp,
            mem,
            layout,
            clock: 0,
            num_inputs,
            num_outputs,
        })
    }

    /// Number of configured voices.
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Number of voices currently Active or Releasing.
    pub fn sounding_voice_count(&self) -> usize {
        self.voices.iter().filter(|voice| !voice.is_free()).count()
    }

    /// Read access to the voice slots.
    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    /// The module's input channel count.
    pub fn num_inputs(&self) -> u32 {
        self.num_inputs
    }

    /// The module's output channel count.
    pub fn num_outputs(&self) -> u32 {
        self.num_outputs
    }

    /// Whether a global effect instance is present.
    pub fn has_effect(&self) -> bool {
        self.effect.is_some()
    }

    /// The bank's computed layout.
    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    /// The voice bound to `pitch`, oldest allocation first.
    pub fn playing_voice(&self, pitch: u8) -> Option<usize> {
        self.voices
            .iter()
            .enumerate()
            .filter(|(_, voice)| !voice.is_free() && voice.note() == Some(pitch))
            .min_by_key(|(_, voice)| voice.stamp())
            .map(|(index, _)| index)
    }

    /// Picks a slot for a new note: the first Free voice in array order,
    /// else the oldest Releasing voice, else the oldest Active voice.
    /// Decaying voices are preferred over sounding ones to minimize
    /// audible artifacts; within a tier the longest-idle voice loses.
    fn free_voice(&self) -> Option<usize> {
        if let Some(index) = self.voices.iter().position(Voice::is_free) {
            return Some(index);
        }
        if let Some(index) = self.oldest_in(VoiceState::Releasing) {
            tracing::debug!(voice = index, note = ?self.voices[index].note(), "stealing releasing voice");
            return Some(index);
        }
        let index = self.oldest_in(VoiceState::Active)?;
        tracing::debug!(voice = index, note = ?self.voices[index].note(), "stealing active voice");
        Some(index)
    }

    fn oldest_in(&self, state: VoiceState) -> Option<usize> {
        self.voices
            .iter()
            .enumerate()
            .filter(|(_, voice)| voice.state() == state)
            .min_by_key(|(_, voice)| voice.stamp())
            .map(|(index, _)| index)
    }

    /// Binds a note to a voice. A pitch that is already bound rebinds the
    /// same voice, so a pitch never sounds on two slots at once; with the
    /// pool exhausted and nothing to steal the note is dropped.
    pub fn key_on(&mut self, pitch: u8, velocity: u8) {
        let slot = self.playing_voice(pitch).or_else(|| self.free_voice());
        let Some(index) = slot else {
            tracing::warn!(pitch, "note-on dropped: no voice available");
            return;
        };
        self.clock += 1;
        let stamp = self.clock;
        self.voices[index].key_on(self.api.as_mut(), &mut self.mem, pitch, velocity, stamp);
    }

    /// Releases the voice bound to `pitch` into its decay tail.
    pub fn key_off(&mut self, pitch: u8) {
        match self.playing_voice(pitch) {
            Some(index) => self.voices[index].key_off(self.api.as_mut(), &mut self.mem, false),
            None => tracing::warn!(pitch, "note-off: no playing voice bound to pitch"),
        }
    }

    /// Releases every sounding voice; `hard` frees the slots immediately
    /// (all-sound-off), otherwise tails decay normally.
    pub fn all_notes_off(&mut self, hard: bool) {
        for voice in &mut self.voices {
            if voice.is_free() {
                continue;
            }
            voice.key_off(self.api.as_mut(), &mut self.mem, hard);
        }
    }

    /// Runs one block: clear the accumulator, render every sounding voice
    /// through the mixing scratch into it, then run the global effect in
    /// place over the mix.
    pub fn compute(&mut self, count: u32) {
        let Some(mixing) = self.layout.audio_mixing else {
            return;
        };
        self.mixer.clear_output(
            &mut self.mem,
            count,
            self.num_outputs,
            self.layout.audio_outputs,
        );
        for voice in &mut self.voices {
            if voice.is_free() {
                continue;
            }
            voice.compute(
                self.api.as_mut(),
                &mut self.mem,
                count,
                self.layout.audio_inputs,
                mixing,
            );
            let level = self.mixer.mix_voice(
                &mut self.mem,
                count,
                self.num_outputs,
                mixing,
                self.layout.audio_outputs,
            );
            voice.settle(level);
        }
        if let Some(effect) = self.effect.as_mut() {
            effect.compute(
                &mut self.mem,
                self.effect_dsp,
                count,
                self.layout.audio_outputs,
                self.layout.audio_outputs,
            );
        }
    }

    /// Writes a parameter on every voice instance.
    pub fn set_voice_param(&mut self, index: u32, value: f32) {
        for voice in &self.voices {
            voice.set_param_value(self.api.as_mut(), &mut self.mem, index, value);
        }
    }

    /// Reads a parameter from the first voice instance.
    pub fn voice_param(&mut self, index: u32) -> f32 {
        match self.voices.first() {
            Some(voice) => voice.param_value(self.api.as_mut(), &mut self.mem, index),
            None => 0.0,
        }
    }

    /// Writes a parameter on the global effect instance, if present.
    pub fn set_effect_param(&mut self, index: u32, value: f32) {
        if let Some(effect) = self.effect.as_mut() {
            effect.set_param_value(&mut self.mem, self.effect_dsp, index, value);
        }
    }

    /// Reads a parameter from the global effect instance, or 0 without one.
    pub fn effect_param(&mut self, index: u32) -> f32 {
        match self.effect.as_mut() {
            Some(effect) => effect.param_value(&mut self.mem, self.effect_dsp, index),
            None => 0.0,
        }
    }

    /// Copies one host input channel into the arena's input region.
    pub fn write_input(&mut self, chan: usize, samples: &[f32]) {
        self.mem
            .write_samples(self.layout.input_channels[chan], samples);
    }

    /// Copies one arena output channel into a host buffer.
    pub fn read_output(&self, chan: usize, dst: &mut [f32]) {
        self.mem
            .read_samples(self.layout.output_channels[chan], dst);
    }

    /// Read access to the shared arena.
    pub fn memory(&self) -> &LinearMemory {
        &self.mem
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resona_core::{ControlMap, DspMetadata};

    /// Module double with no audio behavior; parameters live in the
    /// arena at `dsp + 4 * index`.
    struct SilentApi;

    impl DspApi for SilentApi {
        fn init(&mut self, _mem: &mut LinearMemory, _dsp: u32, _sample_rate: i32) {}
        fn instance_clear(&mut self, _mem: &mut LinearMemory, _dsp: u32) {}
        fn compute(
            &mut self,
            _mem: &mut LinearMemory,
            _dsp: u32,
            _count: u32,
            _inputs: u32,
            _outputs: u32,
        ) {
        }
        fn param_value(&mut self, mem: &mut LinearMemory, dsp: u32, index: u32) -> f32 {
            mem.read_f32(dsp + 4 * index)
        }
        fn set_param_value(&mut self, mem: &mut LinearMemory, dsp: u32, index: u32, value: f32) {
            mem.write_f32(dsp + 4 * index, value);
        }
        fn num_inputs(&mut self, _mem: &mut LinearMemory, _dsp: u32) -> u32 {
            0
        }
        fn num_outputs(&mut self, _mem: &mut LinearMemory, _dsp: u32) -> u32 {
            1
        }
    }

    const VOICE_SIZE: u32 = 16;

    fn bindings() -> VoiceBindings {
        let meta = DspMetadata::parse(
            r#"{
            "size": 16,
            "ui": [
                { "type": "hslider", "address": "/v/freq", "index": 0, "min": 20, "max": 2000 },
                { "type": "button", "address": "/v/gate", "index": 1 },
                { "type": "hslider", "address": "/v/gain", "index": 2, "min": 0, "max": 1 }
            ]
        }"#,
        )
        .expect("well-formed metadata");
        let mut controls = ControlMap::new();
        controls.absorb(&meta.ui);
        VoiceBindings::from_controls(&controls)
    }

    fn pool(voices: usize) -> VoicePool {
        let layout = MemoryLayout::poly(VOICE_SIZE, voices as u32, 0, 0, 1, 64);
        let instance = PolyInstance {
            memory: LinearMemory::new(layout.total_size as usize),
            voice_api: Box::new(SilentApi),
            mixer_api: Box::new(crate::BufferMixer),
            effect_api: None,
            voices,
        };
        VoicePool::new(instance, VOICE_SIZE, 0, &bindings(), 48000, 64).expect("valid pool")
    }

    #[test]
    fn zero_voices_is_a_config_error() {
        let instance = PolyInstance {
            memory: LinearMemory::new(4096),
            voice_api: Box::new(SilentApi),
            mixer_api: Box::new(crate::BufferMixer),
            effect_api: None,
            voices: 0,
        };
        assert!(matches!(
            VoicePool::new(instance, VOICE_SIZE, 0, &bindings(), 48000, 64),
            Err(ConfigError::NoVoices)
        ));
    }

    #[test]
    fn undersized_arena_is_a_config_error() {
        let instance = PolyInstance {
            memory: LinearMemory::new(32),
            voice_api: Box::new(SilentApi),
            mixer_api: Box::new(crate::BufferMixer),
            effect_api: None,
            voices: 4,
        };
        assert!(matches!(
            VoicePool::new(instance, VOICE_SIZE, 0, &bindings(), 48000, 64),
            Err(ConfigError::ArenaTooSmall { .. })
        ));
    }

    #[test]
    fn notes_fill_free_slots_in_array_order() {
        let mut pool = pool(4);
        pool.key_on(60, 100);
        pool.key_on(64, 100);

        assert_eq!(pool.voices()[0].note(), Some(60));
        assert_eq!(pool.voices()[1].note(), Some(64));
        assert_eq!(pool.sounding_voice_count(), 2);
    }

    #[test]
    fn retrigger_rebinds_the_same_voice() {
        let mut pool = pool(4);
        pool.key_on(60, 100);
        pool.key_on(60, 80);

        let bound: Vec<usize> = (0..4)
            .filter(|&i| pool.voices()[i].note() == Some(60))
            .collect();
        assert_eq!(bound, vec![0], "one voice bound to the pitch");
        assert_eq!(pool.sounding_voice_count(), 1);
    }

    #[test]
    fn releasing_voices_are_stolen_before_active_ones() {
        let mut pool = pool(4);
        for (i, pitch) in [60, 62, 64, 65].into_iter().enumerate() {
            pool.key_on(pitch, 100);
            assert_eq!(pool.voices()[i].note(), Some(pitch));
        }
        // Release two; stamps make 62 the older releasing voice.
        pool.key_off(62);
        pool.key_off(64);

        pool.key_on(67, 100);
        assert_eq!(pool.playing_voice(62), None, "oldest releasing was stolen");
        assert_eq!(pool.voices()[1].note(), Some(67));
        assert_eq!(
            pool.voices()[2].state(),
            VoiceState::Releasing,
            "younger releasing voice untouched"
        );
    }

    #[test]
    fn oldest_active_voice_is_the_stealing_fallback() {
        let mut pool = pool(2);
        pool.key_on(60, 100);
        pool.key_on(64, 100);

        pool.key_on(67, 100);
        assert_eq!(pool.playing_voice(60), None, "oldest active was stolen");
        assert_eq!(pool.voices()[0].note(), Some(67));
        assert_eq!(pool.voices()[1].note(), Some(64));
    }

    #[test]
    fn note_off_releases_only_the_bound_voice() {
        let mut pool = pool(4);
        pool.key_on(60, 100);
        pool.key_on(64, 100);
        pool.key_off(60);

        assert_eq!(pool.voices()[0].state(), VoiceState::Releasing);
        assert_eq!(pool.voices()[1].state(), VoiceState::Active);
        // Unbound pitch: logged, not fatal.
        pool.key_off(99);
    }

    #[test]
    fn hard_all_notes_off_frees_everything() {
        let mut pool = pool(4);
        pool.key_on(60, 100);
        pool.key_on(64, 100);
        pool.key_on(67, 100);

        pool.all_notes_off(true);
        assert_eq!(pool.sounding_voice_count(), 0);
    }

    #[test]
    fn soft_all_notes_off_leaves_tails_decaying() {
        let mut pool = pool(4);
        pool.key_on(60, 100);
        pool.key_on(64, 100);

        pool.all_notes_off(false);
        assert_eq!(pool.sounding_voice_count(), 2);
        assert!(
            pool.voices()
                .iter()
                .take(2)
                .all(|voice| voice.state() == VoiceState::Releasing)
        );
    }

    #[test]
    fn voice_param_fan_out_reaches_every_instance() {
        let mut pool = pool(3);
        pool.set_voice_param(0, 880.0);

        assert_eq!(pool.voice_param(0), 880.0);
        // The double stores parameters at dsp + 4 * index, so every
        // voice's slot 0 must carry the written value.
        for voice in 0..3u32 {
            assert_eq!(pool.memory().read_f32(VOICE_SIZE * voice), 880.0);
        }
    }
}
