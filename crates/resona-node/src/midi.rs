//! Raw MIDI message decoding.
//!
//! Nodes ingest raw channel-voice bytes from whatever transport the host
//! uses and route only what the runtime understands: notes, controllers,
//! and the pitch wheel. Everything else decodes to `None` and is dropped
//! by the caller.

/// A decoded channel-voice message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    /// Note on with a non-zero velocity.
    NoteOn {
        /// Channel 0-15.
        channel: u8,
        /// MIDI note number.
        pitch: u8,
        /// Velocity 1-127.
        velocity: u8,
    },
    /// Note off, or note on with velocity 0.
    NoteOff {
        /// Channel 0-15.
        channel: u8,
        /// MIDI note number.
        pitch: u8,
    },
    /// Control change.
    CtrlChange {
        /// Channel 0-15.
        channel: u8,
        /// Controller number 0-127.
        ctrl: u8,
        /// Controller value 0-127.
        value: u8,
    },
    /// Pitch wheel, reassembled to its 14-bit value.
    PitchWheel {
        /// Channel 0-15.
        channel: u8,
        /// Wheel position 0-16383, center 8192.
        value: u16,
    },
}

impl MidiEvent {
    /// Decodes a raw channel-voice message.
    ///
    /// A note-on with velocity 0 decodes as a note-off, per convention.
    /// Returns `None` for truncated input and for message kinds the
    /// runtime does not route (aftertouch, program change, system
    /// messages).
    ///
    /// # Example
    ///
    /// ```rust
    /// use resona_node::MidiEvent;
    ///
    /// assert_eq!(
    ///     MidiEvent::parse(&[0x90, 60, 100]),
    ///     Some(MidiEvent::NoteOn { channel: 0, pitch: 60, velocity: 100 })
    /// );
    /// assert_eq!(
    ///     MidiEvent::parse(&[0x9c, 60, 0]),
    ///     Some(MidiEvent::NoteOff { channel: 12, pitch: 60 })
    /// );
    /// ```
    pub fn parse(data: &[u8]) -> Option<Self> {
        let (&status, rest) = data.split_first()?;
        let channel = status & 0x0f;
        match status >> 4 {
            0x8 => match *rest {
                [pitch, _, ..] => Some(Self::NoteOff { channel, pitch }),
                _ => None,
            },
            0x9 => match *rest {
                [pitch, 0, ..] => Some(Self::NoteOff { channel, pitch }),
                [pitch, velocity, ..] => Some(Self::NoteOn {
                    channel,
                    pitch,
                    velocity,
                }),
                _ => None,
            },
            0xb => match *rest {
                [ctrl, value, ..] => Some(Self::CtrlChange {
                    channel,
                    ctrl,
                    value,
                }),
                _ => None,
            },
            0xe => match *rest {
                [lsb, msb, ..] => Some(Self::PitchWheel {
                    channel,
                    value: u16::from(msb) << 7 | u16::from(lsb),
                }),
                _ => None,
            },
            _ => None,
        }
    }
}
