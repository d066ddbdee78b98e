/*!
The event registry: the lookup tables that drive the decoders. One table
maps each of the 256 possible status bytes to a constructor plus its
expected data length; a second maps the 128 meta type bytes to a meta
constructor. Both tables come pre-populated with the standard MIDI
vocabulary and accept new registrations, so callers can teach the decoders
about vendor-specific messages without touching this crate.
!*/

use crate::core::status;
use crate::core::{
    Channel, ControlNumber, ControlValue, Message, NoteNumber, PitchBendValue, PressureValue,
    Program, Song, SongPosition, Velocity, U7,
};
use crate::file::{
    KeySignatureValue, MetaEvent, MicrosecondsPerBeat, SmpteOffsetValue, TimeSignatureValue,
    META_CHANNEL_PREFIX, META_DEVICE_NAME, META_END_OF_TRACK, META_KEY_SIGNATURE, META_PORT,
    META_SEQUENCER_SPECIFIC, META_SEQUENCE_NUMBER, META_SET_TEMPO, META_SMPTE_OFFSET, META_TEXT,
    META_TIME_SIGNATURE,
};
use snafu::ensure;
use std::fmt::{Debug, Formatter};

/// Builds a wire message from its original status byte and its data bytes.
/// The decoder guarantees that `data` has the length declared in the
/// [`WireSpec`] (for open-ended messages, whatever arrived before the
/// terminator).
pub type MessageBuilder = fn(status: u8, data: &[u8]) -> Message;

/// Builds a meta event from its type byte and body. Fallible, because a
/// declared body length that disagrees with the type's fixed layout is a
/// file corruption.
pub type MetaBuilder = fn(meta_type: u8, data: &[u8]) -> crate::Result<MetaEvent>;

/// How to decode one status byte.
#[derive(Clone, Copy)]
pub struct WireSpec {
    /// The expected number of data bytes, or -1 for an open-ended message.
    pub length: i8,
    /// For open-ended messages, the status byte that terminates the body.
    pub end: Option<u8>,
    pub build: MessageBuilder,
}

/// How to decode one meta type byte.
#[derive(Clone, Copy)]
pub struct MetaSpec {
    pub build: MetaBuilder,
}

/// The decoder lookup tables. `Default` yields the standard MIDI event
/// vocabulary.
pub struct EventRegistry {
    wire: [Option<WireSpec>; 256],
    meta: [Option<MetaSpec>; 128],
}

impl Debug for EventRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let wire = self.wire.iter().filter(|e| e.is_some()).count();
        let meta = self.meta.iter().filter(|e| e.is_some()).count();
        write!(
            f,
            "EventRegistry {{ wire entries: {}, meta entries: {} }}",
            wire, meta
        )
    }
}

impl Default for EventRegistry {
    fn default() -> Self {
        let mut registry = Self {
            wire: [None; 256],
            meta: [None; 128],
        };
        registry.load_default();
        registry
    }
}

impl EventRegistry {
    /// An empty registry with no events at all. Most callers want
    /// `EventRegistry::default()` instead.
    pub fn empty() -> Self {
        Self {
            wire: [None; 256],
            meta: [None; 128],
        }
    }

    /// Registers `spec` for a single status byte, replacing any previous
    /// registration.
    pub fn register(&mut self, status_byte: u8, spec: WireSpec) {
        self.wire[status_byte as usize] = Some(spec);
    }

    /// Registers `spec` for a channel-message status, filling all sixteen
    /// channel variants of the given canonical status.
    pub fn register_channel(&mut self, statusmsg: u8, spec: WireSpec) {
        debug_assert!(status::is_channel_status(statusmsg));
        for channel in 0..16u8 {
            self.register(statusmsg & status::STATUS_MASK | channel, spec);
        }
    }

    /// Registers `spec` for one meta type byte (0..=127).
    pub fn register_meta(&mut self, meta_type: u8, spec: MetaSpec) {
        self.meta[(meta_type & 0x7f) as usize] = Some(spec);
    }

    pub fn wire(&self, status_byte: u8) -> Option<&WireSpec> {
        self.wire[status_byte as usize].as_ref()
    }

    pub fn meta(&self, meta_type: u8) -> Option<&MetaSpec> {
        if meta_type > 0x7f {
            return None;
        }
        self.meta[meta_type as usize].as_ref()
    }

    /// Loads the standard MIDI event vocabulary into the tables.
    pub fn load_default(&mut self) {
        // channel voice messages
        self.register_channel(status::NOTE_OFF, WireSpec { length: 2, end: None, build: build_note_off });
        self.register_channel(status::NOTE_ON, WireSpec { length: 2, end: None, build: build_note_on });
        self.register_channel(status::POLY_AFTERTOUCH, WireSpec { length: 2, end: None, build: build_poly_aftertouch });
        self.register_channel(status::CONTROL_CHANGE, WireSpec { length: 2, end: None, build: build_control_change });
        self.register_channel(status::PROGRAM_CHANGE, WireSpec { length: 1, end: None, build: build_program_change });
        self.register_channel(status::CHANNEL_AFTERTOUCH, WireSpec { length: 1, end: None, build: build_channel_aftertouch });
        self.register_channel(status::PITCH_BEND, WireSpec { length: 2, end: None, build: build_pitch_bend });

        // system common
        self.register(status::SYSEX_START, WireSpec { length: -1, end: Some(status::END_OF_SYSEX), build: build_sysex });
        self.register(status::MTC_QUARTER_FRAME, WireSpec { length: 1, end: None, build: build_mtc_quarter_frame });
        self.register(status::SONG_POSITION_POINTER, WireSpec { length: 2, end: None, build: build_song_position });
        self.register(status::SONG_SELECT, WireSpec { length: 1, end: None, build: build_song_select });
        self.register(status::TUNE_REQUEST, WireSpec { length: 0, end: None, build: |_, _| Message::TuneRequest });
        self.register(status::END_OF_SYSEX, WireSpec { length: 0, end: None, build: |_, _| Message::EndOfSysex });

        // system real-time; 0xF9 and 0xFD are unassigned
        self.register(status::TIMING_CLOCK, WireSpec { length: 0, end: None, build: |_, _| Message::TimingClock });
        self.register(status::START_SEQUENCE, WireSpec { length: 0, end: None, build: |_, _| Message::StartSequence });
        self.register(status::CONTINUE_SEQUENCE, WireSpec { length: 0, end: None, build: |_, _| Message::ContinueSequence });
        self.register(status::STOP_SEQUENCE, WireSpec { length: 0, end: None, build: |_, _| Message::StopSequence });
        self.register(status::ACTIVE_SENSING, WireSpec { length: 0, end: None, build: |_, _| Message::ActiveSensing });
        self.register(status::SYSTEM_RESET, WireSpec { length: 0, end: None, build: |_, _| Message::SystemReset });

        // meta events
        self.register_meta(META_SEQUENCE_NUMBER, MetaSpec { build: build_sequence_number });
        for text_type in META_TEXT..=META_DEVICE_NAME {
            self.register_meta(text_type, MetaSpec { build: MetaEvent::text_from_body });
        }
        self.register_meta(META_CHANNEL_PREFIX, MetaSpec { build: build_channel_prefix });
        self.register_meta(META_PORT, MetaSpec { build: build_port });
        self.register_meta(META_END_OF_TRACK, MetaSpec { build: build_end_of_track });
        self.register_meta(META_SET_TEMPO, MetaSpec { build: build_set_tempo });
        self.register_meta(META_SMPTE_OFFSET, MetaSpec { build: build_smpte_offset });
        self.register_meta(META_TIME_SIGNATURE, MetaSpec { build: build_time_signature });
        self.register_meta(META_KEY_SIGNATURE, MetaSpec { build: build_key_signature });
        self.register_meta(META_SEQUENCER_SPECIFIC, MetaSpec { build: build_sequencer_specific });
    }
}

fn channel_of(status_byte: u8) -> Channel {
    Channel::new(status_byte & status::CHANNEL_MASK)
}

fn byte(data: &[u8], index: usize) -> u8 {
    data.get(index).copied().unwrap_or(0)
}

fn build_note_off(status_byte: u8, data: &[u8]) -> Message {
    Message::NoteOff {
        channel: channel_of(status_byte),
        note: NoteNumber::new(byte(data, 0)),
        velocity: Velocity::new(byte(data, 1)),
    }
}

fn build_note_on(status_byte: u8, data: &[u8]) -> Message {
    Message::NoteOn {
        channel: channel_of(status_byte),
        note: NoteNumber::new(byte(data, 0)),
        velocity: Velocity::new(byte(data, 1)),
    }
}

fn build_poly_aftertouch(status_byte: u8, data: &[u8]) -> Message {
    Message::PolyAftertouch {
        channel: channel_of(status_byte),
        note: NoteNumber::new(byte(data, 0)),
        pressure: PressureValue::new(byte(data, 1)),
    }
}

fn build_control_change(status_byte: u8, data: &[u8]) -> Message {
    Message::ControlChange {
        channel: channel_of(status_byte),
        control: ControlNumber::new(byte(data, 0)),
        value: ControlValue::new(byte(data, 1)),
    }
}

fn build_program_change(status_byte: u8, data: &[u8]) -> Message {
    Message::ProgramChange {
        channel: channel_of(status_byte),
        program: Program::new(byte(data, 0)),
    }
}

fn build_channel_aftertouch(status_byte: u8, data: &[u8]) -> Message {
    Message::ChannelAftertouch {
        channel: channel_of(status_byte),
        pressure: PressureValue::new(byte(data, 0)),
    }
}

fn build_pitch_bend(status_byte: u8, data: &[u8]) -> Message {
    Message::PitchBend {
        channel: channel_of(status_byte),
        bend: PitchBendValue::from_bytes(byte(data, 0), byte(data, 1)),
    }
}

fn build_sysex(_status_byte: u8, data: &[u8]) -> Message {
    Message::Sysex {
        data: data.to_vec(),
    }
}

fn build_mtc_quarter_frame(_status_byte: u8, data: &[u8]) -> Message {
    Message::MtcQuarterFrame {
        value: U7::new(byte(data, 0)),
    }
}

fn build_song_position(_status_byte: u8, data: &[u8]) -> Message {
    Message::SongPositionPointer {
        position: SongPosition::from_bytes(byte(data, 0), byte(data, 1)),
    }
}

fn build_song_select(_status_byte: u8, data: &[u8]) -> Message {
    Message::SongSelect {
        song: Song::new(byte(data, 0)),
    }
}

fn expect_body_len(meta_type: u8, data: &[u8], expected: usize) -> crate::Result<()> {
    ensure!(
        data.len() == expected,
        crate::error::LengthMismatchSnafu {
            site: site!(),
            description: format!(
                "meta type {:#04X} requires {} body byte(s), got {}",
                meta_type,
                expected,
                data.len()
            ),
        }
    );
    Ok(())
}

fn build_sequence_number(meta_type: u8, data: &[u8]) -> crate::Result<MetaEvent> {
    expect_body_len(meta_type, data, 2)?;
    Ok(MetaEvent::SequenceNumber(u16::from_be_bytes([
        data[0], data[1],
    ])))
}

fn build_channel_prefix(meta_type: u8, data: &[u8]) -> crate::Result<MetaEvent> {
    expect_body_len(meta_type, data, 1)?;
    Ok(MetaEvent::ChannelPrefix(Channel::new(data[0])))
}

fn build_port(meta_type: u8, data: &[u8]) -> crate::Result<MetaEvent> {
    expect_body_len(meta_type, data, 1)?;
    Ok(MetaEvent::Port(data[0].into()))
}

fn build_end_of_track(meta_type: u8, data: &[u8]) -> crate::Result<MetaEvent> {
    expect_body_len(meta_type, data, 0)?;
    Ok(MetaEvent::EndOfTrack)
}

fn build_set_tempo(meta_type: u8, data: &[u8]) -> crate::Result<MetaEvent> {
    expect_body_len(meta_type, data, 3)?;
    let beu32 = [0u8, data[0], data[1], data[2]];
    Ok(MetaEvent::SetTempo(MicrosecondsPerBeat::new(
        u32::from_be_bytes(beu32),
    )))
}

fn build_smpte_offset(meta_type: u8, data: &[u8]) -> crate::Result<MetaEvent> {
    expect_body_len(meta_type, data, 5)?;
    Ok(MetaEvent::SmpteOffset(SmpteOffsetValue {
        hr: data[0],
        mn: data[1],
        se: data[2],
        fr: data[3],
        ff: data[4],
    }))
}

fn build_time_signature(meta_type: u8, data: &[u8]) -> crate::Result<MetaEvent> {
    expect_body_len(meta_type, data, 4)?;
    Ok(MetaEvent::TimeSignature(TimeSignatureValue {
        numerator: data[0],
        denominator_exponent: data[1],
        clocks_per_click: data[2],
        notated_32nds: data[3],
    }))
}

fn build_key_signature(meta_type: u8, data: &[u8]) -> crate::Result<MetaEvent> {
    expect_body_len(meta_type, data, 2)?;
    Ok(MetaEvent::KeySignature(KeySignatureValue {
        accidentals: data[0] as i8,
        minor: data[1] == 1,
    }))
}

fn build_sequencer_specific(_meta_type: u8, data: &[u8]) -> crate::Result<MetaEvent> {
    Ok(MetaEvent::SequencerSpecific(data.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_statuses_cover_all_channels() {
        let registry = EventRegistry::default();
        for channel in 0..16u8 {
            let spec = registry.wire(0x90 | channel).expect("note on registered");
            assert_eq!(2, spec.length);
            let message = (spec.build)(0x90 | channel, &[60, 64]);
            assert_eq!(Some(Channel::new(channel)), message.channel());
        }
    }

    #[test]
    fn unassigned_statuses_are_absent() {
        let registry = EventRegistry::default();
        assert!(registry.wire(0xF4).is_none());
        assert!(registry.wire(0xF5).is_none());
        assert!(registry.wire(0xF9).is_none());
        assert!(registry.wire(0xFD).is_none());
        assert!(registry.wire(0x42).is_none());
    }

    #[test]
    fn sysex_is_open_ended() {
        let registry = EventRegistry::default();
        let spec = registry.wire(0xF0).unwrap();
        assert_eq!(-1, spec.length);
        assert_eq!(Some(0xF7), spec.end);
    }

    #[test]
    fn meta_builders_validate_length() {
        let registry = EventRegistry::default();
        let tempo = registry.meta(META_SET_TEMPO).unwrap();
        let event = (tempo.build)(META_SET_TEMPO, &[0x07, 0xA1, 0x20]).unwrap();
        assert_eq!(
            MetaEvent::SetTempo(MicrosecondsPerBeat::new(500_000)),
            event
        );
        assert!((tempo.build)(META_SET_TEMPO, &[0x07]).is_err());
    }

    #[test]
    fn custom_registration_replaces_default() {
        let mut registry = EventRegistry::default();
        registry.register(
            0xF4,
            WireSpec {
                length: 1,
                end: None,
                build: |status, data| Message::Unknown {
                    status,
                    data: data.to_vec(),
                },
            },
        );
        assert!(registry.wire(0xF4).is_some());
    }
}
