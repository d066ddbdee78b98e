use crate::core::{Channel, PortValue};
use log::warn;
use std::borrow::Cow;
use std::fmt::{Display, Formatter};

/// `FF 00`: Sequence Number.
pub const META_SEQUENCE_NUMBER: u8 = 0x00;
/// `FF 01`: any amount of text describing anything.
pub const META_TEXT: u8 = 0x01;
/// `FF 02`: copyright notice.
pub const META_COPYRIGHT: u8 = 0x02;
/// `FF 03`: sequence or track name.
pub const META_TRACK_NAME: u8 = 0x03;
/// `FF 04`: instrumentation description.
pub const META_INSTRUMENT_NAME: u8 = 0x04;
/// `FF 05`: a lyric to be sung.
pub const META_LYRIC: u8 = 0x05;
/// `FF 06`: name of a point in the sequence.
pub const META_MARKER: u8 = 0x06;
/// `FF 07`: description of something happening at this point.
pub const META_CUE_POINT: u8 = 0x07;
/// `FF 08`: program name.
pub const META_PROGRAM_NAME: u8 = 0x08;
/// `FF 09`: device name.
pub const META_DEVICE_NAME: u8 = 0x09;
/// `FF 20`: MIDI channel prefix.
pub const META_CHANNEL_PREFIX: u8 = 0x20;
/// `FF 21`: MIDI port.
pub const META_PORT: u8 = 0x21;
/// `FF 2F`: End of Track. Not optional; closes every track chunk.
pub const META_END_OF_TRACK: u8 = 0x2F;
/// `FF 51`: Set Tempo, in microseconds per quarter note.
pub const META_SET_TEMPO: u8 = 0x51;
/// `FF 54`: SMPTE offset at which the track starts.
pub const META_SMPTE_OFFSET: u8 = 0x54;
/// `FF 58`: time signature.
pub const META_TIME_SIGNATURE: u8 = 0x58;
/// `FF 59`: key signature.
pub const META_KEY_SIGNATURE: u8 = 0x59;
/// `FF 7F`: sequencer-specific data.
pub const META_SEQUENCER_SPECIFIC: u8 = 0x7F;

/// The MIDI spec does not state what encoding should be used for strings.
/// We try to parse text as a UTF-8 `String` and hope for the best, but if we
/// get an error then we store the original bytes to keep parsing lossless.
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub enum Text {
    /// A UTF-8 encoded string.
    Utf8(String),
    /// Bytes in some encoding we do not understand.
    Raw(Vec<u8>),
}

impl Default for Text {
    fn default() -> Self {
        Text::Utf8(String::new())
    }
}

impl Text {
    pub fn new<S: Into<String>>(s: S) -> Self {
        Text::Utf8(s.into())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(s) => Text::Utf8(s),
            Err(e) => {
                warn!("non UTF-8 string encountered, keeping raw bytes");
                Text::Raw(e.into_bytes())
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Text::Utf8(s) => s.as_bytes(),
            Text::Raw(b) => b.as_slice(),
        }
    }

    /// Caution, this is lossy when the text is not UTF-8 encoded.
    pub fn as_str(&self) -> Cow<'_, str> {
        match self {
            Text::Utf8(s) => Cow::Borrowed(s.as_str()),
            Text::Raw(b) => String::from_utf8_lossy(b),
        }
    }
}

impl Display for Text {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.as_str(), f)
    }
}

impl From<&str> for Text {
    fn from(s: &str) -> Self {
        Text::Utf8(s.into())
    }
}

pub(crate) const MAX_24BIT_UINT_VALUE: u32 = 16_777_215;
pub(crate) const DEFAULT_MICROSECONDS_PER_BEAT: u32 = 500_000;

// Tempo microseconds are given by a 24-bit integer, hence the weird upper
// bound. The default tempo is 120 beats per minute, which is 500_000
// microseconds per beat.
clamp!(
    MicrosecondsPerBeat,
    u32,
    1,
    MAX_24BIT_UINT_VALUE,
    DEFAULT_MICROSECONDS_PER_BEAT,
    pub
);

/// `hr mn se fr ff`: the raw bytes of an SMPTE offset. Held uninterpreted.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct SmpteOffsetValue {
    pub hr: u8,
    pub mn: u8,
    pub se: u8,
    pub fr: u8,
    pub ff: u8,
}

/// `nn dd cc bb`: a time signature as stored in the file. `numerator` is the
/// upper part; `denominator_exponent` is a negative power of two (2 means a
/// quarter note, 3 an eighth note); `clocks_per_click` is the number of MIDI
/// clocks in a metronome click; `notated_32nds` is the number of notated
/// 32nd notes per MIDI quarter note, normally 8.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct TimeSignatureValue {
    pub numerator: u8,
    pub denominator_exponent: u8,
    pub clocks_per_click: u8,
    pub notated_32nds: u8,
}

impl Default for TimeSignatureValue {
    fn default() -> Self {
        // common time with a click on every quarter
        Self {
            numerator: 4,
            denominator_exponent: 2,
            clocks_per_click: 24,
            notated_32nds: 8,
        }
    }
}

impl TimeSignatureValue {
    /// The denominator as it would be notated, e.g. 8 for 6/8.
    pub fn denominator(&self) -> u8 {
        1u8 << self.denominator_exponent.min(7)
    }
}

/// `sf mi`: a key signature. `accidentals` runs from -7 (seven flats) to +7
/// (seven sharps); `minor` selects the minor mode.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct KeySignatureValue {
    pub accidentals: i8,
    pub minor: bool,
}

/// A meta event: SMF-only data introduced by `0xFF`, a type byte, a
/// variable-length body length, and the body. Types missing from the
/// registry are preserved as [`MetaEvent::Unknown`].
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum MetaEvent {
    /// `FF 00 02 ssss`: identifies the sequence or pattern.
    SequenceNumber(u16),

    /// `FF 01 len text`: any amount of text describing anything.
    Text(Text),

    /// `FF 02 len text`: a copyright notice.
    Copyright(Text),

    /// `FF 03 len text`: in a format 0 track, or the first track of a
    /// format 1 file, the name of the sequence; otherwise the track name.
    TrackName(Text),

    /// `FF 04 len text`: a description of the instrumentation.
    InstrumentName(Text),

    /// `FF 05 len text`: a lyric, generally one syllable per event.
    Lyric(Text),

    /// `FF 06 len text`: a rehearsal letter or section name.
    Marker(Text),

    /// `FF 07 len text`: a description of something happening on screen or
    /// stage at this point in the score.
    CuePoint(Text),

    /// `FF 08 len text`: a program name.
    ProgramName(Text),

    /// `FF 09 len text`: a device name.
    DeviceName(Text),

    /// `FF 20 01 cc`: associates a MIDI channel with the events that follow.
    ChannelPrefix(Channel),

    /// `FF 21 01 pp`: the port the following events are intended for.
    Port(PortValue),

    /// `FF 2F 00`: the mandatory end of every track chunk.
    EndOfTrack,

    /// `FF 51 03 tttttt`: tempo in microseconds per quarter note.
    SetTempo(MicrosecondsPerBeat),

    /// `FF 54 05 hr mn se fr ff`: the SMPTE time at which the track starts.
    SmpteOffset(SmpteOffsetValue),

    /// `FF 58 04 nn dd cc bb`: the time signature.
    TimeSignature(TimeSignatureValue),

    /// `FF 59 02 sf mi`: the key signature.
    KeySignature(KeySignatureValue),

    /// `FF 7F len data`: sequencer-specific data, starting with a
    /// manufacturer id.
    SequencerSpecific(Vec<u8>),

    /// A meta type missing from the registry. Kept for inspection instead of
    /// being silently trashed.
    Unknown { meta_type: u8, data: Vec<u8> },
}

impl Default for MetaEvent {
    fn default() -> Self {
        MetaEvent::EndOfTrack
    }
}

impl MetaEvent {
    /// The type byte, which is the dispatch key for meta events.
    pub fn meta_type(&self) -> u8 {
        match self {
            MetaEvent::SequenceNumber(_) => META_SEQUENCE_NUMBER,
            MetaEvent::Text(_) => META_TEXT,
            MetaEvent::Copyright(_) => META_COPYRIGHT,
            MetaEvent::TrackName(_) => META_TRACK_NAME,
            MetaEvent::InstrumentName(_) => META_INSTRUMENT_NAME,
            MetaEvent::Lyric(_) => META_LYRIC,
            MetaEvent::Marker(_) => META_MARKER,
            MetaEvent::CuePoint(_) => META_CUE_POINT,
            MetaEvent::ProgramName(_) => META_PROGRAM_NAME,
            MetaEvent::DeviceName(_) => META_DEVICE_NAME,
            MetaEvent::ChannelPrefix(_) => META_CHANNEL_PREFIX,
            MetaEvent::Port(_) => META_PORT,
            MetaEvent::EndOfTrack => META_END_OF_TRACK,
            MetaEvent::SetTempo(_) => META_SET_TEMPO,
            MetaEvent::SmpteOffset(_) => META_SMPTE_OFFSET,
            MetaEvent::TimeSignature(_) => META_TIME_SIGNATURE,
            MetaEvent::KeySignature(_) => META_KEY_SIGNATURE,
            MetaEvent::SequencerSpecific(_) => META_SEQUENCER_SPECIFIC,
            MetaEvent::Unknown { meta_type, .. } => *meta_type,
        }
    }

    /// The body bytes, exactly as they follow the varlen length on the wire.
    pub(crate) fn body(&self) -> Vec<u8> {
        match self {
            MetaEvent::SequenceNumber(n) => n.to_be_bytes().to_vec(),
            MetaEvent::Text(t)
            | MetaEvent::Copyright(t)
            | MetaEvent::TrackName(t)
            | MetaEvent::InstrumentName(t)
            | MetaEvent::Lyric(t)
            | MetaEvent::Marker(t)
            | MetaEvent::CuePoint(t)
            | MetaEvent::ProgramName(t)
            | MetaEvent::DeviceName(t) => t.as_bytes().to_vec(),
            MetaEvent::ChannelPrefix(channel) => vec![channel.get()],
            MetaEvent::Port(port) => vec![port.get()],
            MetaEvent::EndOfTrack => Vec::new(),
            MetaEvent::SetTempo(mpb) => {
                // a 24-bit big-endian number, skip the first of four bytes
                u32::to_be_bytes(mpb.get())[1..].to_vec()
            }
            MetaEvent::SmpteOffset(v) => vec![v.hr, v.mn, v.se, v.fr, v.ff],
            MetaEvent::TimeSignature(v) => vec![
                v.numerator,
                v.denominator_exponent,
                v.clocks_per_click,
                v.notated_32nds,
            ],
            MetaEvent::KeySignature(v) => vec![v.accidentals as u8, v.minor as u8],
            MetaEvent::SequencerSpecific(data) => data.clone(),
            MetaEvent::Unknown { data, .. } => data.clone(),
        }
    }

    /// Builds a text-kind meta event from its body.
    pub(crate) fn text_from_body(meta_type: u8, data: &[u8]) -> crate::Result<Self> {
        let text = Text::from_bytes(data.to_vec());
        match meta_type {
            META_TEXT => Ok(MetaEvent::Text(text)),
            META_COPYRIGHT => Ok(MetaEvent::Copyright(text)),
            META_TRACK_NAME => Ok(MetaEvent::TrackName(text)),
            META_INSTRUMENT_NAME => Ok(MetaEvent::InstrumentName(text)),
            META_LYRIC => Ok(MetaEvent::Lyric(text)),
            META_MARKER => Ok(MetaEvent::Marker(text)),
            META_CUE_POINT => Ok(MetaEvent::CuePoint(text)),
            META_PROGRAM_NAME => Ok(MetaEvent::ProgramName(text)),
            META_DEVICE_NAME => Ok(MetaEvent::DeviceName(text)),
            _ => length_mismatch!("meta type {:#04X} is not a text type", meta_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tempo_body_is_24_bit() {
        let tempo = MetaEvent::SetTempo(MicrosecondsPerBeat::new(500_000));
        assert_eq!(vec![0x07, 0xA1, 0x20], tempo.body());
        assert_eq!(META_SET_TEMPO, tempo.meta_type());
    }

    #[test]
    fn text_round_trip() {
        let event = MetaEvent::text_from_body(META_TRACK_NAME, b"Singer").unwrap();
        assert_eq!(MetaEvent::TrackName(Text::new("Singer")), event);
        assert_eq!(b"Singer".to_vec(), event.body());
    }

    #[test]
    fn non_utf8_text_is_kept_raw() {
        let text = Text::from_bytes(vec![0xff, 0xfe]);
        assert!(matches!(text, Text::Raw(_)));
        assert_eq!(&[0xff, 0xfe], text.as_bytes());
    }

    #[test]
    fn time_signature_denominator() {
        let six_eight = TimeSignatureValue {
            numerator: 6,
            denominator_exponent: 3,
            clocks_per_click: 36,
            notated_32nds: 8,
        };
        assert_eq!(8, six_eight.denominator());
    }

    #[test]
    fn end_of_track_has_empty_body() {
        assert!(MetaEvent::EndOfTrack.body().is_empty());
    }
}
