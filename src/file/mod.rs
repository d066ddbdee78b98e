/*!
The `file` module is for types and concepts strictly related to MIDI *files*.
These are kept separate from types and concepts that are also used in
realtime MIDI (`core`).
!*/

mod builtin;
mod header;
mod meta;

pub use builtin::{Builtin, BuiltinKind};
pub use header::{Division, Format};
pub use meta::{
    KeySignatureValue, MetaEvent, MicrosecondsPerBeat, SmpteOffsetValue, Text, TimeSignatureValue,
    META_CHANNEL_PREFIX, META_COPYRIGHT, META_CUE_POINT, META_DEVICE_NAME, META_END_OF_TRACK,
    META_INSTRUMENT_NAME, META_KEY_SIGNATURE, META_LYRIC, META_MARKER, META_PORT,
    META_PROGRAM_NAME, META_SEQUENCER_SPECIFIC, META_SEQUENCE_NUMBER, META_SET_TEMPO,
    META_SMPTE_OFFSET, META_TEXT, META_TIME_SIGNATURE, META_TRACK_NAME,
};
