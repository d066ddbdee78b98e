/*!
The decoders: byte-level state machines that turn MIDI byte streams into
[`crate::Event`] values.

[`StreamDecoder`] speaks the live wire protocol: running status, Real-Time
interruption, and open-ended System Exclusive messages terminated by EOX.
[`SmfDecoder`] wraps it for Standard MIDI File track data, where `0xFF`
introduces a length-prefixed meta event and System Exclusive messages are
length-prefixed rather than terminator-delimited.
!*/

mod smf;
mod stream;

pub use smf::SmfDecoder;
pub use stream::StreamDecoder;
