/*!
The `core` module is for types and concepts that are *not* strictly related
to MIDI *files*. These types and concepts are used for realtime MIDI as well.
!*/

mod message;
mod numbers;
pub(crate) mod status;

pub use message::Message;
pub use numbers::{
    Channel, ControlNumber, ControlValue, NoteNumber, PitchBendValue, PortValue, PressureValue,
    Program, Song, SongPosition, Velocity, U7,
};
