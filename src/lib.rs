/*!
`midi_stream` decodes, encodes, organizes, and plays back MIDI data.

The crate is built around four layers:

- **Codecs**: [`decoder::StreamDecoder`] turns live wire bytes into typed
  [`Event`]s, handling running status and Real-Time interruption;
  [`decoder::SmfDecoder`] adds the Standard-MIDI-File grammar (meta events,
  length-prefixed SysEx). [`encoder`] goes the other way.
- **Containers**: [`Track`] and [`Pattern`] hold events in tick order and
  annotate them with absolute time as they are ingested, via per-key
  dispatch handler chains ([`handlers`]).
- **Playback**: `Track::time_get` and `Pattern::time_get` release events at
  their wall-clock deadlines, honoring tempo and division changes, with a
  configurable lookahead window ([`timing::PlaybackSettings`]).
- **IO**: [`reader::SmfReader`] streams a file through the decoders into a
  lazy event queue; [`reader::load_pattern`] and [`encoder::save_pattern`]
  are the whole-file conveniences.

```no_run
use midi_stream::reader::load_pattern;

let pattern = load_pattern("song.mid").unwrap();
for track in pattern.tracks() {
    println!("{}: {} events", track.name, track.len());
}
```
!*/

#[macro_use]
mod error;
#[macro_use]
mod clamp;
#[macro_use]
mod macros;

pub mod core;
pub mod decoder;
pub mod encoder;
pub mod file;
pub mod handlers;
pub mod reader;
pub mod registry;
pub mod source;
pub mod timing;
pub mod vlq;

mod event;
mod pattern;
mod track;

pub use error::{Error, Result};
pub use event::{Event, EventKind, HandlerKey};
pub use pattern::Pattern;
pub use track::{Track, DEFAULT_DIVISIONS};
