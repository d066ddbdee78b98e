/*!
The encoders: events back to bytes. [`Scribe`] wraps any `Write` and owns
the running-status state; the free functions serialize single events (live
wire form), track events (delta-prefixed SMF form), whole tracks, and whole
patterns.
!*/

use crate::core::status;
use crate::core::Message;
use crate::error::LibResult;
use crate::event::{Event, EventKind};
use crate::file::MetaEvent;
use crate::pattern::Pattern;
use crate::track::Track;
use crate::vlq::write_varlen;
use log::trace;
use snafu::ResultExt;
use std::io::Write;
use std::path::Path;

/// Encoder behavior knobs.
#[derive(Copy, Clone, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct ScribeSettings {
    /// When enabled, a channel-message status byte equal to the previously
    /// written one is elided.
    pub running_status: bool,
}

/// A wrapper for any `Write` which provides a setting for running status
/// and stores the most recent status byte.
pub struct Scribe<W: Write> {
    w: W,
    settings: ScribeSettings,
    running_status_byte: Option<u8>,
}

impl<W: Write> Write for Scribe<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.w.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.w.flush()
    }
}

impl<W: Write> Scribe<W> {
    pub fn new(w: W, settings: ScribeSettings) -> Self {
        Self {
            w,
            settings,
            running_status_byte: None,
        }
    }

    pub(crate) fn use_running_status(&self) -> bool {
        self.settings.running_status
    }

    /// Writes a channel-message status byte, eliding it when running status
    /// is enabled and the byte equals the previously written status.
    pub(crate) fn write_status_byte(&mut self, status_byte: u8) -> LibResult<()> {
        if self.settings.running_status && self.running_status_byte == Some(status_byte) {
            return Ok(());
        }
        write_u8!(self.w, status_byte)?;
        if self.settings.running_status {
            self.running_status_byte = Some(status_byte);
        }
        Ok(())
    }

    /// Forgets the stored status so the next channel message writes its
    /// status byte explicitly.
    pub(crate) fn cancel_running_status(&mut self) {
        self.running_status_byte = None;
    }
}

/// Writes a wire message. `smf` selects the file framing for System
/// Exclusive bodies (explicit varlen length) over the live framing
/// (terminated by EOX alone).
pub(crate) fn write_message<W: Write>(
    message: &Message,
    w: &mut Scribe<W>,
    smf: bool,
) -> LibResult<()> {
    match message {
        Message::Sysex { data } => {
            // SysEx does not reset running status in the output
            write_u8!(w, status::SYSEX_START)?;
            if smf {
                // the declared length includes the trailing EOX
                w.write_all(&write_varlen(data.len() as u32 + 1))
                    .context(wr!())?;
            }
            w.write_all(data).context(wr!())?;
            write_u8!(w, status::END_OF_SYSEX)?;
            Ok(())
        }
        Message::Unknown {
            status: status_byte,
            data,
        } => {
            w.cancel_running_status();
            write_u8!(w, *status_byte)?;
            w.write_all(data).context(wr!())?;
            Ok(())
        }
        _ => {
            let status_byte = message.status();
            let mut data = Vec::new();
            message.push_data_bytes(&mut data);
            if status::is_channel_status(status_byte) {
                w.write_status_byte(status_byte)?;
            } else if status::is_realtime(status_byte) {
                // Real-Time does not reset running status in the output
                write_u8!(w, status_byte)?;
            } else {
                w.cancel_running_status();
                write_u8!(w, status_byte)?;
            }
            w.write_all(&data).context(wr!())?;
            Ok(())
        }
    }
}

/// Writes a meta event in its only (file) form:
/// `FF type varlen(len) body`.
pub(crate) fn write_meta<W: Write>(meta: &MetaEvent, w: &mut Scribe<W>) -> LibResult<()> {
    w.cancel_running_status();
    write_u8!(w, 0xFF)?;
    write_u8!(w, meta.meta_type())?;
    let body = meta.body();
    w.write_all(&write_varlen(body.len() as u32)).context(wr!())?;
    w.write_all(&body).context(wr!())?;
    Ok(())
}

/// Writes one track event in SMF form: `varlen(delta)` followed by the
/// event. Builtin events have no wire form and are skipped.
pub(crate) fn write_track_event<W: Write>(event: &Event, w: &mut Scribe<W>) -> LibResult<()> {
    match &event.kind {
        EventKind::Builtin(builtin) => {
            trace!("skipping builtin event {:?} during track write", builtin);
            Ok(())
        }
        EventKind::Message(message) => {
            w.write_all(&write_varlen(event.delta)).context(wr!())?;
            write_message(message, w, true)
        }
        EventKind::Meta(meta) => {
            w.write_all(&write_varlen(event.delta)).context(wr!())?;
            write_meta(meta, w)
        }
    }
}

/// Serializes one event to its live wire form, without a delta prefix and
/// without running-status elision.
pub fn encode_event(event: &Event) -> crate::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut scribe = Scribe::new(&mut bytes, ScribeSettings::default());
    match &event.kind {
        EventKind::Message(message) => write_message(message, &mut scribe, false)?,
        EventKind::Meta(meta) => write_meta(meta, &mut scribe)?,
        EventKind::Builtin(builtin) => {
            trace!("builtin event {:?} has no wire form", builtin);
        }
    }
    Ok(bytes)
}

/// Writes a complete `MTrk` chunk. The track body is buffered first so the
/// chunk length can be computed; a missing End of Track event is supplied.
pub(crate) fn write_track<W: Write>(track: &Track, w: &mut Scribe<W>) -> LibResult<()> {
    w.write_all(b"MTrk").context(wr!())?;

    let mut body: Vec<u8> = Vec::new();
    let mut body_scribe = Scribe::new(
        &mut body,
        ScribeSettings {
            running_status: w.use_running_status(),
        },
    );
    let mut closed = false;
    for event in track.events() {
        write_track_event(event, &mut body_scribe)?;
        closed = event.is_end_of_track();
    }
    if !closed {
        // every track chunk ends with exactly one End of Track
        let end = Event::meta(MetaEvent::EndOfTrack);
        write_track_event(&end, &mut body_scribe)?;
    }

    let length = match u32::try_from(body.len()) {
        Ok(len) => len,
        Err(_) => return crate::error::TrackTooLongSnafu { site: site!() }.fail(),
    };
    w.write_all(&length.to_be_bytes()).context(wr!())?;
    w.write_all(&body).context(wr!())?;
    Ok(())
}

/// Serializes a whole pattern as a Standard MIDI File:
/// `MThd` header followed by one `MTrk` chunk per track.
pub fn write_pattern<W: Write>(
    pattern: &Pattern,
    w: W,
    settings: ScribeSettings,
) -> crate::Result<()> {
    let mut scribe = Scribe::new(w, settings);
    scribe.write_all(b"MThd").context(wr!())?;
    scribe.write_all(&6u32.to_be_bytes()).context(wr!())?;
    scribe
        .write_all(&pattern.format().to_u16().to_be_bytes())
        .context(wr!())?;
    scribe
        .write_all(&(pattern.tracks_len() as u16).to_be_bytes())
        .context(wr!())?;
    scribe
        .write_all(&pattern.division_word().to_be_bytes())
        .context(wr!())?;
    for track in pattern.tracks() {
        write_track(track, &mut scribe)?;
    }
    Ok(())
}

/// Writes a pattern to a file on disk.
pub fn save_pattern<P: AsRef<Path>>(path: P, pattern: &Pattern) -> crate::Result<()> {
    let file = std::fs::File::create(path.as_ref()).context(wr!())?;
    write_pattern(pattern, file, ScribeSettings::default())
}
