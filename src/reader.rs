/*!
The SMF reader: drives a byte source through the file grammar and delivers
a lazy queue of events — StartPattern, then per track a StartTrack followed
by the track's events, then StopPattern. A bounded buffer controls how far
the reader runs ahead of the consumer.
!*/

use crate::decoder::SmfDecoder;
use crate::event::Event;
use crate::file::{Builtin, Format};
use crate::pattern::Pattern;
use crate::source::{ByteSource, FileSource};
use crate::vlq::read_varlen_inner;
use log::{debug, trace};
use snafu::ResultExt;
use std::collections::VecDeque;
use std::path::Path;

/// https://www.music.mcgill.ca/~gary/306/week9/smf.html
const HEADER_TAG: &[u8; 4] = b"MThd";
const TRACK_TAG: &[u8; 4] = b"MTrk";
const HEADER_LENGTH: u32 = 6;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ReaderState {
    /// Nothing read yet; the file header comes first.
    Fresh,
    /// Between tracks; an `MTrk` chunk header comes next.
    TrackHeader,
    /// Inside a track chunk with this many body bytes left.
    TrackBody { remaining: u64 },
    /// Every track has been read and StopPattern queued.
    Done,
}

/// Reads a Standard MIDI File from a [`ByteSource`], one event at a time.
///
/// `buffer` bounds the internal event queue: `0` reads the whole file
/// eagerly on the first `get`, `1` is strictly lazy, anything else keeps up
/// to that many events decoded ahead of the consumer.
#[derive(Debug)]
pub struct SmfReader<S: ByteSource> {
    source: S,
    decoder: SmfDecoder,
    state: ReaderState,
    buffer: usize,
    queue: VecDeque<Event>,
    num_tracks: u16,
    tracks_done: u16,
}

impl SmfReader<FileSource> {
    /// A reader over a file on disk.
    pub fn open<P: AsRef<Path>>(path: P, buffer: usize) -> Self {
        Self::new(FileSource::new(path), buffer)
    }
}

impl<S: ByteSource> SmfReader<S> {
    pub fn new(source: S, buffer: usize) -> Self {
        Self {
            source,
            decoder: SmfDecoder::new(),
            state: ReaderState::Fresh,
            buffer,
            queue: VecDeque::new(),
            num_tracks: 0,
            tracks_done: 0,
        }
    }

    /// Starts the byte source and reads the file header, queueing the
    /// StartPattern event.
    pub fn start(&mut self) -> crate::Result<()> {
        self.source.start().context(io!())?;
        let header = self.read_file_header()?;
        self.queue.push_back(header);
        self.state = if self.num_tracks == 0 {
            self.queue.push_back(Event::builtin(Builtin::StopPattern));
            ReaderState::Done
        } else {
            ReaderState::TrackHeader
        };
        Ok(())
    }

    /// Stops the byte source. Call when done, including when abandoning the
    /// reader early.
    pub fn stop(&mut self) -> crate::Result<()> {
        self.source.stop().context(io!())?;
        Ok(())
    }

    /// The next event, or `None` after StopPattern has been delivered.
    pub fn get(&mut self) -> crate::Result<Option<Event>> {
        self.fill_buffer()?;
        Ok(self.queue.pop_front())
    }

    /// True when more events can be delivered.
    pub fn has_events(&self) -> bool {
        !self.queue.is_empty() || self.state != ReaderState::Done
    }

    /// Tops the queue up to the buffer bound, or all the way when the
    /// buffer is unbounded (zero).
    fn fill_buffer(&mut self) -> crate::Result<()> {
        while (self.buffer == 0 || self.queue.len() < self.buffer)
            && self.state != ReaderState::Done
        {
            self.step()?;
        }
        Ok(())
    }

    fn step(&mut self) -> crate::Result<()> {
        match self.state {
            ReaderState::Fresh => {
                invalid_header!("the reader was not started");
            }
            ReaderState::TrackHeader => {
                let event = self.read_track_header()?;
                self.queue.push_back(event);
            }
            ReaderState::TrackBody { .. } => {
                let event = self.read_event()?;
                self.queue.push_back(event);
                // read_event moves to Done after the final End of Track
                if self.state == ReaderState::Done {
                    self.queue.push_back(Event::builtin(Builtin::StopPattern));
                }
            }
            ReaderState::Done => {}
        }
        Ok(())
    }

    /// Parses `MThd`, validating the tag and field ranges. Headers longer
    /// than the standard six bytes have their excess skipped.
    fn read_file_header(&mut self) -> crate::Result<Event> {
        let tag = self.source.read_exact(4).context(io!())?;
        if tag != HEADER_TAG {
            invalid_header!("expected 'MThd', found {:?}", tag);
        }
        let length = self.read_u32()?;
        if length < HEADER_LENGTH {
            invalid_header!("header length {} is shorter than 6", length);
        }
        let format_word = self.read_u16()?;
        let format = Format::from_u16(format_word)?;
        self.num_tracks = self.read_u16()?;
        let division = self.read_u16()?;
        if length > HEADER_LENGTH {
            let excess = (length - HEADER_LENGTH) as usize;
            debug!("skipping {} excess header byte(s)", excess);
            self.source.read_exact(excess).context(io!())?;
        }
        debug!(
            "header: format {:?}, {} track(s), division {:#06X}",
            format, self.num_tracks, division
        );
        Ok(Event::builtin(Builtin::StartPattern {
            length,
            format,
            num_tracks: self.num_tracks,
            division,
        }))
    }

    /// Parses an `MTrk` chunk header and enters the track body.
    fn read_track_header(&mut self) -> crate::Result<Event> {
        let tag = self.source.read_exact(4).context(io!())?;
        if tag != TRACK_TAG {
            invalid_header!("expected 'MTrk', found {:?}", tag);
        }
        let length = self.read_u32()?;
        debug!("track {} is {} byte(s)", self.tracks_done, length);
        self.state = ReaderState::TrackBody {
            remaining: length as u64,
        };
        let mut event = Event::builtin(Builtin::StartTrack {
            chunk_type: *TRACK_TAG,
            length,
        });
        event.track = self.tracks_done as i32;
        Ok(event)
    }

    /// Reads one `varlen(delta) event` record from the track body and
    /// stamps it with its delta and track index.
    fn read_event(&mut self) -> crate::Result<Event> {
        let (delta, delta_bytes) = read_varlen_inner(&mut self.source)?;
        self.consume(delta_bytes as u64)?;
        trace!("delta {} ({} byte(s))", delta, delta_bytes);

        let mut event = loop {
            if self.body_remaining() == 0 {
                length_mismatch!(
                    "track {} body ended inside an event",
                    self.tracks_done
                );
            }
            let byte = self.source.read_byte().context(io!())?;
            self.consume(1)?;
            if let Some(event) = self.decoder.seq_decode(byte)? {
                break event;
            }
        };
        event.delta = delta;
        event.track = self.tracks_done as i32;

        if event.is_end_of_track() {
            let remaining = self.body_remaining();
            if remaining != 0 {
                length_mismatch!(
                    "End of Track with {} body byte(s) left in track {}",
                    remaining,
                    self.tracks_done
                );
            }
            self.tracks_done += 1;
            // running status does not carry across track chunks
            self.decoder.reset();
            if self.tracks_done == self.num_tracks {
                debug!("all {} track(s) read", self.num_tracks);
                self.state = ReaderState::Done;
            } else {
                self.state = ReaderState::TrackHeader;
            }
        }
        Ok(event)
    }

    fn body_remaining(&self) -> u64 {
        match self.state {
            ReaderState::TrackBody { remaining } => remaining,
            _ => 0,
        }
    }

    fn consume(&mut self, count: u64) -> crate::Result<()> {
        if let ReaderState::TrackBody { remaining } = self.state {
            if remaining < count {
                length_mismatch!(
                    "track {} declared {} byte(s) too few",
                    self.tracks_done,
                    count - remaining
                );
            }
            self.state = ReaderState::TrackBody {
                remaining: remaining - count,
            };
        }
        Ok(())
    }

    fn read_u16(&mut self) -> crate::Result<u16> {
        let bytes = self.source.read_exact(2).context(io!())?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&mut self) -> crate::Result<u32> {
        let bytes = self.source.read_exact(4).context(io!())?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

/// Reads a whole file into a [`Pattern`], driving every event through the
/// pattern's ingestion dispatch chain.
pub fn load_pattern<P: AsRef<Path>>(path: P) -> crate::Result<Pattern> {
    let mut reader = SmfReader::open(path, 0);
    reader.start()?;
    let mut pattern = Pattern::new();
    while let Some(event) = reader.get()? {
        pattern.submit_event(event)?;
    }
    reader.stop()?;
    Ok(pattern)
}

/// Reads a whole in-memory buffer into a [`Pattern`].
pub fn read_pattern<B: Into<Vec<u8>>>(bytes: B) -> crate::Result<Pattern> {
    let mut reader = SmfReader::new(crate::source::MemorySource::new(bytes), 0);
    reader.start()?;
    let mut pattern = Pattern::new();
    while let Some(event) = reader.get()? {
        pattern.submit_event(event)?;
    }
    reader.stop()?;
    Ok(pattern)
}
