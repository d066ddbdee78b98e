/*!
The pattern container: an ordered collection of tracks corresponding to one
Standard MIDI File, with its own dispatch maps. Ingestion routes events
into tracks via the builtin pattern/track markers; playback merges the
tracks back into a single stream in tick order.
!*/

use crate::event::{Event, HandlerKey};
use crate::file::{Builtin, BuiltinKind, Division, Format, META_END_OF_TRACK};
use crate::handlers::{self, HandlerMap, PatternHandler};
use crate::timing::{Clock, SystemClock};
use crate::track::Track;
use log::trace;
use std::ops::ControlFlow;

/// A collection of tracks plus the header state of the file they came
/// from. See the module documentation for the event lifecycle.
#[derive(Clone, Debug)]
pub struct Pattern {
    tracks: Vec<Track>,
    format: Format,
    /// The raw SMF division word.
    division: u16,
    /// Track count announced by StartPattern; the tracks vector reaches
    /// this size as ingestion proceeds.
    pub(crate) expected_tracks: u16,
    /// The ingestion cursor: which track untagged incoming events land in.
    /// Advanced by the End of Track handler.
    pub(crate) track_index: usize,
    /// Set once StopPattern has been ingested.
    pub(crate) done: bool,
    in_hands: HandlerMap<PatternHandler>,
    out_hands: HandlerMap<PatternHandler>,
    /// Track indices still producing during playback.
    playing: Vec<usize>,
    started_playback: bool,
    stop_emitted: bool,
}

impl Default for Pattern {
    fn default() -> Self {
        Self::new()
    }
}

impl Pattern {
    pub fn new() -> Self {
        let mut in_hands = HandlerMap::new();
        in_hands.register(
            HandlerKey::Builtin(BuiltinKind::StartPattern),
            handlers::start_pattern as PatternHandler,
        );
        in_hands.register(
            HandlerKey::Builtin(BuiltinKind::StartPattern),
            handlers::create_tracks,
        );
        in_hands.register(
            HandlerKey::Builtin(BuiltinKind::StartPattern),
            handlers::attach_global_tempo,
        );
        in_hands.register(
            HandlerKey::Builtin(BuiltinKind::StopPattern),
            handlers::finish_pattern,
        );
        in_hands.register(HandlerKey::Meta(META_END_OF_TRACK), handlers::stop_track);
        in_hands.register(HandlerKey::Global, handlers::sort_events);

        Self {
            tracks: Vec::new(),
            format: Format::default(),
            division: crate::track::DEFAULT_DIVISIONS,
            expected_tracks: 0,
            track_index: 0,
            done: false,
            in_hands,
            out_hands: HandlerMap::new(),
            playing: Vec::new(),
            started_playback: false,
            stop_emitted: false,
        }
    }

    // -- header state ------------------------------------------------------

    pub fn format(&self) -> Format {
        self.format
    }

    pub(crate) fn set_format(&mut self, format: Format) {
        self.format = format;
    }

    /// The raw division word from the file header.
    pub fn division_word(&self) -> u16 {
        self.division
    }

    pub(crate) fn set_division_word(&mut self, division: u16) {
        self.division = division;
    }

    /// The division decoded from the raw word.
    pub fn division(&self) -> Division {
        Division::from_u16(self.division)
    }

    /// True once StopPattern has been ingested.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// The track count announced by the file header, which can exceed
    /// [`Pattern::tracks_len`] while ingestion is still under way.
    pub fn expected_tracks(&self) -> u16 {
        self.expected_tracks
    }

    // -- track access ------------------------------------------------------

    pub fn tracks_len(&self) -> usize {
        self.tracks.len()
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    pub fn tracks_mut(&mut self) -> impl Iterator<Item = &mut Track> {
        self.tracks.iter_mut()
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn track_mut(&mut self, index: usize) -> Option<&mut Track> {
        self.tracks.get_mut(index)
    }

    pub fn push_track(&mut self, track: Track) {
        self.tracks.push(track);
    }

    // -- handler registration ----------------------------------------------

    pub fn register_in(&mut self, key: HandlerKey, handler: PatternHandler) {
        self.in_hands.register(key, handler);
    }

    pub fn register_out(&mut self, key: HandlerKey, handler: PatternHandler) {
        self.out_hands.register(key, handler);
    }

    // -- ingestion ---------------------------------------------------------

    /// Submits an event to a specific track, overriding its `track` tag.
    pub fn submit_event_to(&mut self, mut event: Event, index: usize) -> crate::Result<()> {
        event.track = index as i32;
        self.submit_event(event)
    }

    /// Submits an event to the pattern's ingestion dispatch chain. Builtin
    /// markers configure the pattern; everything else is routed into a
    /// track, honoring the event's `track` tag when present.
    pub fn submit_event(&mut self, event: Event) -> crate::Result<()> {
        let chain = self.in_hands.chain(event.key());
        let index = self.track_index;
        let mut event = event;
        for handler in chain {
            match handler(self, &mut event, index)? {
                ControlFlow::Break(()) => break,
                ControlFlow::Continue(()) => {}
            }
        }
        Ok(())
    }

    // -- playback ----------------------------------------------------------

    /// Releases the next event across all tracks in real time.
    ///
    /// The first call emits a synthetic StartPattern and starts every
    /// track's playback clock. Subsequent calls pick the track whose next
    /// event has the smallest tick (ties broken by the lower track index),
    /// wait until that event is due, and release it. When a track's End of
    /// Track has been released the track drops out; once every track is
    /// done a single StopPattern is emitted, after which calls fail with a
    /// playback-ended error.
    pub fn time_get(&mut self) -> crate::Result<Event> {
        self.time_get_with(&mut SystemClock)
    }

    /// [`Pattern::time_get`] against a caller-supplied clock.
    pub fn time_get_with<C: Clock>(&mut self, clock: &mut C) -> crate::Result<Event> {
        if !self.started_playback {
            self.started_playback = true;
            self.playing = (0..self.tracks.len()).collect();
            let now = clock.now_us();
            for track in &mut self.tracks {
                track.start_playback(0, Some(now));
            }
            trace!("pattern playback started at {}", now);
            return Ok(Event::builtin(Builtin::StartPattern {
                length: 6,
                format: self.format,
                num_tracks: self.tracks.len() as u16,
                division: self.division,
            }));
        }

        self.playing
            .retain(|&index| self.tracks[index].next_tick().is_some());
        let best = self
            .playing
            .iter()
            .copied()
            .min_by_key(|&index| (self.tracks[index].next_tick().unwrap_or(u64::MAX), index));
        let best = match best {
            Some(index) => index,
            None => {
                if !self.stop_emitted {
                    self.stop_emitted = true;
                    trace!("all tracks drained, emitting StopPattern");
                    return Ok(Event::builtin(Builtin::StopPattern));
                }
                return Err(crate::error::PlaybackEndedSnafu.build().into());
            }
        };

        let mut event = self.tracks[best].time_get_with(clock)?;
        let chain = self.out_hands.chain(event.key());
        for handler in chain {
            match handler(self, &mut event, best)? {
                ControlFlow::Break(()) => break,
                ControlFlow::Continue(()) => {}
            }
        }
        if event.is_end_of_track() {
            self.playing.retain(|&index| index != best);
        }
        Ok(event)
    }
}
