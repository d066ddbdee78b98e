/*!
The track container: an ordered sequence of events, in non-decreasing tick
order, together with the tempo and signature state needed to annotate and
play them. Events enter through the ingestion dispatch chain, which stamps
`tick`, `delta_time`, and `time`; they leave through `get`/`time_get`,
which runs the output chain.
!*/

use crate::core::{Channel, Message, NoteNumber, Velocity};
use crate::event::{Event, EventKind, HandlerKey};
use crate::file::{
    MetaEvent, MicrosecondsPerBeat, Text, TimeSignatureValue, META_INSTRUMENT_NAME,
    META_SET_TEMPO, META_TIME_SIGNATURE, META_TRACK_NAME,
};
use crate::handlers::{self, HandlerMap, TrackHandler};
use crate::timing::{
    bpm_to_mpb, delta_to_us, monotonic_us, mpb_to_bpm, Clock, PlaybackSettings, SystemClock,
};
use log::trace;
use std::ops::ControlFlow;

/// The default division, in ticks per quarter note, for tracks built by
/// hand. Tracks created from a file use the header's division instead.
pub const DEFAULT_DIVISIONS: u16 = 96;

/// A track of MIDI events.
///
/// Events are stored in the order they were ingested, which for well-formed
/// input is non-decreasing tick order: each event's `tick` equals the
/// previous event's `tick` plus its own `delta`.
#[derive(Clone, Debug)]
pub struct Track {
    pub(crate) events: Vec<Event>,
    /// Name of the track, maintained by the TrackName handler.
    pub name: String,
    /// Instrumentation, maintained by the InstrumentName handler.
    pub instrument: String,
    /// Tempo in beats per minute; kept consistent with `mpb`.
    tempo: u32,
    /// Tempo in microseconds per beat; kept consistent with `tempo`.
    mpb: u32,
    pub timesig_num: u8,
    pub timesig_den: u8,
    /// Ticks per quarter note.
    pub divisions: u16,
    /// Where the next ingested event lands.
    pub(crate) in_index: usize,
    /// The playback cursor.
    pub(crate) out_index: usize,
    /// Wall-clock microseconds at which playback started.
    pub(crate) start_time: u64,
    /// Wall-clock microseconds at which the previous event was released.
    pub(crate) last_time: u64,
    in_hands: HandlerMap<TrackHandler>,
    out_hands: HandlerMap<TrackHandler>,
    pub settings: PlaybackSettings,
}

impl Default for Track {
    fn default() -> Self {
        Self::new()
    }
}

impl Track {
    pub fn new() -> Self {
        Self::with_divisions(DEFAULT_DIVISIONS)
    }

    /// A track using the given division (ticks per quarter note).
    pub fn with_divisions(divisions: u16) -> Self {
        let mut in_hands = HandlerMap::new();
        in_hands.register(HandlerKey::Global, handlers::rehandle as TrackHandler);
        in_hands.register(HandlerKey::Global, handlers::event_tick);
        in_hands.register(HandlerKey::Global, handlers::event_delta_time);
        in_hands.register(HandlerKey::Global, handlers::event_time);
        in_hands.register(HandlerKey::Global, handlers::append_event);
        in_hands.register(HandlerKey::Meta(META_TRACK_NAME), handlers::track_name);
        in_hands.register(
            HandlerKey::Meta(META_INSTRUMENT_NAME),
            handlers::instrument_name,
        );
        in_hands.register(
            HandlerKey::Meta(META_TIME_SIGNATURE),
            handlers::time_signature,
        );

        let mut out_hands = HandlerMap::new();
        out_hands.register(
            HandlerKey::Meta(META_SET_TEMPO),
            handlers::set_tempo as TrackHandler,
        );

        Self {
            events: Vec::new(),
            name: String::new(),
            instrument: String::new(),
            tempo: 120,
            mpb: 500_000,
            timesig_num: 4,
            timesig_den: 4,
            divisions,
            in_index: 0,
            out_index: 0,
            start_time: 0,
            last_time: 0,
            in_hands,
            out_hands,
            settings: PlaybackSettings::default(),
        }
    }

    // -- plain container access --------------------------------------------

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn event(&self, index: usize) -> Option<&Event> {
        self.events.get(index)
    }

    pub fn last_event(&self) -> Option<&Event> {
        self.events.last()
    }

    /// Iterator over the events in the track.
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Stores an event without running any handlers. Used by the rehandle
    /// path, which recomputes time annotation afterwards.
    pub(crate) fn insert_raw(&mut self, index: usize, event: Event) {
        self.events.insert(index, event);
        self.in_index = self.events.len();
    }

    pub(crate) fn push_raw(&mut self, event: Event) {
        self.events.push(event);
        self.in_index = self.events.len();
    }

    // -- tempo state -------------------------------------------------------

    /// Tempo in beats per minute.
    pub fn tempo(&self) -> u32 {
        self.tempo
    }

    /// Sets the tempo in beats per minute, keeping `mpb` in sync.
    pub fn set_tempo(&mut self, bpm: u32) {
        self.tempo = bpm;
        self.mpb = bpm_to_mpb(bpm, self.timesig_den);
    }

    /// Tempo in microseconds per beat.
    pub fn mpb(&self) -> u32 {
        self.mpb
    }

    /// Sets the tempo in microseconds per beat, keeping `tempo` in sync.
    pub fn set_mpb(&mut self, mpb: u32) {
        self.mpb = mpb;
        self.tempo = mpb_to_bpm(mpb, self.timesig_den);
    }

    // -- ingestion ---------------------------------------------------------

    /// Submits an event to the ingestion dispatch chain at the ingestion
    /// cursor, which normally sits just past the last event.
    pub fn submit_event(&mut self, event: Event) -> crate::Result<()> {
        let index = self.in_index.min(self.events.len());
        self.submit_event_at(event, index)
    }

    /// Submits an event at a specific index. Indices below the current
    /// length trigger a full time-annotation pass over the track.
    pub fn submit_event_at(&mut self, event: Event, index: usize) -> crate::Result<()> {
        let chain = self.in_hands.chain(event.key());
        let mut event = event;
        for handler in chain {
            match handler(self, &mut event, index)? {
                ControlFlow::Break(()) => break,
                ControlFlow::Continue(()) => {}
            }
        }
        Ok(())
    }

    /// Appends an event through the dispatch chain.
    pub fn append(&mut self, event: Event) -> crate::Result<()> {
        self.submit_event(event)
    }

    /// Inserts an event at `index` through the dispatch chain, shifting
    /// everything after it and recomputing time annotation.
    pub fn insert(&mut self, index: usize, event: Event) -> crate::Result<()> {
        self.submit_event_at(event, index)
    }

    /// Replaces the event at `index` and recomputes time annotation.
    pub fn set(&mut self, index: usize, event: Event) -> crate::Result<()> {
        if index >= self.events.len() {
            dispatch_error!("set index {} out of range {}", index, self.events.len());
        }
        self.events[index] = event;
        self.rehandle();
        Ok(())
    }

    /// Recomputes `tick`, `delta_time`, and `time` for every event from the
    /// deltas, at the track's current tempo.
    pub fn rehandle(&mut self) {
        let mut prev_tick = 0u64;
        let mut prev_time = 0u64;
        let divisions = self.divisions;
        let mpb = self.mpb;
        for event in &mut self.events {
            event.tick = prev_tick + event.delta as u64;
            event.delta_time = delta_to_us(event.delta, divisions, mpb);
            event.time = prev_time + event.delta_time;
            prev_tick = event.tick;
            prev_time = event.time;
        }
    }

    // -- handler registration ----------------------------------------------

    /// Registers an ingestion handler under `key`.
    pub fn register_in(&mut self, key: HandlerKey, handler: TrackHandler) {
        self.in_hands.register(key, handler);
    }

    /// Registers an output handler under `key`.
    pub fn register_out(&mut self, key: HandlerKey, handler: TrackHandler) {
        self.out_hands.register(key, handler);
    }

    // -- playback ----------------------------------------------------------

    /// The event at the playback cursor, without advancing or running
    /// handlers.
    pub fn current(&self) -> crate::Result<&Event> {
        match self.events.get(self.out_index) {
            Some(event) => Ok(event),
            None => Err(crate::error::PlaybackEndedSnafu.build().into()),
        }
    }

    /// The tick of the next event to play, or `None` when the track is
    /// exhausted.
    pub fn next_tick(&self) -> Option<u64> {
        self.events.get(self.out_index).map(|e| e.tick)
    }

    /// Runs the output dispatch chain for the event at the cursor, advances
    /// the cursor, and returns the event.
    pub fn get(&mut self) -> crate::Result<Event> {
        let index = self.out_index;
        let mut event = match self.events.get(index) {
            Some(event) => event.clone(),
            None => return Err(crate::error::PlaybackEndedSnafu.build().into()),
        };
        let chain = self.out_hands.chain(event.key());
        for handler in chain {
            match handler(self, &mut event, index)? {
                ControlFlow::Break(()) => break,
                ControlFlow::Continue(()) => {}
            }
        }
        self.events[index] = event.clone();
        self.out_index = index + 1;
        Ok(event)
    }

    /// Positions the playback cursor and establishes the wall-clock
    /// reference. When `time` is `None` the monotonic clock is read.
    pub fn start_playback(&mut self, index: usize, time: Option<u64>) {
        self.out_index = index;
        let now = time.unwrap_or_else(monotonic_us);
        self.start_time = now;
        self.last_time = now;
    }

    /// The wall-clock microsecond at which playback started.
    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    /// The wall-clock microsecond at which the previous event was released.
    pub fn last_time(&self) -> u64 {
        self.last_time
    }

    /// Waits until the next event is due (within the lookahead window) and
    /// releases it. See [`PlaybackSettings`] for the timing knobs.
    pub fn time_get(&mut self) -> crate::Result<Event> {
        self.time_get_with(&mut SystemClock)
    }

    /// [`Track::time_get`] against a caller-supplied clock.
    pub fn time_get_with<C: Clock>(&mut self, clock: &mut C) -> crate::Result<Event> {
        let delta = match self.events.get(self.out_index) {
            Some(event) => event.delta,
            None => return Err(crate::error::PlaybackEndedSnafu.build().into()),
        };
        let deadline = self.last_time + delta_to_us(delta, self.divisions, self.mpb);
        loop {
            let now = clock.now_us();
            if deadline <= now + self.settings.lookahead_us {
                break;
            }
            clock.sleep_us(self.settings.interval_us);
        }
        self.last_time = clock.now_us();
        trace!("releasing event at {}", self.last_time);
        self.get()
    }

    // -- builders ----------------------------------------------------------

    /// Appends a note-on message.
    pub fn push_note_on(
        &mut self,
        delta: u32,
        channel: Channel,
        note: NoteNumber,
        velocity: Velocity,
    ) -> crate::Result<()> {
        self.submit_event(Event::with_delta(
            EventKind::Message(Message::NoteOn {
                channel,
                note,
                velocity,
            }),
            delta,
        ))
    }

    /// Appends a note-off message.
    pub fn push_note_off(
        &mut self,
        delta: u32,
        channel: Channel,
        note: NoteNumber,
        velocity: Velocity,
    ) -> crate::Result<()> {
        self.submit_event(Event::with_delta(
            EventKind::Message(Message::NoteOff {
                channel,
                note,
                velocity,
            }),
            delta,
        ))
    }

    /// Appends a tempo meta event and updates the track tempo. The event's
    /// own delta is still timed at the previous tempo.
    pub fn push_tempo(&mut self, delta: u32, mpb: MicrosecondsPerBeat) -> crate::Result<()> {
        self.submit_event(Event::with_delta(
            EventKind::Meta(MetaEvent::SetTempo(mpb)),
            delta,
        ))?;
        self.set_mpb(mpb.get());
        Ok(())
    }

    /// Appends a time signature meta event.
    pub fn push_time_signature(
        &mut self,
        delta: u32,
        value: TimeSignatureValue,
    ) -> crate::Result<()> {
        self.submit_event(Event::with_delta(
            EventKind::Meta(MetaEvent::TimeSignature(value)),
            delta,
        ))
    }

    /// Appends a lyric.
    pub fn push_lyric<S: Into<String>>(&mut self, delta: u32, lyric: S) -> crate::Result<()> {
        self.submit_event(Event::with_delta(
            EventKind::Meta(MetaEvent::Lyric(Text::new(lyric))),
            delta,
        ))
    }

    /// Appends the mandatory End of Track marker.
    pub fn push_end_of_track(&mut self, delta: u32) -> crate::Result<()> {
        self.submit_event(Event::with_delta(
            EventKind::Meta(MetaEvent::EndOfTrack),
            delta,
        ))
    }

    /// Adds, or replaces, the track name at the beginning of the track.
    pub fn set_name<S: Into<String>>(&mut self, name: S) -> crate::Result<()> {
        let event = Event::meta(MetaEvent::TrackName(Text::new(name)));
        for index in 0..self.events.len() {
            if self.events[index].delta != 0 {
                break;
            }
            if matches!(
                self.events[index].kind,
                EventKind::Meta(MetaEvent::TrackName(_))
            ) {
                self.events[index] = event.clone();
                if let EventKind::Meta(MetaEvent::TrackName(text)) = &event.kind {
                    self.name = text.as_str().into_owned();
                }
                return Ok(());
            }
        }
        self.insert(0, event)
    }

    /// Adds, or replaces, the instrument name at the beginning of the track.
    pub fn set_instrument_name<S: Into<String>>(&mut self, name: S) -> crate::Result<()> {
        let event = Event::meta(MetaEvent::InstrumentName(Text::new(name)));
        for index in 0..self.events.len() {
            if self.events[index].delta != 0 {
                break;
            }
            if matches!(
                self.events[index].kind,
                EventKind::Meta(MetaEvent::InstrumentName(_))
            ) {
                self.events[index] = event.clone();
                if let EventKind::Meta(MetaEvent::InstrumentName(text)) = &event.kind {
                    self.instrument = text.as_str().into_owned();
                }
                return Ok(());
            }
        }
        self.insert(0, event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note_on(delta: u32) -> Event {
        Event::with_delta(
            EventKind::Message(Message::NoteOn {
                channel: Channel::new(0),
                note: NoteNumber::new(60),
                velocity: Velocity::new(64),
            }),
            delta,
        )
    }

    #[test]
    fn ingestion_annotates_time() {
        let mut track = Track::new();
        track.submit_event(note_on(0)).unwrap();
        track.submit_event(note_on(96)).unwrap();
        track.submit_event(note_on(48)).unwrap();

        let ticks: Vec<u64> = track.events().map(|e| e.tick).collect();
        assert_eq!(vec![0, 96, 144], ticks);
        let times: Vec<u64> = track.events().map(|e| e.time).collect();
        assert_eq!(vec![0, 500_000, 750_000], times);
        assert_eq!(250_000, track.event(2).unwrap().delta_time);
    }

    #[test]
    fn tick_deltas_are_consistent() {
        let mut track = Track::new();
        for delta in [0u32, 10, 0, 30, 5] {
            track.submit_event(note_on(delta)).unwrap();
        }
        let mut prev = 0u64;
        for event in track.events() {
            assert!(event.tick >= prev);
            assert_eq!(event.tick - prev, event.delta as u64);
            prev = event.tick;
        }
    }

    #[test]
    fn mid_track_insertion_rehandles() {
        let mut track = Track::new();
        for delta in [0u32, 10, 10, 10] {
            track.submit_event(note_on(delta)).unwrap();
        }
        // ticks are now [0, 10, 20, 30]
        track.insert(2, note_on(5)).unwrap();
        let ticks: Vec<u64> = track.events().map(|e| e.tick).collect();
        assert_eq!(vec![0, 10, 15, 25, 35], ticks);
        // times were all recomputed from the deltas
        let times: Vec<u64> = track.events().map(|e| e.time).collect();
        let expected: Vec<u64> = ticks
            .iter()
            .map(|t| t * 500_000 / DEFAULT_DIVISIONS as u64)
            .collect();
        assert_eq!(expected, times);
    }

    #[test]
    fn track_name_handler_names_the_track() {
        let mut track = Track::new();
        track
            .submit_event(Event::meta(MetaEvent::TrackName(Text::new("Singer"))))
            .unwrap();
        assert_eq!("Singer", track.name.as_str());
    }

    #[test]
    fn time_signature_handler_updates_fields() {
        let mut track = Track::new();
        track
            .push_time_signature(
                0,
                TimeSignatureValue {
                    numerator: 6,
                    denominator_exponent: 3,
                    clocks_per_click: 36,
                    notated_32nds: 8,
                },
            )
            .unwrap();
        assert_eq!(6, track.timesig_num);
        assert_eq!(8, track.timesig_den);
    }

    #[test]
    fn tempo_and_mpb_stay_consistent() {
        let mut track = Track::new();
        track.set_tempo(120);
        assert_eq!(500_000, track.mpb());
        track.set_mpb(1_000_000);
        assert_eq!(60, track.tempo());
    }

    #[test]
    fn get_runs_out_handlers_and_advances() {
        let mut track = Track::new();
        track.submit_event(note_on(0)).unwrap();
        track
            .push_tempo(96, MicrosecondsPerBeat::new(1_000_000))
            .unwrap();
        track.submit_event(note_on(96)).unwrap();

        // reset tempo so playback rediscovers it from the event
        track.set_mpb(500_000);
        track.start_playback(0, Some(0));
        track.get().unwrap();
        assert_eq!(500_000, track.mpb());
        track.get().unwrap();
        // the SetTempo out handler fired
        assert_eq!(1_000_000, track.mpb());
    }

    #[test]
    fn playback_past_the_end_fails() {
        let mut track = Track::new();
        track.submit_event(note_on(0)).unwrap();
        track.start_playback(0, Some(0));
        track.get().unwrap();
        let err = track.get().err().unwrap();
        assert!(err.is_playback_ended());
    }

    #[test]
    fn set_name_replaces_at_time_zero() {
        let mut track = Track::new();
        track.set_name("one").unwrap();
        track.set_name("two").unwrap();
        assert_eq!(1, track.len());
        assert_eq!("two", track.name.as_str());
    }

    #[test]
    fn playback_clock_references_are_recorded() {
        let mut track = Track::new();
        track.start_playback(0, Some(42));
        assert_eq!(42, track.start_time());
        assert_eq!(42, track.last_time());
    }
}
