mod utils;

use midi_stream::core::{Channel, Message, NoteNumber, Velocity};
use midi_stream::file::{Builtin, Format, MetaEvent, MicrosecondsPerBeat};
use midi_stream::timing::{Clock, PlaybackSettings};
use midi_stream::{Event, EventKind, Pattern, Track};
use utils::enable_logging;

/// A deterministic clock: time advances only when the scheduler sleeps.
struct FakeClock {
    now: u64,
}

impl FakeClock {
    fn new() -> Self {
        Self { now: 0 }
    }
}

impl Clock for FakeClock {
    fn now_us(&mut self) -> u64 {
        self.now
    }

    fn sleep_us(&mut self, us: u64) {
        self.now += us;
    }
}

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

/// Release instants honor the tempo in effect when each delta elapses: two
/// quarters at 120 bpm take half a second each, and after a SetTempo to
/// 1_000_000 microseconds per beat the next quarter takes a full second.
#[test]
fn tempo_change_stretches_subsequent_quarters() {
    enable_logging();
    let mut track = Track::with_divisions(96);
    track.submit_event(note_on(96)).unwrap();
    track.submit_event(note_on(96)).unwrap();
    track
        .submit_event(Event::meta(MetaEvent::SetTempo(MicrosecondsPerBeat::new(
            1_000_000,
        ))))
        .unwrap();
    track.submit_event(note_on(96)).unwrap();

    track.settings = PlaybackSettings {
        lookahead_us: 0,
        interval_us: 50_000,
    };
    let mut clock = FakeClock::new();
    track.start_playback(0, Some(0));

    track.time_get_with(&mut clock).unwrap();
    assert_eq!(500_000, clock.now);
    track.time_get_with(&mut clock).unwrap();
    assert_eq!(1_000_000, clock.now);
    // the tempo event itself is at delta zero and releases immediately
    let event = track.time_get_with(&mut clock).unwrap();
    assert!(matches!(
        event.kind,
        EventKind::Meta(MetaEvent::SetTempo(_))
    ));
    assert_eq!(1_000_000, clock.now);
    // the quarter after the change takes a full second
    track.time_get_with(&mut clock).unwrap();
    assert_eq!(2_000_000, clock.now);
}

/// The lookahead window releases events early, but never later than one
/// interval past their deadline.
#[test]
fn lookahead_bounds_release_time() {
    enable_logging();
    let mut track = Track::with_divisions(96);
    track.submit_event(note_on(96)).unwrap();
    track.settings = PlaybackSettings {
        lookahead_us: 75_000,
        interval_us: 50_000,
    };
    let mut clock = FakeClock::new();
    track.start_playback(0, Some(0));
    track.time_get_with(&mut clock).unwrap();
    // deadline 500_000: the release at 450_000 is inside the window
    assert_eq!(450_000, clock.now);
}

fn two_track_pattern() -> Pattern {
    let mut pattern = Pattern::new();
    pattern
        .submit_event(Event::builtin(Builtin::StartPattern {
            length: 6,
            format: Format::Multi,
            num_tracks: 2,
            division: 96,
        }))
        .unwrap();

    // track 0 events at ticks 0, 10, 20
    for delta in [0u32, 10, 10] {
        let mut event = note_on(delta);
        event.track = 0;
        pattern.submit_event(event).unwrap();
    }
    let mut end = Event::meta(MetaEvent::EndOfTrack);
    end.track = 0;
    pattern.submit_event(end).unwrap();

    // track 1 events at ticks 5, 15
    for delta in [5u32, 10] {
        let mut event = note_on(delta);
        event.track = 1;
        pattern.submit_event(event).unwrap();
    }
    let mut end = Event::meta(MetaEvent::EndOfTrack);
    end.track = 1;
    pattern.submit_event(end).unwrap();

    // release everything immediately; this test is about ordering
    for track in pattern.tracks_mut() {
        track.settings = PlaybackSettings {
            lookahead_us: 10_000_000_000,
            interval_us: 50_000,
        };
    }
    pattern
}

/// Multi-track playback merges events in tick order, ties broken by the
/// lower track index, bracketed by StartPattern and StopPattern.
#[test]
fn pattern_playback_merges_tracks_in_tick_order() {
    enable_logging();
    let mut pattern = two_track_pattern();
    let mut clock = FakeClock::new();

    let first = pattern.time_get_with(&mut clock).unwrap();
    assert!(matches!(
        first.kind,
        EventKind::Builtin(Builtin::StartPattern {
            num_tracks: 2,
            division: 96,
            ..
        })
    ));

    let mut released = Vec::new();
    loop {
        match pattern.time_get_with(&mut clock) {
            Ok(event) => released.push(event),
            Err(e) => {
                assert!(e.is_playback_ended());
                break;
            }
        }
    }

    let last = released.pop().unwrap();
    assert!(matches!(last.kind, EventKind::Builtin(Builtin::StopPattern)));

    let notes: Vec<(u64, i32)> = released
        .iter()
        .filter(|e| matches!(e.kind, EventKind::Message(_)))
        .map(|e| (e.tick, e.track))
        .collect();
    assert_eq!(vec![(0, 0), (5, 1), (10, 0), (15, 1), (20, 0)], notes);

    // both End of Track events were released, each after its own events
    let ends: Vec<i32> = released
        .iter()
        .filter(|e| e.is_end_of_track())
        .map(|e| e.track)
        .collect();
    assert_eq!(2, ends.len());
}

/// After StopPattern every further call reports that playback ended.
#[test]
fn playback_ended_is_sticky() {
    enable_logging();
    let mut pattern = two_track_pattern();
    let mut clock = FakeClock::new();
    loop {
        if pattern.time_get_with(&mut clock).is_err() {
            break;
        }
    }
    for _ in 0..3 {
        let err = pattern.time_get_with(&mut clock).err().unwrap();
        assert!(err.is_playback_ended());
    }
}

/// In a format 1 pattern a SetTempo released from the tempo track changes
/// the clock of every track.
#[test]
fn global_tempo_applies_during_playback() {
    enable_logging();
    let mut pattern = Pattern::new();
    pattern
        .submit_event(Event::builtin(Builtin::StartPattern {
            length: 6,
            format: Format::Multi,
            num_tracks: 2,
            division: 96,
        }))
        .unwrap();

    let mut tempo = Event::meta(MetaEvent::SetTempo(MicrosecondsPerBeat::new(250_000)));
    tempo.track = 0;
    pattern.submit_event(tempo).unwrap();
    // ingestion-side propagation already reached both tracks
    assert_eq!(250_000, pattern.track(1).unwrap().mpb());

    let mut end = Event::meta(MetaEvent::EndOfTrack);
    end.track = 0;
    pattern.submit_event(end).unwrap();
    let mut note = note_on(96);
    note.track = 1;
    pattern.submit_event(note).unwrap();
    let mut end = Event::meta(MetaEvent::EndOfTrack);
    end.track = 1;
    pattern.submit_event(end).unwrap();

    // undo the ingestion-side propagation to prove the playback-side
    // handler reapplies it
    for track in pattern.tracks_mut() {
        track.set_mpb(500_000);
        track.settings = PlaybackSettings {
            lookahead_us: 10_000_000_000,
            interval_us: 50_000,
        };
    }

    let mut clock = FakeClock::new();
    loop {
        match pattern.time_get_with(&mut clock) {
            Ok(event) => {
                if matches!(event.kind, EventKind::Meta(MetaEvent::SetTempo(_))) {
                    break;
                }
            }
            Err(e) => panic!("playback ended early: {}", e),
        }
    }
    assert_eq!(250_000, pattern.track(0).unwrap().mpb());
    assert_eq!(250_000, pattern.track(1).unwrap().mpb());
}
