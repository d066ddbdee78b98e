mod utils;

use midi_stream::core::{Channel, Message, NoteNumber, Velocity};
use midi_stream::encoder::{save_pattern, write_pattern, ScribeSettings};
use midi_stream::file::{Builtin, Format, MetaEvent, MicrosecondsPerBeat, Text};
use midi_stream::reader::{load_pattern, read_pattern, SmfReader};
use midi_stream::source::MemorySource;
use midi_stream::{Event, EventKind};
use tempfile::tempdir;
use utils::{enable_logging, smf_bytes, EMPTY_TRACK};

#[test]
fn header_yields_start_pattern() {
    enable_logging();
    let bytes = smf_bytes(1, 0x60, &[EMPTY_TRACK, EMPTY_TRACK, EMPTY_TRACK]);
    let mut reader = SmfReader::new(MemorySource::new(bytes), 1);
    reader.start().unwrap();
    let event = reader.get().unwrap().unwrap();
    match event.kind {
        EventKind::Builtin(Builtin::StartPattern {
            length,
            format,
            num_tracks,
            division,
        }) => {
            assert_eq!(6, length);
            assert_eq!(Format::Multi, format);
            assert_eq!(3, num_tracks);
            assert_eq!(96, division);
        }
        other => panic!("expected StartPattern, got {:?}", other),
    }
    reader.stop().unwrap();
}

#[test]
fn reader_delivers_the_full_event_sequence() {
    enable_logging();
    // one track: delta 0 note-on, delta 0x60 note-off, end of track
    let body: &[u8] = &[
        0x00, 0x90, 60, 64, //
        0x60, 0x80, 60, 0, //
        0x00, 0xFF, 0x2F, 0x00,
    ];
    let bytes = smf_bytes(0, 96, &[body]);
    let mut reader = SmfReader::new(MemorySource::new(bytes), 0);
    reader.start().unwrap();

    let mut events = Vec::new();
    while let Some(event) = reader.get().unwrap() {
        events.push(event);
    }
    assert_eq!(6, events.len());
    assert!(matches!(
        events[0].kind,
        EventKind::Builtin(Builtin::StartPattern { .. })
    ));
    assert!(matches!(
        events[1].kind,
        EventKind::Builtin(Builtin::StartTrack { .. })
    ));
    assert!(matches!(events[2].kind, EventKind::Message(_)));
    assert_eq!(0, events[2].delta);
    assert_eq!(0, events[2].track);
    assert_eq!(0x60, events[3].delta);
    assert!(events[4].is_end_of_track());
    assert!(matches!(
        events[5].kind,
        EventKind::Builtin(Builtin::StopPattern)
    ));
    assert!(!reader.has_events());
}

#[test]
fn lazy_and_eager_buffers_agree() {
    enable_logging();
    let body: &[u8] = &[
        0x00, 0x90, 60, 64, //
        0x10, 62, 64, // running status inside the file
        0x00, 0xFF, 0x2F, 0x00,
    ];
    let bytes = smf_bytes(0, 96, &[body]);

    let mut eager = SmfReader::new(MemorySource::new(bytes.clone()), 0);
    eager.start().unwrap();
    let mut eager_events = Vec::new();
    while let Some(event) = eager.get().unwrap() {
        eager_events.push(event);
    }

    let mut lazy = SmfReader::new(MemorySource::new(bytes), 1);
    lazy.start().unwrap();
    let mut lazy_events = Vec::new();
    while let Some(event) = lazy.get().unwrap() {
        lazy_events.push(event);
    }

    assert_eq!(eager_events, lazy_events);
    // StartPattern, StartTrack, two note-ons, End of Track, StopPattern
    assert_eq!(6, eager_events.len());
}

#[test]
fn bad_header_tag_is_rejected() {
    enable_logging();
    let mut bytes = smf_bytes(0, 96, &[EMPTY_TRACK]);
    bytes[0] = b'X';
    let mut reader = SmfReader::new(MemorySource::new(bytes), 0);
    assert!(reader.start().is_err());
}

#[test]
fn truncated_track_is_a_length_mismatch() {
    enable_logging();
    // declared body runs out in the middle of the note-on
    let body: &[u8] = &[0x00, 0x90, 60];
    let bytes = smf_bytes(0, 96, &[body]);
    let mut reader = SmfReader::new(MemorySource::new(bytes), 0);
    reader.start().unwrap();
    let mut result = reader.get();
    while let Ok(Some(_)) = result {
        result = reader.get();
    }
    assert!(result.is_err());
}

#[test]
fn ingested_pattern_carries_names_and_tempo() {
    enable_logging();
    let body: &[u8] = &[
        0x00, 0xFF, 0x03, 0x05, b'P', b'i', b'a', b'n', b'o', // TrackName
        0x00, 0xFF, 0x51, 0x03, 0x0F, 0x42, 0x40, // SetTempo 1_000_000
        0x00, 0x90, 60, 64, //
        0x00, 0xFF, 0x2F, 0x00,
    ];
    let bytes = smf_bytes(0, 96, &[body]);
    let pattern = read_pattern(bytes).unwrap();
    assert!(pattern.is_done());
    assert_eq!(1, pattern.tracks_len());
    let track = pattern.track(0).unwrap();
    assert_eq!("Piano", track.name.as_str());
    assert_eq!(4, track.len());
}

#[test]
fn write_then_read_round_trip() {
    enable_logging();
    let mut pattern = midi_stream::Pattern::new();
    pattern
        .submit_event(Event::builtin(Builtin::StartPattern {
            length: 6,
            format: Format::Single,
            num_tracks: 1,
            division: 96,
        }))
        .unwrap();
    {
        let track = pattern.track_mut(0).unwrap();
        track.set_name("Singer").unwrap();
        track
            .push_tempo(0, MicrosecondsPerBeat::new(600_000))
            .unwrap();
        track
            .push_note_on(0, Channel::new(0), NoteNumber::new(60), Velocity::new(64))
            .unwrap();
        track
            .push_note_off(96, Channel::new(0), NoteNumber::new(60), Velocity::new(0))
            .unwrap();
        track.push_end_of_track(0).unwrap();
    }

    let mut bytes: Vec<u8> = Vec::new();
    write_pattern(&pattern, &mut bytes, ScribeSettings::default()).unwrap();

    let reloaded = read_pattern(bytes.clone()).unwrap();
    assert_eq!(Format::Single, reloaded.format());
    assert_eq!(1, reloaded.tracks_len());
    let track = reloaded.track(0).unwrap();
    assert_eq!("Singer", track.name.as_str());
    assert_eq!(pattern.track(0).unwrap().len(), track.len());

    // serializing the reloaded pattern reproduces the bytes exactly
    let mut again: Vec<u8> = Vec::new();
    write_pattern(&reloaded, &mut again, ScribeSettings::default()).unwrap();
    assert_eq!(bytes, again);
}

#[test]
fn running_status_output_is_understood_on_reload() {
    enable_logging();
    let mut pattern = midi_stream::Pattern::new();
    pattern
        .submit_event(Event::builtin(Builtin::StartPattern {
            length: 6,
            format: Format::Single,
            num_tracks: 1,
            division: 96,
        }))
        .unwrap();
    {
        let track = pattern.track_mut(0).unwrap();
        for step in 0..4u8 {
            track
                .push_note_on(
                    if step == 0 { 0 } else { 24 },
                    Channel::new(0),
                    NoteNumber::new(60 + step),
                    Velocity::new(64),
                )
                .unwrap();
        }
        track.push_end_of_track(0).unwrap();
    }

    let mut plain: Vec<u8> = Vec::new();
    write_pattern(&pattern, &mut plain, ScribeSettings::default()).unwrap();
    let mut elided: Vec<u8> = Vec::new();
    write_pattern(
        &pattern,
        &mut elided,
        ScribeSettings {
            running_status: true,
        },
    )
    .unwrap();
    // three status bytes were elided
    assert_eq!(plain.len() - 3, elided.len());

    let a = read_pattern(plain).unwrap();
    let b = read_pattern(elided).unwrap();
    let left: Vec<&Event> = a.track(0).unwrap().events().collect();
    let right: Vec<&Event> = b.track(0).unwrap().events().collect();
    assert_eq!(left, right);
}

#[test]
fn sysex_round_trips_through_a_file() {
    enable_logging();
    let body: &[u8] = &[
        0x00, 0xF0, 0x05, 0x43, 0x12, 0x00, 0x07, 0xF7, //
        0x00, 0xFF, 0x2F, 0x00,
    ];
    let bytes = smf_bytes(0, 96, &[body]);
    let pattern = read_pattern(bytes.clone()).unwrap();
    let track = pattern.track(0).unwrap();
    match &track.event(0).unwrap().kind {
        EventKind::Message(Message::Sysex { data }) => {
            assert_eq!(&vec![0x43, 0x12, 0x00, 0x07], data);
        }
        other => panic!("expected sysex, got {:?}", other),
    }

    let mut again: Vec<u8> = Vec::new();
    write_pattern(&pattern, &mut again, ScribeSettings::default()).unwrap();
    assert_eq!(bytes, again);
}

#[test]
fn unknown_meta_survives_a_round_trip() {
    enable_logging();
    let body: &[u8] = &[
        0x00, 0xFF, 0x60, 0x02, 0xAB, 0xCD, //
        0x00, 0xFF, 0x2F, 0x00,
    ];
    let bytes = smf_bytes(0, 96, &[body]);
    let pattern = read_pattern(bytes.clone()).unwrap();
    assert_eq!(
        EventKind::Meta(MetaEvent::Unknown {
            meta_type: 0x60,
            data: vec![0xAB, 0xCD]
        }),
        pattern.track(0).unwrap().event(0).unwrap().kind
    );
    let mut again: Vec<u8> = Vec::new();
    write_pattern(&pattern, &mut again, ScribeSettings::default()).unwrap();
    assert_eq!(bytes, again);
}

#[test]
fn save_and_load_files_on_disk() {
    enable_logging();
    let dir = tempdir().unwrap();
    let path = dir.path().join("song.mid");

    let mut pattern = midi_stream::Pattern::new();
    pattern
        .submit_event(Event::builtin(Builtin::StartPattern {
            length: 6,
            format: Format::Multi,
            num_tracks: 2,
            division: 96,
        }))
        .unwrap();
    pattern
        .track_mut(0)
        .unwrap()
        .submit_event(Event::meta(MetaEvent::TrackName(Text::new("left"))))
        .unwrap();
    pattern
        .track_mut(1)
        .unwrap()
        .submit_event(Event::meta(MetaEvent::TrackName(Text::new("right"))))
        .unwrap();

    save_pattern(&path, &pattern).unwrap();
    let reloaded = load_pattern(&path).unwrap();
    assert_eq!(2, reloaded.tracks_len());
    assert_eq!("left", reloaded.track(0).unwrap().name.as_str());
    assert_eq!("right", reloaded.track(1).unwrap().name.as_str());
}
