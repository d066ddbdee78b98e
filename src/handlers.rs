/*!
Dispatch handlers: the functions that rewrite container state as events are
ingested (`in` handlers) and emitted (`out` handlers).

Handlers are registered in a [`HandlerMap`] under a [`HandlerKey`]. For each
event the runner concatenates the key-specific chain with the `Global`
chain, removes duplicates while preserving order, and invokes each handler
with the container, the event, and the insertion index. A handler returning
`ControlFlow::Break` halts the chain for that event.

The default track chain annotates each incoming event with its absolute
tick, its delta in microseconds, and its absolute time, then stores it; the
default pattern chain routes events into tracks and reacts to the builtin
pattern/track markers.
!*/

use crate::event::{Event, EventKind, HandlerKey};
use crate::file::{Builtin, Division, Format, MetaEvent};
use crate::pattern::Pattern;
use crate::timing::delta_to_us;
use crate::track::Track;
use log::{debug, trace};
use std::collections::BTreeMap;
use std::ops::ControlFlow;

/// What a handler returns: `Continue` to run the rest of the chain, `Break`
/// to halt it for this event. Errors surface as
/// [`dispatch errors`](crate::Error) and drop the event.
pub type HandlerOutcome = crate::Result<ControlFlow<()>>;

/// A track-level dispatch function.
pub type TrackHandler = fn(&mut Track, &mut Event, usize) -> HandlerOutcome;

/// A pattern-level dispatch function.
pub type PatternHandler = fn(&mut Pattern, &mut Event, usize) -> HandlerOutcome;

/// Ordered lists of handlers per dispatch key.
#[derive(Clone, Debug)]
pub struct HandlerMap<H> {
    map: BTreeMap<HandlerKey, Vec<H>>,
}

impl<H> Default for HandlerMap<H> {
    fn default() -> Self {
        Self {
            map: BTreeMap::new(),
        }
    }
}

impl<H: Copy + PartialEq> HandlerMap<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `handler` to the chain registered under `key`.
    pub fn register(&mut self, key: HandlerKey, handler: H) {
        self.map.entry(key).or_default().push(handler);
    }

    /// Removes every registration of `handler` under `key`.
    pub fn unregister(&mut self, key: HandlerKey, handler: H) {
        if let Some(chain) = self.map.get_mut(&key) {
            chain.retain(|h| *h != handler);
        }
    }

    /// The effective chain for an event key: the key-specific handlers
    /// followed by the `Global` handlers, deduplicated, order preserved.
    pub fn chain(&self, key: HandlerKey) -> Vec<H> {
        let mut chain: Vec<H> = Vec::new();
        let keyed = self.map.get(&key).into_iter().flatten();
        let global = self.map.get(&HandlerKey::Global).into_iter().flatten();
        for &handler in keyed.chain(global) {
            if !chain.contains(&handler) {
                chain.push(handler);
            }
        }
        chain
    }
}

// ---------------------------------------------------------------------------
// default track input handlers
// ---------------------------------------------------------------------------

/// Re-runs time annotation over the whole track when an event is inserted
/// anywhere but the end. Quadratic in the worst case; only mid-track
/// insertions pay for it.
pub fn rehandle(track: &mut Track, event: &mut Event, index: usize) -> HandlerOutcome {
    if index < track.len() {
        debug!("mid-track insertion at {}, rehandling", index);
        track.insert_raw(index, event.clone());
        track.rehandle();
        return Ok(ControlFlow::Break(()));
    }
    Ok(ControlFlow::Continue(()))
}

/// `event.tick = prev.tick + event.delta`.
pub fn event_tick(track: &mut Track, event: &mut Event, _index: usize) -> HandlerOutcome {
    let prev = track.last_event().map(|e| e.tick).unwrap_or(0);
    event.tick = prev + event.delta as u64;
    Ok(ControlFlow::Continue(()))
}

/// `event.delta_time = delta_to_us(event.delta)` at the tempo prevailing
/// now.
pub fn event_delta_time(track: &mut Track, event: &mut Event, _index: usize) -> HandlerOutcome {
    event.delta_time = delta_to_us(event.delta, track.divisions, track.mpb());
    Ok(ControlFlow::Continue(()))
}

/// `event.time = prev.time + event.delta_time`.
pub fn event_time(track: &mut Track, event: &mut Event, _index: usize) -> HandlerOutcome {
    let prev = track.last_event().map(|e| e.time).unwrap_or(0);
    event.time = prev + event.delta_time;
    Ok(ControlFlow::Continue(()))
}

/// Stores the annotated event at the end of the track.
pub fn append_event(track: &mut Track, event: &mut Event, _index: usize) -> HandlerOutcome {
    track.push_raw(event.clone());
    Ok(ControlFlow::Continue(()))
}

/// TrackName meta events name the track.
pub fn track_name(track: &mut Track, event: &mut Event, _index: usize) -> HandlerOutcome {
    if let EventKind::Meta(MetaEvent::TrackName(name)) = &event.kind {
        trace!("track name '{}'", name);
        track.name = name.as_str().into_owned();
    }
    Ok(ControlFlow::Continue(()))
}

/// InstrumentName meta events set the track's instrument.
pub fn instrument_name(track: &mut Track, event: &mut Event, _index: usize) -> HandlerOutcome {
    if let EventKind::Meta(MetaEvent::InstrumentName(name)) = &event.kind {
        track.instrument = name.as_str().into_owned();
    }
    Ok(ControlFlow::Continue(()))
}

/// TimeSignature meta events update the track's signature fields.
pub fn time_signature(track: &mut Track, event: &mut Event, _index: usize) -> HandlerOutcome {
    if let EventKind::Meta(MetaEvent::TimeSignature(value)) = &event.kind {
        track.timesig_num = value.numerator;
        track.timesig_den = value.denominator();
    }
    Ok(ControlFlow::Continue(()))
}

// ---------------------------------------------------------------------------
// default track output handlers
// ---------------------------------------------------------------------------

/// A SetTempo observed during playback changes the clock for subsequent
/// events; times already stamped are untouched.
pub fn set_tempo(track: &mut Track, event: &mut Event, _index: usize) -> HandlerOutcome {
    if let EventKind::Meta(MetaEvent::SetTempo(mpb)) = &event.kind {
        debug!("tempo change to {} microseconds per beat", mpb.get());
        track.set_mpb(mpb.get());
    }
    Ok(ControlFlow::Continue(()))
}

// ---------------------------------------------------------------------------
// default pattern input handlers
// ---------------------------------------------------------------------------

/// Routes a wire or meta event into its track: the event's own `track`
/// index when it has one, the pattern's ingestion cursor otherwise. Builtin
/// events stay at the pattern level.
pub fn sort_events(pattern: &mut Pattern, event: &mut Event, _index: usize) -> HandlerOutcome {
    if matches!(event.kind, EventKind::Builtin(_)) {
        return Ok(ControlFlow::Continue(()));
    }
    let index = route_index(pattern, event)?;
    match pattern.track_mut(index) {
        Some(track) => track.submit_event(event.clone())?,
        None => dispatch_error!("track {} disappeared during routing", index),
    }
    Ok(ControlFlow::Continue(()))
}

/// StartPattern carries the header fields onto the pattern.
pub fn start_pattern(pattern: &mut Pattern, event: &mut Event, _index: usize) -> HandlerOutcome {
    if let EventKind::Builtin(Builtin::StartPattern {
        format,
        num_tracks,
        division,
        ..
    }) = &event.kind
    {
        debug!(
            "pattern start: format {:?}, {} track(s), division {:#06X}",
            format, num_tracks, division
        );
        pattern.set_format(*format);
        pattern.set_division_word(*division);
        pattern.expected_tracks = *num_tracks;
    }
    Ok(ControlFlow::Continue(()))
}

/// Creates the tracks announced by StartPattern.
pub fn create_tracks(pattern: &mut Pattern, event: &mut Event, _index: usize) -> HandlerOutcome {
    if let EventKind::Builtin(Builtin::StartPattern {
        num_tracks,
        division,
        ..
    }) = &event.kind
    {
        let ticks = Division::from_u16(*division).ticks_per_quarter();
        for _ in 0..*num_tracks {
            pattern.push_track(Track::with_divisions(ticks));
        }
    }
    Ok(ControlFlow::Continue(()))
}

/// In a format 1 file the first track holds the tempo map for all of them:
/// install the global tempo handlers on both streams.
pub fn attach_global_tempo(
    pattern: &mut Pattern,
    event: &mut Event,
    _index: usize,
) -> HandlerOutcome {
    if let EventKind::Builtin(Builtin::StartPattern { format, .. }) = &event.kind {
        if *format == Format::Multi {
            pattern.register_in(
                HandlerKey::Meta(crate::file::META_SET_TEMPO),
                global_tempo,
            );
            pattern.register_out(
                HandlerKey::Meta(crate::file::META_SET_TEMPO),
                global_tempo,
            );
        }
    }
    Ok(ControlFlow::Continue(()))
}

/// Propagates a SetTempo to every track. Installed by
/// [`attach_global_tempo`] for format 1 patterns only.
pub fn global_tempo(pattern: &mut Pattern, event: &mut Event, _index: usize) -> HandlerOutcome {
    if let EventKind::Meta(MetaEvent::SetTempo(mpb)) = &event.kind {
        let mpb = mpb.get();
        for track in pattern.tracks_mut() {
            track.set_mpb(mpb);
        }
    }
    Ok(ControlFlow::Continue(()))
}

/// An End of Track closes the current ingestion track: the event is routed
/// into it, then the cursor advances. Halts the chain so the global router
/// does not deliver the event twice.
pub fn stop_track(pattern: &mut Pattern, event: &mut Event, _index: usize) -> HandlerOutcome {
    let index = route_index(pattern, event)?;
    match pattern.track_mut(index) {
        Some(track) => track.submit_event(event.clone())?,
        None => dispatch_error!("track {} disappeared during routing", index),
    }
    debug!("track {} complete", index);
    pattern.track_index = pattern.track_index.max(index) + 1;
    Ok(ControlFlow::Break(()))
}

/// StopPattern marks the pattern complete.
pub fn finish_pattern(pattern: &mut Pattern, event: &mut Event, _index: usize) -> HandlerOutcome {
    if matches!(
        event.kind,
        EventKind::Builtin(Builtin::StopPattern)
    ) {
        debug!("pattern complete");
        pattern.done = true;
        return Ok(ControlFlow::Break(()));
    }
    Ok(ControlFlow::Continue(()))
}

fn route_index(pattern: &Pattern, event: &mut Event) -> crate::Result<usize> {
    let index = if event.track >= 0 {
        event.track as usize
    } else {
        pattern.track_index
    };
    if index >= pattern.tracks_len() {
        dispatch_error!(
            "event routed to track {} but the pattern has {}",
            index,
            pattern.tracks_len()
        );
    }
    event.track = index as i32;
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(_: &mut Track, _: &mut Event, _: usize) -> HandlerOutcome {
        Ok(ControlFlow::Continue(()))
    }

    fn two(_: &mut Track, _: &mut Event, _: usize) -> HandlerOutcome {
        Ok(ControlFlow::Continue(()))
    }

    #[test]
    fn chain_is_key_then_global_without_duplicates() {
        let mut map: HandlerMap<TrackHandler> = HandlerMap::new();
        map.register(HandlerKey::Status(0x90), one);
        map.register(HandlerKey::Global, two);
        map.register(HandlerKey::Global, one); // duplicate of the keyed one
        let chain = map.chain(HandlerKey::Status(0x90));
        assert_eq!(2, chain.len());
        assert!(chain[0] == one as TrackHandler);
        assert!(chain[1] == two as TrackHandler);
    }

    #[test]
    fn chain_for_unknown_key_is_global_only() {
        let mut map: HandlerMap<TrackHandler> = HandlerMap::new();
        map.register(HandlerKey::Global, one);
        let chain = map.chain(HandlerKey::Status(0x80));
        assert_eq!(1, chain.len());
    }

    #[test]
    fn unregister_removes_the_handler() {
        let mut map: HandlerMap<TrackHandler> = HandlerMap::new();
        map.register(HandlerKey::Global, one);
        map.unregister(HandlerKey::Global, one);
        assert!(map.chain(HandlerKey::Global).is_empty());
    }
}
