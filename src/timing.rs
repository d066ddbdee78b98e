/*!
Timing utilities: the monotonic microsecond clock used for playback and the
integer conversions between ticks, microseconds, and tempo representations.
All conversions are integer arithmetic (truncating) so that repeated runs
over the same data produce identical timestamps.
!*/

use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Microseconds since an arbitrary process-wide epoch. Monotonic, with at
/// least microsecond resolution.
pub fn monotonic_us() -> u64 {
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_micros() as u64
}

/// Converts a tick delta to microseconds, given the division (ticks per
/// quarter note) and the tempo in microseconds per beat.
pub fn delta_to_us(delta: u32, divisions: u16, mpb: u32) -> u64 {
    debug_assert!(divisions > 0);
    if divisions == 0 {
        return 0;
    }
    delta as u64 * mpb as u64 / divisions as u64
}

/// Converts microseconds to a tick delta, given the division and the tempo
/// in microseconds per beat.
pub fn us_to_delta(us: u64, divisions: u16, mpb: u32) -> u64 {
    debug_assert!(mpb > 0);
    if mpb == 0 {
        return 0;
    }
    us * divisions as u64 / mpb as u64
}

/// Converts beats per minute to microseconds per beat. `denom` is the time
/// signature denominator, normally 4.
pub fn bpm_to_mpb(bpm: u32, denom: u8) -> u32 {
    debug_assert!(bpm > 0);
    if bpm == 0 {
        return 0;
    }
    (60_000_000u64 * denom as u64 / (4 * bpm as u64)) as u32
}

/// Converts microseconds per beat to beats per minute. `denom` is the time
/// signature denominator, normally 4.
pub fn mpb_to_bpm(mpb: u32, denom: u8) -> u32 {
    debug_assert!(mpb > 0);
    if mpb == 0 {
        return 0;
    }
    (60_000_000u64 * denom as u64 / (4 * mpb as u64)) as u32
}

/// The clock used by the playback scheduler. Production code uses
/// [`SystemClock`]; tests substitute a deterministic clock.
pub trait Clock {
    /// The current time in microseconds on a monotonic scale.
    fn now_us(&mut self) -> u64;

    /// Suspends the caller for roughly `us` microseconds. Cooperative; the
    /// scheduler only relies on the clock having advanced when it returns.
    fn sleep_us(&mut self, us: u64);
}

/// The process clock: [`monotonic_us`] plus a thread sleep.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_us(&mut self) -> u64 {
        monotonic_us()
    }

    fn sleep_us(&mut self, us: u64) {
        thread::sleep(Duration::from_micros(us));
    }
}

/// Knobs for the playback scheduler. Events are released up to `lookahead`
/// microseconds before their deadline; between checks the scheduler sleeps
/// for `interval`. `lookahead >= interval` keeps the worst-case lateness
/// under one interval.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PlaybackSettings {
    pub lookahead_us: u64,
    pub interval_us: u64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            lookahead_us: 75_000,
            interval_us: 50_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_clock_advances() {
        let a = monotonic_us();
        let b = monotonic_us();
        assert!(b >= a);
    }

    #[test]
    fn delta_conversion() {
        // one quarter note at 120 bpm and 96 ticks per quarter
        assert_eq!(500_000, delta_to_us(96, 96, 500_000));
        // an eighth note
        assert_eq!(250_000, delta_to_us(48, 96, 500_000));
        assert_eq!(96, us_to_delta(500_000, 96, 500_000));
    }

    #[test]
    fn bpm_mpb_round_trip() {
        for bpm in [1u32, 60, 116, 120, 140, 200, 960] {
            let there_and_back = mpb_to_bpm(bpm_to_mpb(bpm, 4), 4);
            let diff = bpm.abs_diff(there_and_back);
            assert!(diff <= 1, "bpm {} -> {}", bpm, there_and_back);
        }
        assert_eq!(500_000, bpm_to_mpb(120, 4));
        assert_eq!(120, mpb_to_bpm(500_000, 4));
    }

    #[test]
    fn denominator_scales_tempo() {
        // in x/8 time a "beat" is half as long
        assert_eq!(250_000, bpm_to_mpb(120, 2));
    }

    #[test]
    fn default_settings_satisfy_lookahead_invariant() {
        let settings = PlaybackSettings::default();
        assert!(settings.lookahead_us >= settings.interval_us);
    }
}
