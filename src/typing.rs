/// Maps the 0-10 typing-speed dial to characters per second by linear
/// interpolation. Out-of-range speeds clamp to the dial's domain.
pub fn cps_for_speed(speed: f32, min_cps: f32, max_cps: f32) -> f32 {
    let speed = speed.clamp(0.0, 10.0);
    min_cps + (max_cps - min_cps) * (speed / 10.0)
}

/// Deterministic character-emission schedule against frame ticks.
///
/// Each tick advances simulated time by one frame; characters become due
/// whenever the accumulated time crosses a whole character interval. The
/// remainder is carried, not reset, so long runs stay frame-accurate:
/// typing `n` characters always takes `ceil(n * frame_rate / cps)` ticks.
// Summed 1/frame_rate error must not push an exact-boundary crossing onto
// the following tick.
const TICK_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct TypingClock {
    seconds_per_frame: f64,
    seconds_per_char: f64,
    accumulated: f64,
}

impl TypingClock {
    pub fn new(cps: f32, frame_rate: u32) -> Self {
        debug_assert!(cps > 0.0);
        debug_assert!(frame_rate > 0);
        Self {
            seconds_per_frame: 1.0 / f64::from(frame_rate),
            seconds_per_char: 1.0 / f64::from(cps),
            accumulated: 0.0,
        }
    }

    /// Advances one frame tick and returns how many characters are due.
    pub fn advance_tick(&mut self) -> usize {
        self.accumulated += self.seconds_per_frame;
        let mut due = 0;
        while self.accumulated + TICK_EPSILON >= self.seconds_per_char {
            self.accumulated -= self.seconds_per_char;
            due += 1;
        }
        due
    }

    /// Frames a run of `char_count` characters will occupy.
    pub fn frames_for(cps: f32, frame_rate: u32, char_count: usize) -> u32 {
        if char_count == 0 {
            return 0;
        }
        let mut clock = Self::new(cps, frame_rate);
        let mut emitted = 0;
        let mut frames = 0;
        while emitted < char_count {
            emitted += clock.advance_tick();
            frames += 1;
        }
        frames
    }
}
