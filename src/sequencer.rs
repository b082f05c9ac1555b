//! 16-step sequencer driven by the audio sample clock.
//!
//! The [`Sequencer`] lives on the audio thread and is advanced once per
//! rendered block, so tick timing depends only on how many samples have been
//! produced, never on UI scheduling. The [`Pattern`] and [`TransportStatus`]
//! are shared with the control path through atomics: edits to the pattern
//! apply to the very next tick, and the control path can read the current
//! step without locking.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU8, AtomicU32, AtomicU64, Ordering};

use rand::Rng;
use serde::Serialize;

pub const STEPS: usize = 16;
/// Step index reported while the sequencer is stopped.
pub const STOPPED_STEP: i32 = -1;
pub const TEMPO_MIN: f64 = 60.0;
pub const TEMPO_MAX: f64 = 200.0;
pub const DEFAULT_TEMPO: f64 = 136.0;
pub const DEFAULT_VELOCITY: f32 = 0.8;
/// Chance that [`Pattern::randomize`] turns a step on.
pub const RANDOM_DENSITY: f64 = 0.3;
/// Lowest velocity [`Pattern::randomize`] assigns; the highest is 1.0.
pub const RANDOM_VELOCITY_MIN: f32 = 0.5;

// ── Pattern ─────────────────────────────────────────────────

/// Step on/off flags and per-step velocities.
#[derive(Debug)]
pub struct Pattern {
    steps: [AtomicBool; STEPS],
    velocities: [AtomicU32; STEPS],
}

impl Default for Pattern {
    /// Four on the floor: steps 0, 4, 8 and 12.
    fn default() -> Self {
        let pattern = Pattern::empty();
        for step in (0..STEPS).step_by(4) {
            pattern.set_step(step, true);
        }
        pattern
    }
}

impl Pattern {
    /// All steps off, every velocity at the default.
    pub fn empty() -> Self {
        Pattern {
            steps: Default::default(),
            velocities: std::array::from_fn(|_| AtomicU32::new(DEFAULT_VELOCITY.to_bits())),
        }
    }

    pub fn is_active(&self, step: usize) -> bool {
        self.steps
            .get(step)
            .is_some_and(|s| s.load(Ordering::Relaxed))
    }

    pub fn velocity(&self, step: usize) -> f32 {
        self.velocities
            .get(step)
            .map_or(0.0, |v| f32::from_bits(v.load(Ordering::Relaxed)))
    }

    /// Set a step on or off. Out-of-range steps are ignored.
    pub fn set_step(&self, step: usize, active: bool) {
        if let Some(s) = self.steps.get(step) {
            s.store(active, Ordering::Relaxed);
        }
    }

    /// Flip a step; returns its new state.
    pub fn toggle(&self, step: usize) -> bool {
        match self.steps.get(step) {
            Some(s) => !s.fetch_xor(true, Ordering::Relaxed),
            None => false,
        }
    }

    /// Velocity is clamped to 0–1.
    pub fn set_velocity(&self, step: usize, velocity: f32) {
        if let Some(v) = self.velocities.get(step) {
            let velocity = if velocity.is_nan() { 0.0 } else { velocity.clamp(0.0, 1.0) };
            v.store(velocity.to_bits(), Ordering::Relaxed);
        }
    }

    /// Turn every step off and restore default velocities.
    pub fn clear(&self) {
        for step in 0..STEPS {
            self.set_step(step, false);
            self.set_velocity(step, DEFAULT_VELOCITY);
        }
    }

    /// Replace every step with a random one: on with probability
    /// [`RANDOM_DENSITY`], velocity in `[RANDOM_VELOCITY_MIN, 1.0)`.
    pub fn randomize(&self, rng: &mut impl Rng) {
        for step in 0..STEPS {
            self.set_step(step, rng.random_bool(RANDOM_DENSITY));
            self.set_velocity(step, rng.random_range(RANDOM_VELOCITY_MIN..1.0));
        }
    }

    pub fn active_count(&self) -> usize {
        (0..STEPS).filter(|&s| self.is_active(s)).count()
    }
}

// ── Transport status ────────────────────────────────────────

/// Snapshot of the sequencer as seen from the control path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SequencerState {
    pub running: bool,
    /// Last step fired, `0` right after start, [`STOPPED_STEP`] when stopped.
    pub step: i32,
    pub tempo: f64,
    pub swing: u8,
    /// Incremented on every start; identifies the current scheduling run.
    pub run: u64,
}

/// Audio-thread-written, control-thread-read transport state.
#[derive(Debug)]
pub struct TransportStatus {
    running: AtomicBool,
    step: AtomicI32,
    tempo: AtomicU64,
    swing: AtomicU8,
    run: AtomicU64,
}

impl TransportStatus {
    fn new(tempo: f64) -> Self {
        TransportStatus {
            running: AtomicBool::new(false),
            step: AtomicI32::new(STOPPED_STEP),
            tempo: AtomicU64::new(tempo.to_bits()),
            swing: AtomicU8::new(0),
            run: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> SequencerState {
        SequencerState {
            running: self.running.load(Ordering::Acquire),
            step: self.step.load(Ordering::Acquire),
            tempo: f64::from_bits(self.tempo.load(Ordering::Relaxed)),
            swing: self.swing.load(Ordering::Relaxed),
            run: self.run.load(Ordering::Relaxed),
        }
    }
}

// ── Scheduler ───────────────────────────────────────────────

/// One scheduled step, positioned inside the block being rendered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// Frame offset within the current block.
    pub offset: usize,
    pub step: usize,
    pub active: bool,
    pub velocity: f32,
    /// Seconds since the sequencer was started.
    pub time_secs: f64,
}

/// Informational step report for displays. Has no effect on audio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepEvent {
    pub step: u8,
    pub active: bool,
    pub time_secs: f64,
}

impl From<Tick> for StepEvent {
    fn from(tick: Tick) -> Self {
        StepEvent {
            step: tick.step as u8,
            active: tick.active,
            time_secs: tick.time_secs,
        }
    }
}

#[derive(Debug)]
pub struct Sequencer {
    pattern: Arc<Pattern>,
    status: Arc<TransportStatus>,
    sample_rate: f64,
    tempo: f64,
    swing: u8,
    running: bool,
    next_step: usize,
    /// Samples elapsed since start.
    clock: u64,
    /// Fractional sample position of the next tick, relative to start.
    next_tick_at: f64,
    run: u64,
}

impl Sequencer {
    pub fn new(pattern: Arc<Pattern>, sample_rate: f64, tempo: f64) -> Self {
        let tempo = clamp_tempo(tempo);
        Sequencer {
            pattern,
            status: Arc::new(TransportStatus::new(tempo)),
            sample_rate: sample_rate.max(1.0),
            tempo,
            swing: 0,
            running: false,
            next_step: 0,
            clock: 0,
            next_tick_at: 0.0,
            run: 0,
        }
    }

    pub fn pattern(&self) -> &Arc<Pattern> {
        &self.pattern
    }

    pub fn status(&self) -> Arc<TransportStatus> {
        Arc::clone(&self.status)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    pub fn swing(&self) -> u8 {
        self.swing
    }

    /// Samples between sixteenth-note steps at the current tempo.
    pub fn step_interval(&self) -> f64 {
        self.sample_rate * 60.0 / self.tempo / 4.0
    }

    /// Begin a fresh run from step 0. A run already in progress is
    /// discarded, never resumed.
    pub fn start(&mut self) {
        self.running = true;
        self.next_step = 0;
        self.clock = 0;
        self.next_tick_at = 0.0;
        self.run += 1;
        self.status.run.store(self.run, Ordering::Relaxed);
        self.status.step.store(0, Ordering::Release);
        self.status.running.store(true, Ordering::Release);
    }

    /// Halt scheduling. Stopping a stopped sequencer does nothing.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.status.step.store(STOPPED_STEP, Ordering::Release);
        self.status.running.store(false, Ordering::Release);
    }

    /// Clamped to 60–200 BPM; takes effect from the next tick.
    pub fn set_tempo(&mut self, bpm: f64) {
        self.tempo = clamp_tempo(bpm);
        self.status.tempo.store(self.tempo.to_bits(), Ordering::Relaxed);
    }

    /// Swing amount (0–100). Stored and reported; tick timing ignores it.
    pub fn set_swing(&mut self, swing: u8) {
        self.swing = swing.min(100);
        self.status.swing.store(self.swing, Ordering::Relaxed);
    }

    /// Move the clock forward by `frames`, calling `on_tick` for every step
    /// that falls inside this block, in order.
    pub fn advance(&mut self, frames: usize, mut on_tick: impl FnMut(Tick)) {
        if !self.running {
            return;
        }
        let block_start = self.clock;
        let block_end = block_start + frames as u64;

        loop {
            let at = self.next_tick_at.ceil() as u64;
            if at >= block_end {
                break;
            }
            let step = self.next_step;
            on_tick(Tick {
                offset: at.saturating_sub(block_start) as usize,
                step,
                active: self.pattern.is_active(step),
                velocity: self.pattern.velocity(step),
                time_secs: at as f64 / self.sample_rate,
            });
            self.status.step.store(step as i32, Ordering::Release);
            self.next_step = (step + 1) % STEPS;
            self.next_tick_at += self.step_interval();
        }

        self.clock = block_end;
    }
}

fn clamp_tempo(bpm: f64) -> f64 {
    if bpm.is_nan() {
        return DEFAULT_TEMPO;
    }
    bpm.clamp(TEMPO_MIN, TEMPO_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn collect(seq: &mut Sequencer, total: usize, block: usize) -> Vec<(usize, Tick)> {
        let mut ticks = Vec::new();
        let mut pos = 0;
        while pos < total {
            let n = block.min(total - pos);
            seq.advance(n, |t| ticks.push((pos + t.offset, t)));
            pos += n;
        }
        ticks
    }

    #[test]
    fn default_pattern_is_four_on_the_floor() {
        let p = Pattern::default();
        assert_eq!(p.active_count(), 4);
        for step in [0, 4, 8, 12] {
            assert!(p.is_active(step));
        }
        assert!(!p.is_active(1));
        assert_eq!(p.velocity(3), DEFAULT_VELOCITY);
    }

    #[test]
    fn pattern_edits() {
        let p = Pattern::empty();
        assert!(p.toggle(5));
        assert!(!p.toggle(5));
        p.set_velocity(2, 4.0);
        assert_eq!(p.velocity(2), 1.0);
        p.set_velocity(2, -1.0);
        assert_eq!(p.velocity(2), 0.0);
        p.set_step(99, true);
        assert_eq!(p.active_count(), 0);

        p.set_step(1, true);
        p.set_velocity(1, 0.3);
        p.clear();
        assert_eq!(p.active_count(), 0);
        assert_eq!(p.velocity(1), DEFAULT_VELOCITY);
    }

    #[test]
    fn randomize_density_and_velocity_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let p = Pattern::default();
        let mut active = 0;
        for _ in 0..1000 {
            p.randomize(&mut rng);
            active += p.active_count();
            for step in 0..STEPS {
                let v = p.velocity(step);
                assert!((RANDOM_VELOCITY_MIN..1.0).contains(&v), "velocity {v}");
            }
        }
        let density = active as f64 / (1000 * STEPS) as f64;
        assert!((density - RANDOM_DENSITY).abs() < 0.03, "density {density}");
    }

    #[test]
    fn randomized_pattern_reaches_running_sequencer() {
        let pattern = Arc::new(Pattern::empty());
        let mut seq = Sequencer::new(Arc::clone(&pattern), 44100.0, 120.0);
        seq.start();
        collect(&mut seq, 100, 100);

        let mut rng = StdRng::seed_from_u64(42);
        pattern.randomize(&mut rng);
        // rest of the bar: steps 1..=15
        let ticks = collect(&mut seq, 88100, 512);
        assert_eq!(ticks.len(), 15);
        for (_, tick) in &ticks {
            assert_eq!(tick.active, pattern.is_active(tick.step));
            assert_eq!(tick.velocity, pattern.velocity(tick.step));
        }
    }

    #[test]
    fn one_bar_at_120_bpm_has_sixteen_steps_and_one_trigger() {
        let pattern = Arc::new(Pattern::empty());
        pattern.set_step(0, true);
        let mut seq = Sequencer::new(pattern, 44100.0, 120.0);
        seq.start();

        // 16 steps x 125 ms = 2 s
        let ticks = collect(&mut seq, 88200, 512);
        assert_eq!(ticks.len(), 16);
        let triggers: Vec<_> = ticks.iter().filter(|(_, t)| t.active).collect();
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].1.step, 0);
        assert_eq!(triggers[0].0, 0);

        for (i, (at, tick)) in ticks.iter().enumerate() {
            assert_eq!(tick.step, i);
            let expected = (i as f64 * 5512.5).ceil() as usize;
            assert_eq!(*at, expected);
            assert!((tick.time_secs - i as f64 * 0.125).abs() < 1e-4);
        }
    }

    #[test]
    fn block_size_does_not_change_timing() {
        let run = |block| {
            let mut seq = Sequencer::new(Arc::new(Pattern::default()), 48000.0, 137.0);
            seq.start();
            collect(&mut seq, 200_000, block)
                .into_iter()
                .map(|(at, t)| (at, t.step))
                .collect::<Vec<_>>()
        };
        let reference = run(64);
        assert_eq!(run(1), reference);
        assert_eq!(run(1000), reference);
        assert_eq!(run(4096), reference);
    }

    #[test]
    fn stopped_sequencer_never_ticks() {
        let mut seq = Sequencer::new(Arc::new(Pattern::default()), 44100.0, 120.0);
        let ticks = collect(&mut seq, 44100, 256);
        assert!(ticks.is_empty());
        assert_eq!(seq.status().snapshot().step, STOPPED_STEP);
    }

    #[test]
    fn start_then_stop_before_a_tick_reports_sentinel() {
        let mut seq = Sequencer::new(Arc::new(Pattern::default()), 44100.0, 120.0);
        seq.start();
        assert_eq!(seq.status().snapshot().step, 0);
        seq.stop();
        let ticks = collect(&mut seq, 44100, 256);
        assert!(ticks.is_empty());
        let state = seq.status().snapshot();
        assert_eq!(state.step, STOPPED_STEP);
        assert!(!state.running);
    }

    #[test]
    fn stop_is_idempotent() {
        let mut seq = Sequencer::new(Arc::new(Pattern::default()), 44100.0, 120.0);
        seq.stop();
        seq.stop();
        assert!(!seq.is_running());
        seq.start();
        seq.stop();
        seq.stop();
        assert_eq!(seq.status().snapshot().step, STOPPED_STEP);
    }

    #[test]
    fn restart_begins_a_new_run_at_step_zero() {
        let mut seq = Sequencer::new(Arc::new(Pattern::default()), 44100.0, 120.0);
        seq.start();
        collect(&mut seq, 20_000, 512);
        assert_eq!(seq.status().snapshot().step, 3);

        seq.start();
        let state = seq.status().snapshot();
        assert_eq!(state.run, 2);
        assert_eq!(state.step, 0);
        let ticks = collect(&mut seq, 100, 100);
        assert_eq!(ticks[0].1.step, 0);
        assert_eq!(ticks[0].0, 0);
    }

    #[test]
    fn pattern_edits_apply_to_running_sequencer() {
        let pattern = Arc::new(Pattern::empty());
        let mut seq = Sequencer::new(Arc::clone(&pattern), 44100.0, 120.0);
        seq.start();
        collect(&mut seq, 5000, 500);

        pattern.set_step(1, true);
        pattern.set_velocity(1, 0.25);
        let ticks = collect(&mut seq, 1000, 500);
        assert_eq!(ticks.len(), 1);
        assert!(ticks[0].1.active);
        assert_eq!(ticks[0].1.velocity, 0.25);
    }

    #[test]
    fn tempo_is_clamped_and_swing_is_inert() {
        let mut seq = Sequencer::new(Arc::new(Pattern::default()), 44100.0, 500.0);
        assert_eq!(seq.tempo(), TEMPO_MAX);
        seq.set_tempo(10.0);
        assert_eq!(seq.tempo(), TEMPO_MIN);
        seq.set_tempo(120.0);

        let straight = {
            seq.start();
            collect(&mut seq, 44100, 512)
        };
        seq.set_swing(75);
        assert_eq!(seq.status().snapshot().swing, 75);
        seq.start();
        let swung = collect(&mut seq, 44100, 512);
        assert_eq!(straight, swung);
    }
}
