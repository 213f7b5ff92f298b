//! Misbehavior scoring with a decaying component.

use std::sync::Mutex;
use std::time::{Duration, Instant};

const DEFAULT_HALF_LIFE: Duration = Duration::from_secs(60);

struct ScoreState {
    persistent: u64,
    transient: f64,
    last_update: Instant,
}

/// A ban score with a persistent part that never decays and a transient
/// part that halves every half-life. The reported value is their sum at
/// read time.
pub struct DynamicBanScore {
    state: Mutex<ScoreState>,
    half_life: Duration,
}

impl Default for DynamicBanScore {
    fn default() -> Self {
        Self::new()
    }
}

impl DynamicBanScore {
    pub fn new() -> Self {
        Self::with_half_life(DEFAULT_HALF_LIFE)
    }

    pub fn with_half_life(half_life: Duration) -> Self {
        Self {
            state: Mutex::new(ScoreState {
                persistent: 0,
                transient: 0.0,
                last_update: Instant::now(),
            }),
            half_life,
        }
    }

    pub fn increase(&self, persistent: u64, transient: u64) -> u64 {
        let mut state = self.state.lock().expect("ban score lock");
        let now = Instant::now();
        state.transient = self.decayed(state.transient, state.last_update, now);
        state.transient += transient as f64;
        state.persistent = state.persistent.saturating_add(persistent);
        state.last_update = now;
        state.persistent.saturating_add(state.transient as u64)
    }

    pub fn score(&self) -> u64 {
        let state = self.state.lock().expect("ban score lock");
        let transient = self.decayed(state.transient, state.last_update, Instant::now());
        state.persistent.saturating_add(transient as u64)
    }

    pub fn reset(&self) {
        let mut state = self.state.lock().expect("ban score lock");
        state.persistent = 0;
        state.transient = 0.0;
        state.last_update = Instant::now();
    }

    fn decayed(&self, transient: f64, last_update: Instant, now: Instant) -> f64 {
        if transient <= 0.0 {
            return 0.0;
        }
        let elapsed = now.saturating_duration_since(last_update);
        let half_lives = elapsed.as_secs_f64() / self.half_life.as_secs_f64();
        transient * 0.5_f64.powf(half_lives)
    }
}
