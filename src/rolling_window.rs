//! Rolling window of recent word IDs, with a double-buffered snapshot
//! (C3).
//!
//! The writer (interpreter thread, holding `tuning_lock`) records into a
//! live circular buffer. A background reader (the heartbeat, or the
//! inference engine) wants a consistent view without taking the
//! writer's lock; `publish_snapshot` copies the live buffer into the
//! currently-inactive shadow, then release-stores a 1-bit index. Readers
//! acquire-load that index and read the *other* shadow, which is never
//! written to the shadow the writer is about to use next.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::dictionary::WordId;

/// Total executions recorded before the window is considered "warm"
/// (diversity and inference are meaningless below this, per the
/// original implementation).
const WARM_THRESHOLD: u64 = 1024;

/// A read-only, internally-consistent view of the rolling window as of
/// the last `publish_snapshot`.
#[derive(Debug, Clone, Default)]
pub struct RollingWindowSnapshot {
    /// Window contents in chronological (oldest-to-newest) order.
    pub history: Vec<WordId>,
    /// Write position at the time of publication.
    pub position: usize,
    /// Total executions recorded at the time of publication.
    pub total_executions: u64,
    /// Effective window size at the time of publication.
    pub effective_window_size: usize,
    /// Whether the window was warm at the time of publication.
    pub warm: bool,
}

#[derive(Debug, Default, Clone)]
struct Shadow {
    history: Vec<WordId>,
    position: usize,
    total_executions: u64,
    effective_window_size: usize,
    warm: bool,
}

/// Fixed-size circular buffer of recently executed word IDs with a
/// lock-free double-buffered snapshot.
#[derive(Debug)]
pub struct RollingWindow {
    buffer: Vec<Option<WordId>>,
    write_pos: usize,
    total_executions: u64,
    warm: bool,
    effective_window_size: usize,
    snapshot_pending: bool,
    adaptive_pending: bool,
    adaptive_counter: u64,
    last_diversity: u64,

    shadows: [Shadow; 2],
    active_shadow: AtomicUsize,

    min_window_size: usize,
    shrink_rate_percent: u64,
    growth_threshold_percent: u64,
    check_frequency: u64,
}

impl RollingWindow {
    /// Builds an empty rolling window of the given (power-of-two)
    /// capacity.
    pub fn new(config: &crate::config::PhysicsConfig) -> Self {
        let capacity = config.rolling_window_size;
        RollingWindow {
            buffer: vec![None; capacity],
            write_pos: 0,
            total_executions: 0,
            warm: false,
            effective_window_size: config.adaptive_min_window_size.min(capacity),
            snapshot_pending: false,
            adaptive_pending: false,
            adaptive_counter: 0,
            last_diversity: 0,
            shadows: [Shadow::default(), Shadow::default()],
            active_shadow: AtomicUsize::new(0),
            min_window_size: config.adaptive_min_window_size,
            shrink_rate_percent: config.adaptive_shrink_rate,
            growth_threshold_percent: config.adaptive_growth_threshold,
            check_frequency: config.adaptive_check_frequency,
        }
    }

    /// Records one executed word ID. Caller holds `tuning_lock`.
    pub fn record_execution(&mut self, word_id: WordId) {
        let cap = self.buffer.len();
        self.buffer[self.write_pos] = Some(word_id);
        self.write_pos = (self.write_pos + 1) % cap;
        self.total_executions += 1;
        if self.total_executions >= WARM_THRESHOLD {
            self.warm = true;
        }
        self.snapshot_pending = true;

        self.adaptive_counter += 1;
        if self.adaptive_counter >= self.check_frequency {
            self.adaptive_pending = true;
            self.adaptive_counter = 0;
        }
    }

    /// Pre-populates the window with a known sequence at startup, to
    /// shortcut cold start for a background worker that otherwise would
    /// only discover patterns after real traffic arrives. Supplemental
    /// to the base spec; grounded in the original
    /// `rolling_window_seed_pipelining_context`.
    pub fn seed_pipelining_context(&mut self, ids: &[WordId]) {
        for &id in ids {
            self.record_execution(id);
        }
    }

    /// Linearizes the live circular buffer into chronological order.
    fn linearize(&self) -> Vec<WordId> {
        let cap = self.buffer.len();
        let count = self.total_executions.min(cap as u64) as usize;
        let start = if (self.total_executions as usize) < cap {
            0
        } else {
            self.write_pos
        };
        (0..count)
            .filter_map(|i| self.buffer[(start + i) % cap])
            .collect()
    }

    /// Copies the live buffer into the currently-inactive shadow, then
    /// release-stores the flipped index — the canonical double-buffer
    /// publication pattern. No-op if nothing changed since the last
    /// publish.
    pub fn publish_snapshot(&mut self) {
        if !self.snapshot_pending {
            return;
        }
        let current = self.active_shadow.load(Ordering::Relaxed);
        let back = 1 - current;
        self.shadows[back] = Shadow {
            history: self.linearize(),
            position: self.write_pos,
            total_executions: self.total_executions,
            effective_window_size: self.effective_window_size,
            warm: self.warm,
        };
        self.active_shadow.store(back, Ordering::Release);
        self.snapshot_pending = false;
    }

    /// Acquire-loads the published index and reads that shadow. Always
    /// lock-free; never blocks on the writer.
    pub fn read_snapshot(&self) -> RollingWindowSnapshot {
        let idx = self.active_shadow.load(Ordering::Acquire);
        let shadow = &self.shadows[idx];
        RollingWindowSnapshot {
            history: shadow.history.clone(),
            position: shadow.position,
            total_executions: shadow.total_executions,
            effective_window_size: shadow.effective_window_size,
            warm: shadow.warm,
        }
    }

    /// Whether an adaptive shrink/grow check is due.
    pub fn adaptive_pending(&self) -> bool {
        self.adaptive_pending
    }

    /// Pattern-diversity measure over a snapshot: the percentage of
    /// adjacent pairs within the last `effective_window_size` entries
    /// where `a != b`. Zero while cold, per spec.md §8's boundary case.
    pub fn pattern_diversity(snapshot: &RollingWindowSnapshot) -> u64 {
        if !snapshot.warm {
            return 0;
        }
        let window = tail(&snapshot.history, snapshot.effective_window_size);
        if window.len() < 2 {
            return 0;
        }
        let transitions = window.len() - 1;
        let distinct = window.windows(2).filter(|pair| pair[0] != pair[1]).count();
        (distinct as u64 * 100) / transitions as u64
    }

    /// Supplemental pattern-capture-rate: the percentage of *distinct*
    /// word IDs (not distinct adjacent transitions) within the scan
    /// window. Grounded in `rolling_window_pattern_capture_rate`;
    /// reported alongside diversity in diagnostics, not consumed by any
    /// control loop.
    pub fn pattern_capture_rate(snapshot: &RollingWindowSnapshot) -> u64 {
        if !snapshot.warm {
            return 0;
        }
        let window = tail(&snapshot.history, snapshot.effective_window_size);
        if window.is_empty() {
            return 0;
        }
        let distinct: std::collections::HashSet<WordId> = window.iter().copied().collect();
        (distinct.len() as u64 * 100) / window.len() as u64
    }

    /// Adaptive shrink/grow pass, driven by the heartbeat when
    /// [`Self::adaptive_pending`] is set. Compares current diversity
    /// against the last baseline; shrinks when the window is not
    /// growing by at least `growth_threshold_percent`, grows when it is,
    /// holds when the baseline is zero (nothing to compare against yet).
    pub fn run_adaptive_pass(&mut self) {
        self.adaptive_pending = false;
        let snapshot = self.read_snapshot();
        let current = Self::pattern_diversity(&snapshot);

        if self.last_diversity != 0 {
            let growth = current as i64 - self.last_diversity as i64;
            let growth_ratio_q48 =
                (growth << 16) / self.last_diversity as i64; // signed Q48.16-scaled ratio
            let threshold_q48 = ((self.growth_threshold_percent as i64) << 16) / 100;

            if growth_ratio_q48 < threshold_q48 {
                let shrunk = (self.effective_window_size as u64 * self.shrink_rate_percent) / 100;
                self.effective_window_size = (shrunk as usize).max(self.min_window_size);
            } else {
                let grown = (self.effective_window_size as u64 * 100) / self.shrink_rate_percent.max(1);
                self.effective_window_size = (grown as usize).min(self.buffer.len());
            }
        }
        self.last_diversity = current;
    }

    /// Current effective window size.
    pub fn effective_window_size(&self) -> usize {
        self.effective_window_size
    }

    /// Buffer capacity (`ROLLING_WINDOW_SIZE`).
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Total executions recorded (live, not the published snapshot's
    /// count).
    pub fn total_executions(&self) -> u64 {
        self.total_executions
    }

    /// Whether the live window has crossed the warm threshold.
    pub fn is_warm(&self) -> bool {
        self.warm
    }
}

fn tail(history: &[WordId], n: usize) -> &[WordId] {
    let len = history.len();
    let n = n.min(len);
    &history[len - n..]
}
