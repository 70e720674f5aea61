//! Heartbeat (C8): periodic background driver, decay cursor, snapshot
//! publication, and the L7 adaptive heartrate.
//!
//! The background-worker thread follows the same shape as the teacher
//! codebase's periodic workers: an `mpsc` channel carrying a tiny
//! message enum, a `recv_timeout` loop that treats both an explicit
//! trigger and a timeout as "do the work now", and a clean shutdown via
//! a sentinel message plus `JoinHandle::join`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::dictionary::WordId;
use crate::fixed_point::Q48_16;

const RECENT_TICKS_CAPACITY: usize = 256;

/// One tick's worth of diagnostic state, double-buffered for lock-free
/// reads and also kept in a bounded ring for short-term history.
#[derive(Debug, Clone, Default)]
pub struct HeartbeatSnapshot {
    /// Tick counter at publication time.
    pub tick_count: u64,
    /// Committed mode-selector value.
    pub current_mode: u8,
    /// Effective rolling-window size at publication time.
    pub effective_window_size: usize,
    /// Rolling-window buffer capacity (for the `K` ratio).
    pub rolling_window_size: usize,
    /// Inference window-variance output.
    pub window_variance_q48: Q48_16,
    /// Inference decay-slope output.
    pub adaptive_decay_slope_q48: Q48_16,
    /// Whether the inference run at this tick early-exited.
    pub early_exited: bool,
    /// Current heartbeat tick target, nanoseconds.
    pub tick_target_ns: u64,
    /// Total inference runs so far.
    pub inference_runs: u64,
    /// Total early exits so far.
    pub early_exit_count: u64,
}

#[derive(Debug, Default)]
struct BucketStats {
    k_ratio_sum_q48: u64,
    k_ratio_sum_sq_q48: u64,
    samples: u64,
    mode_transition_count: u64,
    last_mode: Option<u8>,
    /// Set if the effective window size ever collapses to the
    /// configured minimum — a diagnostic flag, not a control input.
    collapse_flag: bool,
}

/// Heartbeat bookkeeping: tick counters, the decay cursor, the
/// lock-free snapshot double-buffer, and adaptive-heartrate state.
/// Owned by the VM; driven either by a [`HeartbeatWorker`] thread or
/// inline from `post_execute` when threads are unavailable.
#[derive(Debug)]
pub struct HeartbeatState {
    tick_count: u64,
    last_inference_tick: u64,
    nominal_tick_target_ns: u64,
    tick_target_ns: Arc<AtomicU64>,
    inline_check_counter: u64,
    decay_cursor: u32,
    shadows: [HeartbeatSnapshot; 2],
    active_shadow: AtomicUsize,
    recent_ticks: VecDeque<HeartbeatSnapshot>,
    bucket_stats: BucketStats,
    inference_frequency: u64,
    inference_runs: u64,
    early_exit_count: u64,
}

impl HeartbeatState {
    /// Builds a fresh heartbeat state at the configured nominal tick
    /// period.
    pub fn new(config: &crate::config::PhysicsConfig) -> Self {
        HeartbeatState {
            tick_count: 0,
            last_inference_tick: 0,
            nominal_tick_target_ns: config.heartbeat_tick_ns,
            tick_target_ns: Arc::new(AtomicU64::new(config.heartbeat_tick_ns)),
            inline_check_counter: 0,
            decay_cursor: 0,
            shadows: [HeartbeatSnapshot::default(), HeartbeatSnapshot::default()],
            active_shadow: AtomicUsize::new(0),
            recent_ticks: VecDeque::with_capacity(RECENT_TICKS_CAPACITY),
            bucket_stats: BucketStats::default(),
            inference_frequency: config.heartbeat_inference_frequency,
            inference_runs: 0,
            early_exit_count: 0,
        }
    }

    /// Whether `tick_count - last_inference_tick >=
    /// HEARTBEAT_INFERENCE_FREQUENCY`.
    pub fn should_run_inference(&self) -> bool {
        self.tick_count - self.last_inference_tick >= self.inference_frequency
    }

    /// Marks that inference ran at the current tick.
    pub fn mark_inference_run(&mut self, early_exited: bool) {
        self.last_inference_tick = self.tick_count;
        self.inference_runs += 1;
        if early_exited {
            self.early_exit_count += 1;
        }
    }

    /// Returns the next batch of word IDs for background decay,
    /// advancing the cursor and wrapping to zero at `capacity`.
    pub fn next_decay_batch(&mut self, batch_size: usize, capacity: usize) -> Vec<WordId> {
        if capacity == 0 {
            return Vec::new();
        }
        let mut batch = Vec::with_capacity(batch_size);
        for _ in 0..batch_size {
            batch.push(WordId(self.decay_cursor));
            self.decay_cursor = (self.decay_cursor + 1) % capacity as u32;
        }
        batch
    }

    /// Increments the inline fallback counter (driven from
    /// `post_execute`); returns `true` once it reaches the configured
    /// check frequency, resetting it to zero.
    pub fn inline_tick_due(&mut self, check_frequency: u64) -> bool {
        self.inline_check_counter += 1;
        if self.inline_check_counter >= check_frequency {
            self.inline_check_counter = 0;
            true
        } else {
            false
        }
    }

    /// L7 adaptive heartrate: stretches the tick target 1.25x on an
    /// early exit (capped at 4x nominal), shrinks it 0.8x otherwise
    /// (floored at 1/4 nominal).
    pub fn adjust_heartrate(&mut self, early_exited: bool) {
        let current = self.tick_target_ns.load(Ordering::Relaxed);
        let next = if early_exited {
            (current * 5 / 4).min(self.nominal_tick_target_ns * 4)
        } else {
            (current * 4 / 5).max(self.nominal_tick_target_ns / 4)
        };
        self.tick_target_ns.store(next, Ordering::Relaxed);
    }

    /// Current tick target, nanoseconds.
    pub fn tick_target_ns(&self) -> u64 {
        self.tick_target_ns.load(Ordering::Relaxed)
    }

    /// A clonable handle to the tick-target cell, for the background
    /// worker's `recv_timeout` duration.
    pub fn tick_target_handle(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.tick_target_ns)
    }

    /// Finalizes one tick: bumps the counter, updates bucket statistics,
    /// pushes into the recent-ticks ring, and publishes the snapshot via
    /// the release-store double-buffer pattern.
    pub fn record_tick(&mut self, mut snapshot: HeartbeatSnapshot) {
        self.tick_count += 1;
        snapshot.tick_count = self.tick_count;
        snapshot.tick_target_ns = self.tick_target_ns();
        snapshot.inference_runs = self.inference_runs;
        snapshot.early_exit_count = self.early_exit_count;

        let k_ratio_q48 = if snapshot.rolling_window_size > 0 {
            crate::fixed_point::q48_div(
                crate::fixed_point::q48_from_u64(snapshot.effective_window_size as u64),
                crate::fixed_point::q48_from_u64(snapshot.rolling_window_size as u64),
            )
        } else {
            0
        };
        self.bucket_stats.k_ratio_sum_q48 = self.bucket_stats.k_ratio_sum_q48.saturating_add(k_ratio_q48);
        self.bucket_stats.k_ratio_sum_sq_q48 = self
            .bucket_stats
            .k_ratio_sum_sq_q48
            .saturating_add(crate::fixed_point::q48_mul(k_ratio_q48, k_ratio_q48));
        self.bucket_stats.samples += 1;
        if Some(snapshot.current_mode) != self.bucket_stats.last_mode && self.bucket_stats.last_mode.is_some() {
            self.bucket_stats.mode_transition_count += 1;
        }
        self.bucket_stats.last_mode = Some(snapshot.current_mode);
        if snapshot.effective_window_size <= snapshot.rolling_window_size / 16 {
            self.bucket_stats.collapse_flag = true;
        }

        if self.recent_ticks.len() >= RECENT_TICKS_CAPACITY {
            self.recent_ticks.pop_front();
        }
        self.recent_ticks.push_back(snapshot.clone());

        let current = self.active_shadow.load(Ordering::Relaxed);
        let back = 1 - current;
        self.shadows[back] = snapshot;
        self.active_shadow.store(back, Ordering::Release);

        debug!(tick = self.tick_count, mode = self.bucket_stats.last_mode, "heartbeat tick published");
    }

    /// Acquire-loads the published snapshot. Always lock-free.
    pub fn read_snapshot(&self) -> HeartbeatSnapshot {
        let idx = self.active_shadow.load(Ordering::Acquire);
        self.shadows[idx].clone()
    }

    /// Mean K-ratio (`effective_window_size / rolling_window_size`)
    /// across all recorded ticks, for the James Law reduced CSV row.
    pub fn mean_k_ratio_q48(&self) -> Q48_16 {
        if self.bucket_stats.samples == 0 {
            return 0;
        }
        crate::fixed_point::q48_div(
            self.bucket_stats.k_ratio_sum_q48,
            crate::fixed_point::q48_from_u64(self.bucket_stats.samples),
        )
    }

    /// Total mode transitions observed.
    pub fn mode_transition_count(&self) -> u64 {
        self.bucket_stats.mode_transition_count
    }

    /// Whether the effective window has ever collapsed toward the
    /// configured floor.
    pub fn window_collapsed(&self) -> bool {
        self.bucket_stats.collapse_flag
    }

    /// Tick count.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }
}

/// Messages accepted by the heartbeat worker thread.
pub enum HeartbeatMessage {
    /// Run a tick immediately.
    Trigger,
    /// Stop the worker.
    Shutdown,
}

/// A background thread that drives one tick via `on_tick` every
/// `tick_target_ns` (read fresh each iteration, so the adaptive
/// heartrate takes effect without restarting the thread), or immediately
/// on an explicit [`HeartbeatMessage::Trigger`].
pub struct HeartbeatWorker {
    sender: Sender<HeartbeatMessage>,
    handle: Option<thread::JoinHandle<()>>,
}

impl HeartbeatWorker {
    /// Spawns the worker thread.
    pub fn spawn(tick_target_ns: Arc<AtomicU64>, on_tick: impl Fn() + Send + 'static) -> Self {
        let (sender, receiver) = mpsc::channel();
        let handle = thread::spawn(move || loop {
            let wait = Duration::from_nanos(tick_target_ns.load(Ordering::Relaxed).max(1));
            match receiver.recv_timeout(wait) {
                Ok(HeartbeatMessage::Trigger) => on_tick(),
                Ok(HeartbeatMessage::Shutdown) => break,
                Err(mpsc::RecvTimeoutError::Timeout) => on_tick(),
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        });
        HeartbeatWorker {
            sender,
            handle: Some(handle),
        }
    }

    /// Requests an immediate tick without waiting for the timeout.
    pub fn trigger(&self) {
        let _ = self.sender.send(HeartbeatMessage::Trigger);
    }

    /// Signals shutdown and joins the worker thread.
    pub fn shutdown(mut self) {
        let _ = self.sender.send(HeartbeatMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for HeartbeatWorker {
    fn drop(&mut self) {
        let _ = self.sender.send(HeartbeatMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
