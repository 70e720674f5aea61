//! Jacquard mode selector (C9): a 16-mode state machine with hysteresis.

use crate::fixed_point::Q48_16;

const L2_BIT: u8 = 1 << 0;
const L3_BIT: u8 = 1 << 1;
const L5_BIT: u8 = 1 << 2;
const L6_BIT: u8 = 1 << 3;

/// Which of the four selector-gated control loops are active for a
/// given mode. L1 (heat) and L4 (pipelining) are always on and are not
/// selector-gated; L7 (adaptive heartrate) is unconditionally on and
/// lives entirely in the heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeConfig {
    /// L2: rolling-window recording active.
    pub rolling_window_active: bool,
    /// L3: linear heat decay active.
    pub linear_decay_active: bool,
    /// L5: window-width inference active.
    pub window_inference_active: bool,
    /// L6: decay-slope inference active.
    pub decay_inference_active: bool,
}

/// Summary inputs the mode selector classifies on each tick.
#[derive(Debug, Clone, Copy)]
pub struct ModeInputs {
    /// `effective_window_size / ROLLING_WINDOW_SIZE`, clamped to [0, 1].
    pub entropy_q48: Q48_16,
    /// `1 - prefetch_hits/prefetch_attempts` (0.5 when no attempts yet).
    pub cv_q48: Q48_16,
    /// `min(1, 1/slope)`.
    pub temporal_decay_q48: Q48_16,
}

/// The mode-selector's persistent state.
#[derive(Debug, Clone, Copy)]
pub struct ModeSelector {
    current_mode: u8,
    pending_mode: u8,
    hysteresis_counter: u32,
    hysteresis_ticks: u32,
    entropy_high_q48: Q48_16,
    cv_high_q48: Q48_16,
    temporal_decay_high_q48: Q48_16,
    temporal_decay_low_q48: Q48_16,
}

impl ModeSelector {
    /// Builds a mode selector starting in mode C0 (all loops off).
    pub fn new(config: &crate::config::PhysicsConfig) -> Self {
        ModeSelector {
            current_mode: 0,
            pending_mode: 0,
            hysteresis_counter: 0,
            hysteresis_ticks: config.ssm_hysteresis_ticks,
            entropy_high_q48: config.ssm_entropy_high_threshold_q48,
            cv_high_q48: config.ssm_cv_high_threshold_q48,
            temporal_decay_high_q48: config.ssm_temporal_decay_threshold_q48,
            temporal_decay_low_q48: config.ssm_temporal_decay_low_threshold_q48,
        }
    }

    fn classify(&self, inputs: ModeInputs) -> u8 {
        let l2 = inputs.entropy_q48 >= self.entropy_high_q48;
        let l3 = inputs.temporal_decay_q48 >= self.temporal_decay_high_q48;
        let l5 = inputs.cv_q48 >= self.cv_high_q48;
        let l6 = inputs.cv_q48 >= self.cv_high_q48 && inputs.temporal_decay_q48 >= self.temporal_decay_low_q48;

        (l2 as u8 * L2_BIT) | (l3 as u8 * L3_BIT) | (l5 as u8 * L5_BIT) | (l6 as u8 * L6_BIT)
    }

    /// Runs one tick of classification + hysteresis. Returns the
    /// resulting (possibly unchanged) current mode.
    pub fn update(&mut self, inputs: ModeInputs) -> u8 {
        let target = self.classify(inputs);
        if target == self.pending_mode {
            self.hysteresis_counter += 1;
        } else {
            self.pending_mode = target;
            self.hysteresis_counter = 1;
        }
        if self.hysteresis_counter >= self.hysteresis_ticks {
            self.current_mode = self.pending_mode;
            self.hysteresis_counter = 0;
        }
        self.current_mode
    }

    /// The committed current mode.
    pub fn current_mode(&self) -> u8 {
        self.current_mode
    }

    /// Derives the loop-enable booleans from a mode value. Idempotent:
    /// calling this repeatedly with the same mode always yields the same
    /// result (spec.md §8).
    pub fn apply_mode(mode: u8) -> ModeConfig {
        ModeConfig {
            rolling_window_active: mode & L2_BIT != 0,
            linear_decay_active: mode & L3_BIT != 0,
            window_inference_active: mode & L5_BIT != 0,
            decay_inference_active: mode & L6_BIT != 0,
        }
    }

    /// Human-readable mode name, `"C0"`..`"C15"`.
    pub fn mode_name(mode: u8) -> String {
        format!("C{}", mode & 0x0F)
    }
}
