//! Host services (C12).
//!
//! The core consumes platform facilities through a single trait rather
//! than calling the standard library directly, so that a second
//! (kernel-resident, no_std-flavored) realization can be dropped in
//! without touching C1–C11. Only the hosted realization is provided here;
//! a kernel realization would supply a static arena allocator, a
//! platform clock, and a platform mutex in place of [`StdHost`]'s use of
//! the global allocator, [`std::time::Instant`], and `parking_lot`.

use std::time::Instant;

/// Platform facilities the adaptive core consumes.
///
/// Allocation and free are not modeled as trait methods: in a hosted Rust
/// crate these are the global allocator's job, and the core never
/// allocates on a hot path (spec.md §7) — only at initialization and at
/// lazy transition-block allocation, both ordinary `Vec`/`Box` use. What
/// *does* vary by host is the clock, console output, and whether XT
/// (code-pointer) validation is meaningful at all.
pub trait HostServices: Send + Sync {
    /// Monotonic nanosecond clock. Must never go backwards within a
    /// process lifetime.
    fn monotonic_ns(&self) -> u64;

    /// Writes a line to the host console (diagnostics, CLI banners).
    fn console_write(&self, line: &str);

    /// True when running under deterministic parity testing: the clock
    /// may be driven manually rather than sampling real time.
    fn is_parity_mode(&self) -> bool {
        false
    }

    /// Validates that `addr` refers to an executable region. In a hosted
    /// Rust build, word behavior is always a safe Rust closure/fn
    /// pointer, so this is vacuously true; a kernel host with an
    /// executable/non-executable memory split would check a real page
    /// table here.
    fn xt_is_executable(&self, _addr: usize) -> bool {
        true
    }

    /// Invoked for invariant violations that cannot be continued past
    /// (spec.md §7/§9: "host panic hook ... reserved for invariant
    /// violations impossible to continue past"). The hosted realization
    /// panics; a kernel realization would halt or reset.
    fn panic(&self, message: &str) -> ! {
        panic!("steadystate: unrecoverable host invariant violation: {message}");
    }
}

/// Standard-library-backed host: wall-clock monotonic time via
/// [`Instant`], console via stdout.
#[derive(Debug, Default)]
pub struct StdHost;

impl HostServices for StdHost {
    fn monotonic_ns(&self) -> u64 {
        static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
        let start = START.get_or_init(Instant::now);
        start.elapsed().as_nanos() as u64
    }

    fn console_write(&self, line: &str) {
        println!("{line}");
    }
}

/// Deterministic host for parity/unit tests: the clock advances only
/// when [`ParityHost::advance`] is called, never from wall time.
#[derive(Debug)]
pub struct ParityHost {
    now_ns: parking_lot::Mutex<u64>,
}

impl Default for ParityHost {
    fn default() -> Self {
        ParityHost {
            now_ns: parking_lot::Mutex::new(0),
        }
    }
}

impl ParityHost {
    /// Creates a parity host starting at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the deterministic clock by `delta_ns`.
    pub fn advance(&self, delta_ns: u64) {
        let mut now = self.now_ns.lock();
        *now += delta_ns;
    }
}

impl HostServices for ParityHost {
    fn monotonic_ns(&self) -> u64 {
        *self.now_ns.lock()
    }

    fn console_write(&self, _line: &str) {
        // Parity mode is used in tests; swallow console output.
    }

    fn is_parity_mode(&self) -> bool {
        true
    }
}
