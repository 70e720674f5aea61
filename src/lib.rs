//! # steadystate - Adaptive Execution-Physics Core
//!
//! An adaptive execution-physics core for a stack-based VM runtime: it
//! tracks per-word "heat" and "temperature" as entries execute, decays
//! them over time, predicts likely successors from observed transitions,
//! keeps a small hot-word cache warm, and continuously retunes its own
//! window size and decay rate from the trajectory it has seen so far.
//! Everything about parsing, dispatching, and running the hosted
//! language is left to an external collaborator (`interpreter.rs`,
//! `capsule.rs`, and ultimately whatever embeds this crate) — this
//! crate only ever sees a word ID and decides how hot it is.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use steadystate::{Behavior, PhysicsConfig, StdHost, Vm};
//!
//! fn noop(_: &mut steadystate::interpreter::Interpreter) -> steadystate::Result<()> {
//!     Ok(())
//! }
//!
//! let vm = Vm::new(Arc::new(StdHost), PhysicsConfig::default());
//! let dup = vm.create_word(b"DUP".to_vec(), Behavior::Native(noop)).unwrap();
//!
//! assert_eq!(vm.find_word(b"DUP"), Some(dup));
//! vm.pre_execute(dup, None);
//! vm.post_execute(dup);
//! ```
//!
//! ## Architecture
//!
//! - **Fixed-point core** (`fixed_point`): Q48.16 arithmetic every other
//!   module builds on, so the physics stay deterministic across hosts.
//! - **Dictionary** (`dictionary`): word IDs, entries, the per-entry
//!   physics and transition metadata blocks, the ID registry, and the
//!   first-byte bucket index.
//! - **Tuning state** (`rolling_window`, `transitions`, `hotwords`,
//!   `inference`, `mode_selector`): the rolling execution-trajectory
//!   window, per-entry transition prediction, the hot-word cache, the
//!   inference engine that retunes window size and decay slope, and the
//!   mode selector that gates which of the above are even active.
//! - **Scheduling** (`heartbeat`): periodic tick bookkeeping, background
//!   decay batching, and the adaptive heartrate control loop, driven
//!   either by a background worker thread or inline from `post_execute`.
//! - **Composition** (`hooks`, `vm`): the free functions that sequence
//!   the above correctly around a word dispatch or name lookup, and the
//!   `Vm` aggregate that owns all of it behind the lock order spec.md §5
//!   requires.
//! - **Observability** (`metrics`): the long-form and reduced CSV export
//!   rows a harness uses to study the core's own behavior.
//! - **Host boundary** (`host`): the trait that isolates this crate from
//!   a specific clock/console/allocator realization.

pub mod capsule;
pub mod cli;
pub mod config;
pub mod dictionary;
pub mod error;
pub mod fixed_point;
pub mod heartbeat;
pub mod host;
pub mod hooks;
pub mod hotwords;
pub mod inference;
pub mod interpreter;
pub mod logging;
pub mod metrics;
pub mod mode_selector;
pub mod rolling_window;
pub mod transitions;
pub mod vm;

pub use crate::config::PhysicsConfig;
pub use crate::dictionary::{Behavior, DictEntry, WordId};
pub use crate::error::{PhysicsError, Result};
pub use crate::host::{HostServices, ParityHost, StdHost};
pub use crate::interpreter::Interpreter;
pub use crate::vm::Vm;
