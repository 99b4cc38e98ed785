//! heropath - gamified task tracking library
//!
//! Tasks carry a difficulty and an XP reward. Completing one feeds the
//! hero's progress: XP, level, completion streak and skill tree. Both
//! records persist through a small key-value storage layer with versioned
//! migrations, quota management and debounced writes.
//!
//! # Module Organization
//!
//! - `xp`: leveling curve arithmetic
//! - `task`: task validation and the task store
//! - `progress`: hero progress and its store
//! - `backend`: key-value backends (in-memory and file)
//! - `storage`: prefixed JSON storage adapter over a backend
//! - `migration`: per-key schema versioning and migrations
//! - `quota`: usage estimation and stale-key cleanup
//! - `debounce`: per-key write coalescing
//! - `persist`: versioned, debounced persistence of one record
//! - `app`: the application shell wiring both stores to storage
//! - `clock`: wall-clock abstraction used by stores and the debouncer
//! - `events`: domain events and their JSON lines sink
//! - `config`: configuration loading from `heropath.toml`
//! - `lock`: file locking and atomic writes for the store file
//! - `output`: JSON and human output envelopes
//! - `cli`: command-line interface using clap
//! - `error`: error types and result aliases

pub mod app;
pub mod backend;
pub mod cli;
pub mod clock;
pub mod config;
pub mod debounce;
pub mod error;
pub mod events;
pub mod lock;
pub mod migration;
pub mod output;
pub mod persist;
pub mod progress;
pub mod quota;
pub mod storage;
pub mod task;
pub mod xp;

pub use error::{Error, Result};
