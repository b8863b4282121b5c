//! CLI-specific utilities for ptassist
//!
//! Terminal presentation that does not belong in the core library.

pub mod progress;

pub use progress::ProgressManager;
