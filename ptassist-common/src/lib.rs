//! Common utilities for the ptassist toolkit

pub mod error;

pub use error::{suggest_correction, Error, Result};
