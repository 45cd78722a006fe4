//! Utility modules for browser interop.
//!
//! Provides:
//! - [`dom`] - Window and localStorage access
//! - [`race_with_timeout`] - Timer-bounded futures for silent wallet queries

pub mod dom;
mod timeout;

pub use timeout::{RaceResult, race_with_timeout};
