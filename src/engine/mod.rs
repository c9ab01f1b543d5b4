//! Pure aggregation over rows already loaded from the store.
//!
//! Nothing in here reads a clock: callers pass `today` / `now` explicitly.

pub mod analytics;
pub mod mock_test;
pub mod progress;
pub mod revision;
pub mod syllabus;
