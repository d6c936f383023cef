//! Time sources for retry timing and rate measurement

pub mod clock;

pub use clock::{Clock, MockClock, SystemClock};
