//! Common utility functions and helper macros
//!
//! - **[`macros`]**: Utility macros for reducing boilerplate code
//! - **[`serde`]**: Millisecond duration serde helpers

#[macro_use]
pub mod macros;
pub mod serde;

pub use self::serde::{duration_millis, option_duration_millis};
