//! Adjusted Cost Base (weighted-average) capital gains for a single pooled asset.

pub mod cmd;
pub mod core;

pub use crate::core::*;
