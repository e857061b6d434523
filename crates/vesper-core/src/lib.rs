//! Vesper Core
//!
//! Shared utilities for the vesper graphics crates: profiling, logging,
//! math re-exports, geometry and colors.

pub mod alloc;
pub mod color;
pub mod geometry;
pub mod logging;
pub mod math;
pub mod profiling;
