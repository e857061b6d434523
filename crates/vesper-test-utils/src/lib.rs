//! Test utilities for vesper projects.
//!
//! This crate provides testing infrastructure for code built on
//! `vesper-graphics`, so the graphics engine can be exercised without a GPU.
//!
//! # Features
//!
//! - **Capability presets**: [`desktop_capabilities`] and [`full_format_usage`]
//!   describe a generous desktop-class device.
//! - **Mock backend** (feature `mock`): [`MockBackend`] implements
//!   `GraphicsBackend` and records every call for later inspection.
//! - **Mock fences** (feature `mock`): [`MockFence`] stands in for a GPU fence
//!   when testing frame pacing.
//!
//! # Example: Counting Draws
//!
//! ```ignore
//! use vesper_graphics::{DrawMode, Graphics, GraphicsConfig};
//! use vesper_test_utils::MockBackend;
//!
//! let backend = MockBackend::new();
//! let mut graphics = Graphics::new(backend.clone(), GraphicsConfig::default()).unwrap();
//!
//! graphics.rectangle(DrawMode::Fill, 0.0, 0.0, 10.0, 10.0).unwrap();
//! graphics.circle(DrawMode::Fill, 50.0, 50.0, 5.0).unwrap();
//! graphics.present().unwrap();
//!
//! // Both shapes share one batch.
//! assert_eq!(backend.count_draws(), 1);
//! ```

pub mod fixtures;

#[cfg(feature = "mock")]
pub mod mock_backend;
#[cfg(feature = "mock")]
pub mod mock_fence;

pub use fixtures::*;

#[cfg(feature = "mock")]
pub use mock_backend::*;
#[cfg(feature = "mock")]
pub use mock_fence::*;
