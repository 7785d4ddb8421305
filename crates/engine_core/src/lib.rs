//! Core engine types and utilities for Terrain Drive.
//!
//! This crate provides the foundational types used across all engine systems:
//! - Transform and velocity components
//! - Wall-clock and fixed-step time management
//! - Frame-rate independent smoothing
//! - Deferred tasks tied to an owner's lifetime

pub mod components;
pub mod schedule;
pub mod smoothing;
pub mod time;
pub mod transform;

pub use components::*;
pub use schedule::*;
pub use smoothing::*;
pub use time::*;
pub use transform::*;

// Re-export commonly used types
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
