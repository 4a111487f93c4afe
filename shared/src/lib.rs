//! Shared components and utilities for the glue cell crates.
//!
//! This crate contains the geometry, vision collaborator types and messaging
//! primitives used by the matching, motion and calibration layers.

pub mod chessboard;
pub mod contour;
pub mod event_bus;
pub mod overlay;
pub mod vision;
