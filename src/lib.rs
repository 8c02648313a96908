//! Listening analytics library - shared modules for the batch binary and tests.

pub mod join;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod preview;
pub mod progress;
pub mod queries;
pub mod safety;
pub mod sink;
