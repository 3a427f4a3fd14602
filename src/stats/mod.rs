//! Audience statistics

pub mod viewers;

pub use viewers::{HistoryPoint, ViewerSnapshot, ViewerStats};
