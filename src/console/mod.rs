//! Control layer exposing device state to external tooling.

/// High-level control API over the global device.
pub mod api;
/// Ratatui-based developer console.
pub mod ui;
