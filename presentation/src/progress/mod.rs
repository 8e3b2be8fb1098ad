//! Startup progress display.

pub mod reporter;
