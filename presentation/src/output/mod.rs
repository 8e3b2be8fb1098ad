//! Console output for results and faults.

pub mod console;
pub mod formatter;
