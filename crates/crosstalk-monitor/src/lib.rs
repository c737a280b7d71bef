//! crosstalk monitor library - configuration, logging and stdout rendering
//! for the `crosstalk` binary. Separated from main.rs for testing.

pub mod config;
pub mod logging;
pub mod output;
