//! Merged, per-source colored console output.
//!
//! Every endpoint forwards its lines to one [`ConsoleSink`], which prints
//! them in arrival order with a relative timestamp and a color per source.

pub mod palette;
mod sink;

pub use palette::{Color, ColorAllocator, ColorSpec, Style, colorize, should_color};
pub use sink::{
    CONSOLE_LABEL, ConsoleCapture, ConsoleConfig, ConsoleOutput, ConsoleSink, NAME_WIDTH,
    format_line,
};
