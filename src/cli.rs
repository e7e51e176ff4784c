//! Command-line interface definitions.
//!
//! Options mirror the configuration file; anything given here wins over the
//! file (see [`Args::apply`]).

mod args;

pub use args::{Args, Resolution};
