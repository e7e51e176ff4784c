//! stillcam library crate.
//!
//! Captures frames from a camera, averages them into a single still, and
//! writes it out with an optional text banner, underlay and overlay.

pub mod accumulator;
pub mod capture_loop;
pub mod cli;
pub mod colour;
pub mod compose;
pub mod config;
pub mod daemon;
pub mod decode;
pub mod error;
pub mod logging;
pub mod output;
pub mod signals;
pub mod source;
pub mod template;
pub mod text;
