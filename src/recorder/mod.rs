//! Microphone capture, preview and upload

mod artifact;
mod capture;
mod controller;
mod error;
mod upload;
mod visualizer;

pub use artifact::*;
pub use capture::*;
pub use controller::*;
pub use error::*;
pub use upload::*;
pub use visualizer::{spectrum, Spectrum, VisualizerHandle};
