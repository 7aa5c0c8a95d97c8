//! DSP: additive synthesis from a bank of harmonics.
//!
//! Everything here is pure Rust and deterministic, so the same bank renders
//! byte-identical WAV files from the CLI, the control channel, and WASM.

pub mod bank;
pub mod renderer;
pub mod shape;
pub mod tuning;
pub mod waveform;
