//! Load CSV and WAV waveforms into the SRAM of an AD9106 arbitrary waveform
//! generator over its line-oriented serial protocol.

pub mod app;
pub mod cli;
pub mod data;
pub mod error;
pub mod protocol;
