//! `cref`: compile a single C file, run it on your terminal, and recompile it
//! with one keystroke.

include!(concat!(env!("OUT_DIR"), "/translations.rs"));

pub mod cli;
pub mod constants;
pub mod core;
pub mod models;
pub mod system;
