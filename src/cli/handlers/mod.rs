// src/cli/handlers/mod.rs

// One module per CLI mode.

pub mod run;
