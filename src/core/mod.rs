// src/core/mod.rs

pub mod config_loader;
pub mod machine;
pub mod paths;
pub mod session;
