// src/constants.rs

//! Fixed names and byte values shared across the crate.

/// The only mode selector accepted on the command line (`cref run <file>`).
pub const RUN_MODE: &str = "run";

/// Ctrl+R. Recompiles from any phase except after exit.
pub const RECOMPILE_KEY: u8 = 18;

/// Ctrl+C. Raw mode turns off the terminal's own interrupt, so the byte is
/// handled like SIGINT.
pub const INTERRUPT_KEY: u8 = 3;

/// Prefix of the compiled artifact inside the platform temp dir.
pub const ARTIFACT_PREFIX: &str = "cref_temp_";

/// Extension of the compiled artifact.
pub const ARTIFACT_EXTENSION: &str = "out";

/// Name of the directory holding cref's configuration (inside the system config dir).
pub const CONFIG_DIR_NAME: &str = "cref";

/// Name of the configuration file (inside the cref config dir).
pub const CONFIG_FILENAME: &str = "config.toml";

/// Environment variable overriding the configured compiler command.
pub const COMPILER_ENV_VAR: &str = "CREF_COMPILER";

/// Compiler used when nothing else is configured.
pub const DEFAULT_COMPILER: &str = "clang";
