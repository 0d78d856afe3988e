// src/core/config_loader.rs

use crate::{
    constants::COMPILER_ENV_VAR,
    core::paths::{self, PathError},
    models::{CompilerCommand, CrefConfig},
};
use std::{env, fs, path::Path};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("Failed to parse config.toml: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to serialize default config to TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Compiler command '{0}' could not be parsed.")]
    CompilerParse(String),
    #[error("No compiler configured.")]
    EmptyCompiler,
    #[error("Failed to expand compiler path '{value}': {reason}")]
    Expansion { value: String, reason: String },
}

/// Loads `config.toml` from the cref config directory, writing the defaults
/// there the first time.
pub fn load_config() -> Result<CrefConfig, ConfigError> {
    let config_path = paths::get_config_path()?;
    if !config_path.exists() {
        let default_config = CrefConfig::default();
        let toml_string = toml::to_string_pretty(&default_config)?;
        if let Err(e) = fs::write(&config_path, toml_string) {
            log::warn!(
                "Could not write default config to '{}': {}",
                config_path.display(),
                e
            );
        }
        return Ok(default_config);
    }
    load_config_from(&config_path)
}

/// Loads a config file from an explicit path.
pub fn load_config_from(path: &Path) -> Result<CrefConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    log::debug!("Loaded config from '{}'.", path.display());
    Ok(toml::from_str(&content)?)
}

/// Turns the config (and `CREF_COMPILER`, if set) into the command to spawn.
pub fn resolve_compiler(config: &CrefConfig) -> Result<CompilerCommand, ConfigError> {
    resolve_compiler_with(config, env::var(COMPILER_ENV_VAR).ok().as_deref())
}

/// `override_line` is a full command line, e.g. `gcc -Wall`. It replaces the
/// configured compiler; configured flags still follow it.
fn resolve_compiler_with(
    config: &CrefConfig,
    override_line: Option<&str>,
) -> Result<CompilerCommand, ConfigError> {
    let mut words = match override_line.map(str::trim).filter(|line| !line.is_empty()) {
        Some(line) => {
            shlex::split(line).ok_or_else(|| ConfigError::CompilerParse(line.to_string()))?
        }
        None => vec![config.compiler.trim().to_string()],
    };
    words.extend(config.flags.iter().cloned());

    let mut words = words.into_iter();
    let program = words
        .next()
        .filter(|program| !program.is_empty())
        .ok_or(ConfigError::EmptyCompiler)?;
    let program = expand(&program)?;

    Ok(CompilerCommand {
        program,
        args: words.collect(),
    })
}

/// Expands `~` and environment variables in the compiler path.
fn expand(value: &str) -> Result<String, ConfigError> {
    shellexpand::full(value)
        .map(|expanded| expanded.into_owned())
        .map_err(|e| ConfigError::Expansion {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_uses_clang() {
        let command = resolve_compiler_with(&CrefConfig::default(), None).unwrap();
        assert_eq!(command.program, "clang");
        assert!(command.args.is_empty());
    }

    #[test]
    fn test_flags_follow_the_compiler() {
        let config = CrefConfig {
            compiler: "gcc".to_string(),
            flags: vec!["-Wall".to_string(), "-g".to_string()],
        };
        let command = resolve_compiler_with(&config, None).unwrap();
        assert_eq!(command.program, "gcc");
        assert_eq!(command.args, vec!["-Wall", "-g"]);
    }

    #[test]
    fn test_override_replaces_compiler_and_is_shell_split() {
        let config = CrefConfig {
            compiler: "clang".to_string(),
            flags: vec!["-O0".to_string()],
        };
        let command = resolve_compiler_with(&config, Some("gcc -std=c11 '-DNAME=a b'")).unwrap();
        assert_eq!(command.program, "gcc");
        assert_eq!(command.args, vec!["-std=c11", "-DNAME=a b", "-O0"]);
    }

    #[test]
    fn test_blank_override_is_ignored() {
        let command = resolve_compiler_with(&CrefConfig::default(), Some("   ")).unwrap();
        assert_eq!(command.program, "clang");
    }

    #[test]
    fn test_unbalanced_override_is_rejected() {
        let result = resolve_compiler_with(&CrefConfig::default(), Some("gcc 'oops"));
        assert!(matches!(result, Err(ConfigError::CompilerParse(_))));
    }

    #[test]
    fn test_empty_compiler_is_rejected() {
        let config = CrefConfig {
            compiler: "  ".to_string(),
            flags: Vec::new(),
        };
        assert!(matches!(
            resolve_compiler_with(&config, None),
            Err(ConfigError::EmptyCompiler)
        ));
    }

    #[test]
    fn test_home_is_expanded_in_compiler_path() {
        let config = CrefConfig {
            compiler: "~/toolchains/bin/cc".to_string(),
            flags: Vec::new(),
        };
        let command = resolve_compiler_with(&config, None).unwrap();
        assert!(!command.program.starts_with('~'));
        assert!(command.program.ends_with("toolchains/bin/cc"));
    }

    #[test]
    fn test_load_config_from_file_with_partial_keys() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"flags = [\"-Wall\"]\n").unwrap();
        file.flush().unwrap();

        let config = load_config_from(file.path()).unwrap();

        assert_eq!(config.compiler, "clang");
        assert_eq!(config.flags, vec!["-Wall"]);
    }

    #[test]
    fn test_load_config_from_invalid_toml_fails() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"compiler = [").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            load_config_from(file.path()),
            Err(ConfigError::TomlParse(_))
        ));
    }
}
