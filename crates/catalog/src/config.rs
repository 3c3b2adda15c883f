//! CLI configuration: thin wrapper around `catalog_config` shared types.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--config, --output, --color, --timeout).

use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;

use crate::cli::{ColorMode, GlobalOpts, OutputFormat};
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use catalog_config::{
    Config, config_path, load_config, load_config_from, save_config, save_config_to,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Config file location: `--config` / `CATALOG_CONFIG`, else the platform default.
pub fn resolve_path(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(config_path)
}

/// Load config from the resolved path, layered with the environment.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    tracing::debug!(path = %resolve_path(global).display(), "loading config");
    let config = match &global.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Write `config` to the resolved path, returning where it went.
pub fn save(global: &GlobalOpts, config: &Config) -> Result<PathBuf, CliError> {
    match &global.config {
        Some(path) => {
            save_config_to(config, path)?;
            Ok(path.clone())
        }
        None => Ok(save_config(config)?),
    }
}

/// Output settings after applying flag overrides to config defaults.
#[derive(Debug, Clone, Copy)]
pub struct OutputSettings {
    pub format: OutputFormat,
    pub color: ColorMode,
    pub quiet: bool,
}

pub fn output_settings(global: &GlobalOpts, config: &Config) -> Result<OutputSettings, CliError> {
    let format = match global.output {
        Some(format) => format,
        None => parse_value("defaults.output", &config.defaults.output)?,
    };
    let color = match global.color {
        Some(color) => color,
        None => parse_value("defaults.color", &config.defaults.color)?,
    };
    Ok(OutputSettings {
        format,
        color,
        quiet: global.quiet,
    })
}

/// HTTP timeout: `--timeout` wins over `[fetch] timeout_secs`.
pub fn fetch_timeout(global: &GlobalOpts, config: &Config) -> Result<Duration, CliError> {
    match global.timeout {
        Some(0) => Err(CliError::Validation {
            field: "timeout".into(),
            reason: "must be at least 1 second".into(),
        }),
        Some(secs) => Ok(Duration::from_secs(secs)),
        None => Ok(config.fetch_timeout()?),
    }
}

fn parse_value<T: ValueEnum>(field: &str, value: &str) -> Result<T, CliError> {
    T::from_str(value, true).map_err(|reason| CliError::Validation {
        field: field.into(),
        reason,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["catalog"];
        argv.extend_from_slice(args);
        argv.extend_from_slice(&["config", "path"]);
        Cli::try_parse_from(argv).unwrap().global
    }

    #[test]
    fn flags_override_config_defaults() {
        let mut config = Config::default();
        config.defaults.output = "yaml".into();

        let settings = output_settings(&global(&[]), &config).unwrap();
        assert_eq!(settings.format, OutputFormat::Yaml);
        assert_eq!(settings.color, ColorMode::Auto);

        let settings = output_settings(&global(&["-o", "json", "--color", "never"]), &config).unwrap();
        assert_eq!(settings.format, OutputFormat::Json);
        assert_eq!(settings.color, ColorMode::Never);
    }

    #[test]
    fn config_output_names_match_flag_values() {
        let mut config = Config::default();
        config.defaults.output = "json-compact".into();
        let settings = output_settings(&global(&[]), &config).unwrap();
        assert_eq!(settings.format, OutputFormat::JsonCompact);
    }

    #[test]
    fn timeout_flag_wins() {
        let config = Config::default();
        assert_eq!(fetch_timeout(&global(&[]), &config).unwrap(), Duration::from_secs(30));
        assert_eq!(
            fetch_timeout(&global(&["--timeout", "2"]), &config).unwrap(),
            Duration::from_secs(2)
        );
        assert!(fetch_timeout(&global(&["--timeout", "0"]), &config).is_err());
    }
}
