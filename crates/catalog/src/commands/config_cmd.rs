//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

/// TOML string literal for `value`, quoted and escaped.
fn toml_str(value: &str) -> String {
    toml::Value::String(value.to_owned()).to_string()
}

fn format_config(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    let _ = writeln!(out, "[cache]");
    let _ = writeln!(out, "release_grace_ms = {}", cfg.cache.release_grace_ms);
    let _ = writeln!(out, "cleanup_interval_ms = {}", cfg.cache.cleanup_interval_ms);
    let _ = writeln!(out);
    let _ = writeln!(out, "[fetch]");
    let _ = writeln!(out, "timeout_secs = {}", cfg.fetch.timeout_secs);
    let _ = writeln!(out, "user_agent = {}", toml_str(&cfg.fetch.user_agent));
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = {}", toml_str(&cfg.defaults.output));
    let _ = write!(out, "color = {}", toml_str(&cfg.defaults.color));

    out
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match &args.command {
        // ── Init: write defaults ────────────────────────────────────
        ConfigCommand::Init { force } => {
            let path = config::resolve_path(global);
            if path.exists() && !*force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            let path = config::save(global, &Config::default())?;
            if !global.quiet {
                eprintln!("✓ Wrote default configuration to {}", path.display());
            }
            Ok(())
        }

        // ── Show: resolved config (file + env) ──────────────────────
        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            let settings = config::output_settings(global, &cfg)?;
            let path = config::resolve_path(global);
            let out = output::render_single(settings.format, &cfg, format_config, |_| {
                path.display().to_string()
            })?;
            output::print_output(&out, settings.quiet);
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            output::print_output(&config::resolve_path(global).display().to_string(), false);
            Ok(())
        }
    }
}
