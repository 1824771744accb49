use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use stagehand_core::config::{EngineConfig, WarnLevel};
use stagehand_core::paths;
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show the effective configuration (defaults filled in)
    Show,

    /// Validate the config for common mistakes
    Validate,

    /// Write a default config to .stagehand/config.yaml
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(root, json),
        ConfigSubcommand::Validate => validate(root, json),
        ConfigSubcommand::Init { force } => init(root, force),
    }
}

fn load(root: &Path) -> anyhow::Result<EngineConfig> {
    EngineConfig::load(root).context("failed to load config")
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = load(root)?;

    if json {
        return print_json(&config);
    }

    println!("undo capacity:     {}", config.undo_capacity);
    println!("history capacity:  {}", config.history_capacity);
    println!("max saved scenes:  {}", config.max_saved_scenes);
    println!("default timeout:   {}ms", config.default_timeout_ms);
    println!("sequence delay:    {}ms", config.sequence.delay_ms);
    println!("stop on error:     {}", config.sequence.stop_on_error);
    if config.timeouts.is_empty() {
        println!("timeouts:          (executor defaults)");
    } else {
        println!("timeouts:");
        for (action, ms) in &config.timeouts {
            println!("  {action:<18} {ms}ms");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = load(root)?;
    let warnings = config.validate();

    if json {
        let value = serde_json::json!({
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

fn init(root: &Path, force: bool) -> anyhow::Result<()> {
    let path = paths::config_path(root);
    if path.exists() && !force {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }
    EngineConfig::default()
        .save(root)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}
