use crate::config::{Config, EngineKind, DEFAULT_CONFIG_NAME};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::Path;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Markup format (markdown, rmarkdown, commonmark, gfm)
    #[arg(long, default_value = "markdown")]
    pub markup: String,

    /// Force overwrite existing config
    #[arg(short, long)]
    pub force: bool,
}

/// Write a folio.config.json with every option spelled out. `engine` comes
/// from the global `--engine` flag.
pub fn init(args: InitArgs, engine: Option<EngineKind>, cwd: &Path) -> Result<()> {
    let config_path = Config::path_in(cwd);

    if config_path.exists() && !args.force {
        println!(
            "{} {} already exists",
            "⚠️".yellow(),
            DEFAULT_CONFIG_NAME.bright_white()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    let mut config = Config {
        engine: engine.unwrap_or_default(),
        ..Config::default()
    };
    config.editor.format = args.markup;
    config.editor.embedded_code_chunks = config.editor.format == "rmarkdown";

    fs::write(&config_path, serde_json::to_string_pretty(&config)?)?;
    println!("  {} Created {}", "✓".green(), DEFAULT_CONFIG_NAME);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = std::env::temp_dir().join(format!("folio-cli-init-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let args = InitArgs {
            markup: "rmarkdown".to_string(),
            force: true,
        };
        init(args, Some(EngineKind::Pandoc), &dir).unwrap();

        let config = Config::load(&dir).unwrap();
        assert_eq!(config.engine, EngineKind::Pandoc);
        assert_eq!(config.editor.format, "rmarkdown");
        assert!(config.editor.embedded_code_chunks);
        fs::remove_dir_all(&dir).unwrap();
    }
}
