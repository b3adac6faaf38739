use clap::ValueEnum;
use folio_convert::WriterOptions;
use folio_editor::EditorConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_NAME: &str = "folio.config.json";

/// Which conversion engine turns markup into the intermediate document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// The in-process markdown engine
    #[default]
    Builtin,
    /// The external `pandoc` binary
    Pandoc,
}

/// Folio configuration file format
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub engine: EngineKind,

    /// Options handed to every editor the CLI creates
    pub editor: EditorConfig,

    /// How markup is written back out
    pub writer: WriterOptions,
}

impl Config {
    /// Load config from a directory
    pub fn load(cwd: &Path) -> anyhow::Result<Self> {
        let config_path = Self::path_in(cwd);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| anyhow::anyhow!("{}: {}", config_path.display(), e))?;
            tracing::debug!(path = %config_path.display(), "loaded config");
            Ok(config)
        } else {
            // Return default config if none exists
            Ok(Config::default())
        }
    }

    pub fn path_in(cwd: &Path) -> PathBuf {
        cwd.join(DEFAULT_CONFIG_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_convert::WrapMode;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "engine": "pandoc",
            "editor": { "format": "rmarkdown", "embeddedCodeChunks": true },
            "writer": { "wrap": "sentence", "atxHeaders": true }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.engine, EngineKind::Pandoc);
        assert_eq!(config.editor.format, "rmarkdown");
        assert!(config.editor.embedded_code_chunks);
        assert!(!config.editor.auto_link);
        assert_eq!(config.writer.wrap, WrapMode::Sentence);
        assert!(config.writer.atx_headers);
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.engine, EngineKind::Builtin);
        assert_eq!(config.editor.format, "markdown");
        assert_eq!(config.writer, WriterOptions::default());
    }

    #[test]
    fn test_missing_file_gives_default() {
        let dir = std::env::temp_dir().join("folio-cli-config-missing");
        let config = Config::load(&dir).unwrap();
        assert_eq!(config, Config::default());
    }
}
