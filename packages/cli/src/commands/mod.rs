pub mod dump;
pub mod init;
pub mod list;
pub mod outline;
pub mod roundtrip;

pub use dump::{dump, DumpArgs};
pub use init::{init, InitArgs};
pub use list::{commands, CommandsArgs};
pub use outline::{outline, OutlineArgs};
pub use roundtrip::{roundtrip, RoundtripArgs};

use crate::config::{Config, EngineKind};
use anyhow::{anyhow, Result};
use folio_convert::{format_diagnostic, ConversionEngine, MarkdownEngine, PandocEngine};
use folio_editor::{Editor, EditorError, HeadlessSurface};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Everything a subcommand needs: the merged configuration and the engine
/// picked for this run
pub struct Context {
    pub config: Config,
    pub engine: Arc<dyn ConversionEngine>,
}

impl Context {
    /// Merge command line overrides into `config`. `--format` wins over the
    /// config file.
    pub fn new(mut config: Config, engine: Option<EngineKind>, format: Option<String>) -> Self {
        if let Some(engine) = engine {
            config.engine = engine;
        }
        if let Some(format) = format {
            config.editor.format = format;
        }
        let engine: Arc<dyn ConversionEngine> = match config.engine {
            EngineKind::Builtin => Arc::new(MarkdownEngine::new()),
            EngineKind::Pandoc => Arc::new(PandocEngine::new()),
        };
        debug!(engine = engine.name(), format = %config.editor.format, "cli context");
        Self { config, engine }
    }

    /// A fresh editor over a headless surface
    pub async fn editor(&self) -> Result<Editor> {
        let editor = Editor::create(
            self.config.editor.clone(),
            self.engine.clone(),
            Box::new(HeadlessSurface::new()),
        )
        .await?;
        Ok(editor)
    }

    /// A fresh editor holding `source`. Conversion errors are rendered
    /// against the source text.
    pub async fn load(&self, source: &str, file_name: &str) -> Result<Editor> {
        let editor = self.editor().await?;
        match editor.set_markdown(source, false).await {
            Ok(_) => Ok(editor),
            Err(EditorError::Conversion(e)) => Err(anyhow!("\n{}", format_diagnostic(source, file_name, &e))),
            Err(e) => Err(e.into()),
        }
    }
}

/// Read a document and return it with the name used in diagnostics
pub fn read_source(path: &Path) -> Result<(String, String)> {
    let source = std::fs::read_to_string(path).map_err(|e| anyhow!("cannot read {}: {}", path.display(), e))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();
    Ok((source, file_name))
}

#[cfg(test)]
pub(crate) fn builtin_context() -> Context {
    Context::new(Config::default(), Some(EngineKind::Builtin), None)
}
