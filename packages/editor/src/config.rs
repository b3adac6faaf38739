use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_FORMAT: &str = "markdown";
pub const DEFAULT_HISTORY_DEPTH: usize = 100;

/// Editor options. Each toggle changes which extensions register.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorConfig {
    /// Markup format name passed to the conversion engine
    pub format: String,

    /// Focus the surface as soon as the editor is created
    pub auto_focus: bool,

    pub spell_check: bool,

    /// Editor-like behaviour inside code blocks (Tab indents, Mod-Enter exits)
    pub visual_code_blocks: bool,

    /// Link bare URLs as they are typed
    pub auto_link: bool,

    pub brace_matching: bool,

    /// Executable code chunks (```` ```{r} ````) as their own node type
    pub embedded_code_chunks: bool,

    /// Maximum number of undo steps kept
    pub history_depth: usize,

    /// Caller key bindings: command id to chords. Replaces the command's
    /// default chords.
    pub keybindings: BTreeMap<String, Vec<String>>,

    /// Map `Mod` to `Meta` instead of `Ctrl`
    pub mac_keys: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_FORMAT.to_string(),
            auto_focus: false,
            spell_check: false,
            visual_code_blocks: false,
            auto_link: false,
            brace_matching: false,
            embedded_code_chunks: false,
            history_depth: DEFAULT_HISTORY_DEPTH,
            keybindings: BTreeMap::new(),
            mac_keys: false,
        }
    }
}

impl EditorConfig {
    pub fn with_format(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "format": "rmarkdown",
            "autoLink": true,
            "embeddedCodeChunks": true,
            "historyDepth": 20,
            "keybindings": { "italic": ["Ctrl+B"] }
        }"#;

        let config: EditorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.format, "rmarkdown");
        assert!(config.auto_link);
        assert!(config.embedded_code_chunks);
        assert!(!config.spell_check);
        assert_eq!(config.history_depth, 20);
        assert_eq!(config.keybindings["italic"], vec!["Ctrl+B"]);
    }

    #[test]
    fn test_default_config() {
        let config: EditorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EditorConfig::default());
        assert_eq!(config.format, "markdown");
        assert_eq!(config.history_depth, 100);
    }
}
