use serde::{Deserialize, Serialize};

/// Colours and fonts a surface renders with. The core stores the theme and
/// hands it to the surface; nothing in the document depends on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Theme {
    pub dark_mode: bool,
    pub solarized_mode: bool,
    pub background_color: String,
    pub text_color: String,
    pub light_text_color: String,
    pub link_text_color: String,
    pub markup_text_color: String,
    pub cursor_color: String,
    pub selection_color: String,
    /// Background of code blocks and chunks
    pub code_background_color: String,
    pub find_text_background_color: String,
    pub block_border_color: String,
    pub proportional_font: String,
    pub proportional_font_size_pt: f32,
    pub fixed_width_font: String,
    pub fixed_width_font_size_pt: f32,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            dark_mode: false,
            solarized_mode: false,
            background_color: "#ffffff".into(),
            text_color: "#000000".into(),
            light_text_color: "#8a8a8a".into(),
            link_text_color: "#106ba3".into(),
            markup_text_color: "#b1b1b1".into(),
            cursor_color: "#000000".into(),
            selection_color: "#d4e4f7".into(),
            code_background_color: "#f8f8f8".into(),
            find_text_background_color: "#fff2a8".into(),
            block_border_color: "#dddddd".into(),
            proportional_font: "sans-serif".into(),
            proportional_font_size_pt: 11.0,
            fixed_width_font: "monospace".into(),
            fixed_width_font_size_pt: 10.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_theme_json() {
        let theme: Theme = serde_json::from_str(r##"{ "darkMode": true, "backgroundColor": "#1e1e1e" }"##).unwrap();
        assert!(theme.dark_mode);
        assert_eq!(theme.background_color, "#1e1e1e");
        assert_eq!(theme.fixed_width_font, "monospace");

        let json = serde_json::to_value(&theme).unwrap();
        assert_eq!(json["fixedWidthFontSizePt"], 10.0);
    }
}
