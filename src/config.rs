use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveConfig {
    pub max_iterations: usize,
    pub overlap_shift: f32,
    pub crossing_shift: f32,
    pub obstruction_shift: f32,
    /// Shift applied to an obstructing group that has inbound links.
    pub obstruction_shift_inbound: f32,
    pub stagger: f32,
    /// Abort when conflicts grow past this multiple of the previous pass.
    pub escalation_ratio: f32,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            overlap_shift: 1.0,
            crossing_shift: 1.5,
            obstruction_shift: 1.0,
            obstruction_shift_inbound: 1.5,
            stagger: 0.3,
            escalation_ratio: 1.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub within_group_spacing: f32,
    pub between_group_spacing: f32,
    pub max_x_position: f32,
    /// Layers with at most this many groups get an exhaustive order search.
    pub exhaustive_order_limit: usize,
    pub char_width: f32,
    pub min_text_width: f32,
    pub text_height: f32,
    pub text_gap: f32,
    pub coincident_tolerance: f32,
    pub underline_anchor_drop: f32,
    pub resolve: ResolveConfig,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            within_group_spacing: 2.5,
            between_group_spacing: 2.6,
            max_x_position: 20.0,
            exhaustive_order_limit: 8,
            char_width: 0.16,
            min_text_width: 0.64,
            text_height: 0.3,
            text_gap: 0.1,
            coincident_tolerance: 0.1,
            underline_anchor_drop: 0.3,
            resolve: ResolveConfig::default(),
        }
    }
}

impl LayoutConfig {
    pub fn text_width(&self, label: &str) -> f32 {
        (label.chars().count() as f32 * self.char_width).max(self.min_text_width)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub target_width_cm: f32,
    pub x_spacing_min: f32,
    pub x_spacing_max: f32,
    pub x_spacing_default: f32,
    pub font_size_small: u32,
    pub font_size_medium: u32,
    pub font_size_large: u32,
    /// Below this x scale the small font is used.
    pub small_font_threshold: f32,
    /// Below this x scale (and above the small threshold) the medium font is used.
    pub medium_font_threshold: f32,
    pub margin_cm: f32,
    pub compile_timeout_secs: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            target_width_cm: 12.0,
            x_spacing_min: 0.5,
            x_spacing_max: 1.5,
            x_spacing_default: 1.0,
            font_size_small: 10,
            font_size_medium: 12,
            font_size_large: 14,
            small_font_threshold: 0.8,
            medium_font_threshold: 1.0,
            margin_cm: 0.25,
            compile_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub theme: Theme,
    pub layout: LayoutConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolveConfigFile {
    max_iterations: Option<usize>,
    overlap_shift: Option<f32>,
    crossing_shift: Option<f32>,
    obstruction_shift: Option<f32>,
    obstruction_shift_inbound: Option<f32>,
    stagger: Option<f32>,
    escalation_ratio: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    within_group_spacing: Option<f32>,
    between_group_spacing: Option<f32>,
    max_x_position: Option<f32>,
    exhaustive_order_limit: Option<usize>,
    char_width: Option<f32>,
    min_text_width: Option<f32>,
    text_height: Option<f32>,
    text_gap: Option<f32>,
    coincident_tolerance: Option<f32>,
    underline_anchor_drop: Option<f32>,
    resolve: Option<ResolveConfigFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenderConfigFile {
    target_width_cm: Option<f32>,
    x_spacing_min: Option<f32>,
    x_spacing_max: Option<f32>,
    x_spacing_default: Option<f32>,
    font_size_small: Option<u32>,
    font_size_medium: Option<u32>,
    font_size_large: Option<u32>,
    small_font_threshold: Option<f32>,
    medium_font_threshold: Option<f32>,
    margin_cm: Option<f32>,
    compile_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThemeFile {
    arrow_color: Option<String>,
    underline_color: Option<String>,
    line_width_pt: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeFile>,
    layout: Option<LayoutConfigFile>,
    render: Option<RenderConfigFile>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)?;
    let parsed: ConfigFile = serde_json::from_str(&contents)?;

    if let Some(theme_name) = parsed.theme.as_deref() {
        if theme_name == "mono" || theme_name == "monochrome" {
            config.theme = Theme::monochrome();
        } else if theme_name == "default" || theme_name == "blue" {
            config.theme = Theme::default();
        }
    }

    if let Some(vars) = parsed.theme_variables {
        if let Some(v) = vars.arrow_color {
            config.theme.arrow_color = v;
        }
        if let Some(v) = vars.underline_color {
            config.theme.underline_color = v;
        }
        if let Some(v) = vars.line_width_pt {
            config.theme.line_width_pt = v;
        }
    }

    if let Some(layout) = parsed.layout {
        if let Some(v) = layout.within_group_spacing {
            config.layout.within_group_spacing = v;
        }
        if let Some(v) = layout.between_group_spacing {
            config.layout.between_group_spacing = v;
        }
        if let Some(v) = layout.max_x_position {
            config.layout.max_x_position = v;
        }
        if let Some(v) = layout.exhaustive_order_limit {
            config.layout.exhaustive_order_limit = v;
        }
        if let Some(v) = layout.char_width {
            config.layout.char_width = v;
        }
        if let Some(v) = layout.min_text_width {
            config.layout.min_text_width = v;
        }
        if let Some(v) = layout.text_height {
            config.layout.text_height = v;
        }
        if let Some(v) = layout.text_gap {
            config.layout.text_gap = v;
        }
        if let Some(v) = layout.coincident_tolerance {
            config.layout.coincident_tolerance = v;
        }
        if let Some(v) = layout.underline_anchor_drop {
            config.layout.underline_anchor_drop = v;
        }
        if let Some(resolve) = layout.resolve {
            let target = &mut config.layout.resolve;
            if let Some(v) = resolve.max_iterations {
                target.max_iterations = v;
            }
            if let Some(v) = resolve.overlap_shift {
                target.overlap_shift = v;
            }
            if let Some(v) = resolve.crossing_shift {
                target.crossing_shift = v;
            }
            if let Some(v) = resolve.obstruction_shift {
                target.obstruction_shift = v;
            }
            if let Some(v) = resolve.obstruction_shift_inbound {
                target.obstruction_shift_inbound = v;
            }
            if let Some(v) = resolve.stagger {
                target.stagger = v;
            }
            if let Some(v) = resolve.escalation_ratio {
                target.escalation_ratio = v;
            }
        }
    }

    if let Some(render) = parsed.render {
        if let Some(v) = render.target_width_cm {
            config.render.target_width_cm = v;
        }
        if let Some(v) = render.x_spacing_min {
            config.render.x_spacing_min = v;
        }
        if let Some(v) = render.x_spacing_max {
            config.render.x_spacing_max = v;
        }
        if let Some(v) = render.x_spacing_default {
            config.render.x_spacing_default = v;
        }
        if let Some(v) = render.font_size_small {
            config.render.font_size_small = v;
        }
        if let Some(v) = render.font_size_medium {
            config.render.font_size_medium = v;
        }
        if let Some(v) = render.font_size_large {
            config.render.font_size_large = v;
        }
        if let Some(v) = render.small_font_threshold {
            config.render.small_font_threshold = v;
        }
        if let Some(v) = render.medium_font_threshold {
            config.render.medium_font_threshold = v;
        }
        if let Some(v) = render.margin_cm {
            config.render.margin_cm = v;
        }
        if let Some(v) = render.compile_timeout_secs {
            config.render.compile_timeout_secs = v;
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_path_yields_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.layout.within_group_spacing, 2.5);
        assert_eq!(config.layout.between_group_spacing, 2.6);
        assert_eq!(config.layout.exhaustive_order_limit, 8);
        assert_eq!(config.layout.resolve.max_iterations, 10);
        assert_eq!(config.render.font_size_medium, 12);
    }

    #[test]
    fn file_overrides_selected_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "theme": "mono",
                "themeVariables": {{ "arrowColor": "red" }},
                "layout": {{ "maxXPosition": 30, "resolve": {{ "maxIterations": 3 }} }},
                "render": {{ "targetWidthCm": 16 }}
            }}"#
        )
        .unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.theme.arrow_color, "red");
        assert_eq!(config.theme.underline_color, "black");
        assert_eq!(config.layout.max_x_position, 30.0);
        assert_eq!(config.layout.resolve.max_iterations, 3);
        assert_eq!(config.layout.resolve.crossing_shift, 1.5);
        assert_eq!(config.render.target_width_cm, 16.0);
        assert_eq!(config.layout.within_group_spacing, 2.5);
    }

    #[test]
    fn text_width_has_a_floor() {
        let config = LayoutConfig::default();
        assert_eq!(config.text_width("A"), config.min_text_width);
        assert!(config.text_width("a much longer label") > config.min_text_width);
    }
}
