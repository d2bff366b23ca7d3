use crate::config::RenderConfig;
use crate::error::{Error, Result};
use crate::layout::{Layout, NodeLayout};
use crate::theme::Theme;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::Path;

pub const DEFAULT_TEMPLATE: &str = include_str!("../templates/template.tex");

static X_SCALE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"x=[\d.]+cm").unwrap());
static FONT_SIZE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"fontsize\{\d+\}\{\d+\}").unwrap());
static LINE_WIDTH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"line width=[\d.]+pt").unwrap());
static BORDER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"border=[\d.]+cm").unwrap());

/// Drawing commands for one layout, before template substitution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TikzFragments {
    pub nodes: Vec<String>,
    pub underlines: Vec<String>,
    pub links: Vec<String>,
}

/// Horizontal scale and font size picked from the figure's width.
pub fn spacing_and_font(layout: &Layout, config: &RenderConfig) -> (f32, u32) {
    let max_x = layout.max_x();
    let x_spacing = if max_x > 0.0 {
        (config.target_width_cm / max_x).clamp(config.x_spacing_min, config.x_spacing_max)
    } else {
        config.x_spacing_default
    };
    let font_size = if x_spacing < config.small_font_threshold {
        config.font_size_small
    } else if x_spacing < config.medium_font_threshold {
        config.font_size_medium
    } else {
        config.font_size_large
    };
    (x_spacing, font_size)
}

pub fn tikz_fragments(layout: &Layout, theme: &Theme) -> TikzFragments {
    let mut ordered: Vec<&NodeLayout> = layout.nodes.iter().collect();
    let group_y: HashMap<&str, f32> = layout
        .groups
        .iter()
        .map(|g| (g.name.as_str(), g.y))
        .collect();
    ordered.sort_by(|a, b| {
        let ya = group_y.get(a.group.as_str()).copied().unwrap_or(a.y);
        let yb = group_y.get(b.group.as_str()).copied().unwrap_or(b.y);
        yb.partial_cmp(&ya).unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut used = HashSet::new();
    let mut ids: HashMap<(&str, usize), String> = HashMap::new();
    let mut fragments = TikzFragments::default();
    for node in ordered {
        let label = node.element.label();
        let id = unique_id(&mut used, &node_id(&label, node.x, node.y));
        fragments.nodes.push(format!(
            "\t\t\t\\node ({id})   at ({}, {}) {{{label}}};",
            fmt_num(node.x),
            fmt_num(node.y)
        ));
        ids.insert((node.group.as_str(), node.slot), id);
    }

    for group in layout.groups.iter().filter(|g| g.underline) {
        let last = group.elements.len().saturating_sub(1);
        let (Some(first_id), Some(last_id)) = (
            ids.get(&(group.name.as_str(), 0)),
            ids.get(&(group.name.as_str(), last)),
        ) else {
            continue;
        };
        fragments.underlines.push(format!(
            "\t\t\t\\draw[{}] ({first_id}.south west) -- ({last_id}.south east);",
            theme.underline_style()
        ));
    }

    let underlined: HashSet<&str> = layout
        .groups
        .iter()
        .filter(|g| g.underline)
        .map(|g| g.name.as_str())
        .collect();
    for arrow in &layout.arrows {
        let (Some(source_id), Some(target_id)) = (
            ids.get(&(arrow.source_group.as_str(), arrow.source_slot)),
            ids.get(&(arrow.target_group.as_str(), arrow.target_slot)),
        ) else {
            continue;
        };
        let source = if arrow.source_anchored && underlined.contains(arrow.source_group.as_str()) {
            format!("{source_id}.south")
        } else {
            source_id.clone()
        };
        fragments.links.push(format!(
            "\t\t\t\\draw[{}] ({source}) -- ({target_id});",
            theme.arrow_style()
        ));
    }
    fragments
}

pub fn apply_template(
    template: &str,
    fragments: &TikzFragments,
    x_spacing: f32,
    font_size: u32,
    theme: &Theme,
    config: &RenderConfig,
) -> String {
    let out = template
        .replace("[[nodes]]", &fragments.nodes.join("\n"))
        .replace("[[links]]", &fragments.links.join("\n"))
        .replace("[[underlines]]", &fragments.underlines.join("\n"));
    let out = X_SCALE_RE.replace_all(&out, format!("x={x_spacing:.2}cm").as_str());
    let font = format!("fontsize{{{font_size}}}{{{font_size}}}");
    let out = FONT_SIZE_RE.replace_all(&out, font.as_str());
    let out = LINE_WIDTH_RE.replace_all(
        &out,
        format!("line width={}pt", fmt_num(theme.line_width_pt)).as_str(),
    );
    let border = format!("border={}cm", fmt_num(config.margin_cm));
    let out = BORDER_RE.replace_all(&out, border.as_str());
    out.into_owned()
}

/// Full LaTeX document for `layout`.
pub fn render_tikz(
    layout: &Layout,
    template: &str,
    theme: &Theme,
    config: &RenderConfig,
) -> String {
    let (x_spacing, font_size) = spacing_and_font(layout, config);
    let fragments = tikz_fragments(layout, theme);
    apply_template(template, &fragments, x_spacing, font_size, theme, config)
}

pub fn load_template(path: Option<&Path>) -> Result<String> {
    let Some(path) = path else {
        return Ok(DEFAULT_TEMPLATE.to_string());
    };
    std::fs::read_to_string(path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::TemplateNotFound {
                path: path.to_path_buf(),
            }
        } else {
            Error::Io(err)
        }
    })
}

pub fn write_output(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, text)?;
        }
        None => {
            print!("{}", text);
        }
    }
    Ok(())
}

pub fn sanitize_node_id(label: &str) -> String {
    label
        .to_lowercase()
        .replace('+', "plus")
        .replace('-', "minus")
        .replace('\'', "p")
        .replace('.', "_")
        .replace(' ', "_")
}

fn node_id(label: &str, x: f32, y: f32) -> String {
    format!(
        "{}_{}_{}",
        sanitize_node_id(label),
        coord_token(x),
        coord_token(y)
    )
}

fn coord_token(value: f32) -> String {
    let whole = value.trunc() as i64;
    if whole < 0 {
        format!("m{}", -whole)
    } else {
        whole.to_string()
    }
}

fn unique_id(used: &mut HashSet<String>, base: &str) -> String {
    if used.insert(base.to_string()) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}_{n}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Up to three decimals, trailing zeros trimmed.
pub(crate) fn fmt_num(value: f32) -> String {
    let text = format!("{value:.3}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" || text.is_empty() {
        "0".to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::ir::{Element, Group, Spec};
    use crate::layout::compute_layout;

    fn underlined_spec() -> Spec {
        let mut spec = Spec::new();
        spec.add_group(
            Group::new(
                "group_0",
                vec![Element::parse("P4"), Element::parse("+"), Element::parse("P5")],
            )
            .with_underline(true),
        );
        spec.add_group(Group::singleton("C"));
        spec.add_link("group_0", "C");
        spec
    }

    #[test]
    fn sanitizes_like_tikz_names() {
        assert_eq!(sanitize_node_id("P'4 a.b+c-d"), "pp4_a_bpluscminusd");
        assert_eq!(node_id("A", 2.5, -1.2), "a_2_m1");
    }

    #[test]
    fn numbers_are_trimmed() {
        assert_eq!(fmt_num(2.0), "2");
        assert_eq!(fmt_num(2.5), "2.5");
        assert_eq!(fmt_num(7.6000004), "7.6");
        assert_eq!(fmt_num(-0.0001), "0");
    }

    #[test]
    fn duplicate_ids_get_suffixes() {
        let mut used = HashSet::new();
        assert_eq!(unique_id(&mut used, "a_0_0"), "a_0_0");
        assert_eq!(unique_id(&mut used, "a_0_0"), "a_0_0_2");
    }

    #[test]
    fn underlined_group_renders_rule_and_south_anchor() {
        let layout = compute_layout(&underlined_spec(), &LayoutConfig::default()).unwrap();
        let fragments = tikz_fragments(&layout, &Theme::default());
        assert_eq!(fragments.nodes.len(), 4);
        assert!(fragments.nodes.iter().any(|n| n.contains("{+}")));
        assert_eq!(fragments.underlines.len(), 1);
        assert!(fragments.underlines[0].contains("(p4_"));
        assert!(fragments.underlines[0].contains(".south west) -- (p5_"));
        assert_eq!(fragments.links.len(), 1);
        assert!(fragments.links[0].starts_with("\t\t\t\\draw[->, blue] (plus_"));
        assert!(fragments.links[0].contains(".south) -- (c_"));
    }

    #[test]
    fn template_tokens_are_substituted() {
        let layout = compute_layout(&underlined_spec(), &LayoutConfig::default()).unwrap();
        let template = "\\begin{tikzpicture}[x=1.00cm, y=1cm, fontsize{12}{12}]\n[[nodes]]\n[[underlines]]\n[[links]]\n\\end{tikzpicture}";
        let out = render_tikz(&layout, template, &Theme::default(), &RenderConfig::default());
        assert!(!out.contains("[[nodes]]"));
        assert!(!out.contains("[[links]]"));
        assert!(!out.contains("[[underlines]]"));
        assert!(out.contains("x=1.50cm"));
        assert!(out.contains("fontsize{14}{14}"));
    }

    #[test]
    fn spacing_clamps_and_picks_font() {
        let mut spec = Spec::new();
        spec.add_group(Group::new(
            "wide",
            (0..9).map(|i| Element::Visible(format!("E{i}"))).collect(),
        ));
        let layout = compute_layout(&spec, &LayoutConfig::default()).unwrap();
        let (x_spacing, font) = spacing_and_font(&layout, &RenderConfig::default());
        assert!((x_spacing - 0.6).abs() < 1e-4);
        assert_eq!(font, 10);
    }

    #[test]
    fn missing_template_is_a_clear_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.tex");
        let err = load_template(Some(&missing)).unwrap_err();
        assert!(matches!(err, Error::TemplateNotFound { .. }));
        assert!(err.to_string().contains("nope.tex"));
        assert!(load_template(None).unwrap().contains("[[nodes]]"));
    }
}
