use crate::ir::{Element, Group, Spec, SpecError};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

static BRACKET_GROUP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[(.*?)\](.*)$").unwrap());
static BRACKET_REF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[(.*?)\]$").unwrap());
static AT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bat\s*\(\s*(-?\d+(?:\.\d+)?)\s*,\s*(-?\d+(?:\.\d+)?)\s*\)").unwrap()
});
static UNDERLINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)underline").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid JSON diagram: {0}")]
    Json(#[from] serde_json::Error),
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("line {line}: no group has exactly the elements [{reference}]")]
    UnknownGroupReference { line: usize, reference: String },
    #[error("link from '{link_source}' must map to a single target name")]
    InvalidLink { link_source: String },
    #[error(transparent)]
    Invalid(#[from] SpecError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Json,
    Text,
}

impl InputFormat {
    /// Picks the format from the file extension, falling back to content.
    pub fn detect(path: Option<&Path>, content: &str) -> Self {
        let ext = path
            .and_then(|p| p.extension())
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("json") | Some("json5") => InputFormat::Json,
            Some("txt") | Some("dsl") => InputFormat::Text,
            _ => {
                let first = content.trim_start().chars().next();
                if matches!(first, Some('{')) {
                    InputFormat::Json
                } else {
                    InputFormat::Text
                }
            }
        }
    }
}

pub fn parse_spec(input: &str, format: InputFormat) -> Result<Spec, ParseError> {
    match format {
        InputFormat::Json => parse_json_spec(input),
        InputFormat::Text => parse_text_spec(input),
    }
}

#[derive(Debug, Deserialize)]
struct SpecFile {
    #[serde(default)]
    groups: Vec<GroupFile>,
    #[serde(default)]
    links: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GroupFile {
    name: String,
    #[serde(default)]
    elements: Option<Vec<String>>,
    #[serde(default)]
    underline: bool,
    #[serde(default, alias = "at")]
    override_position: Option<(f32, f32)>,
}

/// Parses `{ groups: [...], links: { source: target } }`. Strict JSON is
/// tried first; JSON5 is accepted as a fallback.
pub fn parse_json_spec(input: &str) -> Result<Spec, ParseError> {
    let file = match serde_json::from_str::<SpecFile>(input) {
        Ok(file) => file,
        Err(strict_err) => match json5::from_str::<SpecFile>(input) {
            Ok(file) => file,
            Err(_) => return Err(ParseError::Json(strict_err)),
        },
    };

    let mut spec = Spec::new();
    for group in file.groups {
        let elements = match group.elements {
            Some(tokens) => tokens.iter().map(|t| Element::parse(t.trim())).collect(),
            None => vec![Element::Visible(group.name.clone())],
        };
        spec.add_group(Group {
            name: group.name,
            elements,
            underline: group.underline,
            override_position: group.override_position,
        });
    }
    for (source, target) in file.links {
        let serde_json::Value::String(target) = target else {
            return Err(ParseError::InvalidLink {
                link_source: source,
            });
        };
        spec.add_link(source, target);
    }
    spec.validate()?;
    Ok(spec)
}

/// Parses the compact line format:
///
/// ```text
/// # groups
/// A
/// [P4 + P5] underline at (0, 3)
/// # links
/// [P4 + P5] -> A -> C
/// ```
///
/// All group lines are read before any link line, so links may refer to
/// groups declared further down.
pub fn parse_text_spec(input: &str) -> Result<Spec, ParseError> {
    let mut group_lines = Vec::new();
    let mut link_lines = Vec::new();
    for (idx, raw_line) in input.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('#') {
            debug!("section hint on line {}: {line}", idx + 1);
            continue;
        }
        if line.contains("->") {
            link_lines.push((idx + 1, line));
        } else {
            group_lines.push((idx + 1, line));
        }
    }

    let mut spec = Spec::new();
    for (counter, (line_no, line)) in group_lines.iter().enumerate() {
        spec.add_group(parse_group_line(line, *line_no, counter)?);
    }
    for (line_no, line) in link_lines {
        let parts: Vec<&str> = line.split("->").map(str::trim).collect();
        if parts.iter().any(|part| part.is_empty()) {
            return Err(ParseError::Syntax {
                line: line_no,
                message: format!("empty endpoint in link chain '{line}'"),
            });
        }
        let names = parts
            .iter()
            .map(|part| resolve_reference(&spec, part, line_no))
            .collect::<Result<Vec<_>, _>>()?;
        for pair in names.windows(2) {
            spec.add_link(pair[0].clone(), pair[1].clone());
        }
    }
    spec.validate()?;
    Ok(spec)
}

fn parse_group_line(line: &str, line_no: usize, counter: usize) -> Result<Group, ParseError> {
    let position = parse_position(line, line_no)?;
    let mut group = if let Some(caps) = BRACKET_GROUP_RE.captures(line) {
        let inner = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let modifiers = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        let elements: Vec<Element> = inner.split_whitespace().map(Element::parse).collect();
        if elements.is_empty() {
            return Err(ParseError::Syntax {
                line: line_no,
                message: "group has no elements".to_string(),
            });
        }
        Group::new(format!("group_{counter}"), elements)
            .with_underline(UNDERLINE_RE.is_match(modifiers))
    } else {
        let mut parts = line.split_whitespace();
        let Some(name) = parts.next() else {
            return Err(ParseError::Syntax {
                line: line_no,
                message: "missing group name".to_string(),
            });
        };
        let underline = parts.next().is_some_and(|m| UNDERLINE_RE.is_match(m));
        Group::singleton(name).with_underline(underline)
    };
    group.override_position = position;
    Ok(group)
}

fn parse_position(line: &str, line_no: usize) -> Result<Option<(f32, f32)>, ParseError> {
    let Some(caps) = AT_RE.captures(line) else {
        return Ok(None);
    };
    let coord = |idx: usize| -> Result<f32, ParseError> {
        caps.get(idx)
            .and_then(|m| m.as_str().parse::<f32>().ok())
            .ok_or_else(|| ParseError::Syntax {
                line: line_no,
                message: "malformed 'at (x, y)' position".to_string(),
            })
    };
    Ok(Some((coord(1)?, coord(2)?)))
}

/// A bracketed reference names the group with exactly those elements.
fn resolve_reference(spec: &Spec, part: &str, line_no: usize) -> Result<String, ParseError> {
    let Some(caps) = BRACKET_REF_RE.captures(part) else {
        return Ok(part.to_string());
    };
    let inner = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let wanted: Vec<Element> = inner.split_whitespace().map(Element::parse).collect();
    spec.groups
        .iter()
        .find(|group| group.elements == wanted)
        .map(|group| group.name.clone())
        .ok_or_else(|| ParseError::UnknownGroupReference {
            line: line_no,
            reference: inner.trim().to_string(),
        })
}
