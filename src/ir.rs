use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Symbols that occupy a slot inside a group without becoming a node.
pub const SEPARATOR_SYMBOLS: [char; 3] = ['+', '-', '|'];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    Visible(String),
    Separator(char),
}

impl Element {
    pub fn parse(token: &str) -> Self {
        let mut chars = token.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) if SEPARATOR_SYMBOLS.contains(&ch) => Element::Separator(ch),
            _ => Element::Visible(token.to_string()),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Element::Visible(label) => label.clone(),
            Element::Separator(symbol) => symbol.to_string(),
        }
    }

    pub fn visible(&self) -> Option<&str> {
        match self {
            Element::Visible(label) => Some(label),
            Element::Separator(_) => None,
        }
    }

    pub fn is_separator(&self) -> bool {
        matches!(self, Element::Separator(_))
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Visible(label) => f.write_str(label),
            Element::Separator(symbol) => write!(f, "{symbol}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub elements: Vec<Element>,
    pub underline: bool,
    pub override_position: Option<(f32, f32)>,
}

impl Group {
    pub fn new(name: impl Into<String>, elements: Vec<Element>) -> Self {
        Self {
            name: name.into(),
            elements,
            underline: false,
            override_position: None,
        }
    }

    /// A group whose name is its only element.
    pub fn singleton(name: impl Into<String>) -> Self {
        let name = name.into();
        let elements = vec![Element::Visible(name.clone())];
        Self::new(name, elements)
    }

    pub fn with_underline(mut self, underline: bool) -> Self {
        self.underline = underline;
        self
    }

    pub fn pinned_at(mut self, x: f32, y: f32) -> Self {
        self.override_position = Some((x, y));
        self
    }

    pub fn is_singleton(&self) -> bool {
        self.elements.len() == 1
    }

    /// Horizontal extent from the first slot to the last one.
    pub fn width(&self, within_group_spacing: f32) -> f32 {
        self.elements.len().saturating_sub(1) as f32 * within_group_spacing
    }

    /// Slot used when the group itself is a link endpoint.
    pub fn center_slot(&self) -> usize {
        self.elements.len() / 2
    }

    pub fn visible_elements(&self) -> impl Iterator<Item = (usize, &str)> {
        self.elements
            .iter()
            .enumerate()
            .filter_map(|(idx, element)| element.visible().map(|label| (idx, label)))
    }

    pub fn slot_of(&self, label: &str) -> Option<usize> {
        self.visible_elements()
            .find(|(_, candidate)| *candidate == label)
            .map(|(idx, _)| idx)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub source: String,
    pub target: String,
}

impl Link {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

/// Where a link name lands once resolved against the groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// A specific visible element.
    Slot { group: usize, slot: usize },
    /// The group as a whole, anchored on its center slot.
    Anchor { group: usize },
}

impl Endpoint {
    pub fn group(&self) -> usize {
        match *self {
            Endpoint::Slot { group, .. } | Endpoint::Anchor { group } => group,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpecError {
    #[error("duplicate group name: {name}")]
    DuplicateGroup { name: String },
    #[error("element '{element}' appears in both group '{first_group}' and group '{second_group}'")]
    DuplicateElement {
        element: String,
        first_group: String,
        second_group: String,
    },
    #[error("group '{name}' has no elements")]
    EmptyGroup { name: String },
    #[error("group '{group}' must alternate elements and '+' separators: {elements}")]
    MalformedSeparators { group: String, elements: String },
    #[error("link '{link}' references '{name}', which is not in any group")]
    UnknownEndpoint { name: String, link: String },
    #[error("separator '{name}' cannot be a link endpoint")]
    SeparatorEndpoint { name: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Spec {
    pub groups: Vec<Group>,
    pub links: Vec<Link>,
}

impl Spec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_group(&mut self, group: Group) {
        self.groups.push(group);
    }

    /// Adds `source -> target`. A source maps to one target; re-adding a
    /// source keeps its position and replaces the target.
    pub fn add_link(&mut self, source: impl Into<String>, target: impl Into<String>) {
        let source = source.into();
        let target = target.into();
        if let Some(existing) = self.links.iter_mut().find(|link| link.source == source) {
            existing.target = target;
            return;
        }
        self.links.push(Link { source, target });
    }

    pub fn group_index(&self, name: &str) -> Option<usize> {
        self.groups.iter().position(|group| group.name == name)
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|group| group.name == name)
    }

    /// Maps every visible element label to the name of its group.
    pub fn element_groups(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        for group in &self.groups {
            for (_, label) in group.visible_elements() {
                map.entry(label.to_string())
                    .or_insert_with(|| group.name.clone());
            }
        }
        map
    }

    /// Resolves a link name. Element labels win over group names, except
    /// that an underlined group referenced by its own name is anchored on
    /// its center.
    pub fn resolve(&self, name: &str) -> Option<Endpoint> {
        for (group_idx, group) in self.groups.iter().enumerate() {
            if let Some(slot) = group.slot_of(name) {
                if group.underline && group.name == name {
                    return Some(Endpoint::Anchor { group: group_idx });
                }
                return Some(Endpoint::Slot {
                    group: group_idx,
                    slot,
                });
            }
        }
        self.group_index(name)
            .map(|group_idx| Endpoint::Anchor { group: group_idx })
    }

    /// Checks group uniqueness, separator placement and link endpoints.
    pub fn validate(&self) -> Result<(), SpecError> {
        let mut seen_groups: HashMap<&str, ()> = HashMap::new();
        let mut owners: HashMap<&str, &str> = HashMap::new();
        for group in &self.groups {
            if seen_groups.insert(group.name.as_str(), ()).is_some() {
                return Err(SpecError::DuplicateGroup {
                    name: group.name.clone(),
                });
            }
            if group.elements.is_empty() {
                return Err(SpecError::EmptyGroup {
                    name: group.name.clone(),
                });
            }
            validate_separators(group)?;
            for (_, label) in group.visible_elements() {
                if let Some(first) = owners.insert(label, group.name.as_str()) {
                    return Err(SpecError::DuplicateElement {
                        element: label.to_string(),
                        first_group: first.to_string(),
                        second_group: group.name.clone(),
                    });
                }
            }
        }

        for link in &self.links {
            for name in [&link.source, &link.target] {
                if matches!(Element::parse(name), Element::Separator(_)) {
                    return Err(SpecError::SeparatorEndpoint { name: name.clone() });
                }
                if self.resolve(name).is_none() {
                    return Err(SpecError::UnknownEndpoint {
                        name: name.clone(),
                        link: link.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn validate_separators(group: &Group) -> Result<(), SpecError> {
    if !group.elements.contains(&Element::Separator('+')) {
        return Ok(());
    }
    let malformed = || SpecError::MalformedSeparators {
        group: group.name.clone(),
        elements: group
            .elements
            .iter()
            .map(Element::label)
            .collect::<Vec<_>>()
            .join(" "),
    };
    if group.elements.len() % 2 == 0 {
        return Err(malformed());
    }
    for (idx, element) in group.elements.iter().enumerate() {
        let expect_separator = idx % 2 == 1;
        let ok = if expect_separator {
            *element == Element::Separator('+')
        } else {
            !element.is_separator()
        };
        if !ok {
            return Err(malformed());
        }
    }
    Ok(())
}
