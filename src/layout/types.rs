use std::collections::BTreeMap;

use serde::Serialize;

use crate::ir::Element;

use super::geometry::{Arrow, ConflictCounts, Conflicts};
use super::resolve::ResolutionReport;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupLayout {
    pub name: String,
    /// Topological layer; rows of a wrapped layer share it.
    pub layer: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub elements: Vec<Element>,
    pub underline: bool,
    pub pinned: bool,
}

/// One element slot, separators included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeLayout {
    pub group: String,
    pub slot: usize,
    pub element: Element,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkIssue {
    pub source: String,
    pub target: String,
    pub source_y: f32,
    pub target_y: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    /// Groups on a dependency cycle, placed on layer 0. Groups that only
    /// link down into a cycle are layered above it and not listed.
    pub unresolved_groups: Vec<String>,
    /// Non-downward links that involve pinned or unresolved groups.
    pub exempt_upward_links: Vec<LinkIssue>,
    pub residual: ConflictCounts,
}

impl Diagnostics {
    pub fn has_warnings(&self) -> bool {
        !self.unresolved_groups.is_empty()
            || !self.exempt_upward_links.is_empty()
            || self.residual.total() > 0
    }
}

/// `(layer, elements, start_x)` for one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupPosition {
    pub layer: usize,
    pub elements: Vec<Element>,
    pub start_x: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub groups: Vec<GroupLayout>,
    pub nodes: Vec<NodeLayout>,
    pub arrows: Vec<Arrow>,
    pub conflicts: Conflicts,
    pub resolution: ResolutionReport,
    pub diagnostics: Diagnostics,
}

impl Layout {
    pub fn position_map(&self) -> BTreeMap<String, GroupPosition> {
        self.groups
            .iter()
            .map(|group| {
                (
                    group.name.clone(),
                    GroupPosition {
                        layer: group.layer,
                        elements: group.elements.clone(),
                        start_x: group.x,
                    },
                )
            })
            .collect()
    }

    /// Absolute coordinates of every visible element.
    pub fn coordinates(&self) -> BTreeMap<String, (f32, f32)> {
        self.nodes
            .iter()
            .filter_map(|node| {
                node.element
                    .visible()
                    .map(|label| (label.to_string(), (node.x, node.y)))
            })
            .collect()
    }

    pub fn conflict_counts(&self) -> ConflictCounts {
        self.conflicts.counts()
    }

    pub fn group(&self, name: &str) -> Option<&GroupLayout> {
        self.groups.iter().find(|group| group.name == name)
    }

    pub fn node(&self, group: &str, slot: usize) -> Option<&NodeLayout> {
        self.nodes
            .iter()
            .find(|node| node.group == group && node.slot == slot)
    }

    /// Rightmost element x, the figure's logical width.
    pub fn max_x(&self) -> f32 {
        self.groups
            .iter()
            .map(|group| group.x + group.width)
            .fold(0.0, f32::max)
    }
}
