use log::debug;

use crate::config::LayoutConfig;
use crate::ir::{Endpoint, Group, Spec};

use super::geometry::{self, Arrow, Conflicts, TextBox};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct GroupPlacement {
    pub layer: usize,
    pub x: f32,
    pub y: f32,
    pub pinned: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct ResolvedLink {
    pub index: usize,
    pub source: Endpoint,
    pub target: Endpoint,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct Snapshot {
    placements: Vec<Option<GroupPlacement>>,
    offsets: Vec<Vec<f32>>,
}

/// Everything one layout run mutates: where each group sits and how far
/// individual elements have been staggered.
#[derive(Debug, Clone)]
pub(super) struct LayoutState<'a> {
    spec: &'a Spec,
    config: &'a LayoutConfig,
    links: Vec<ResolvedLink>,
    placements: Vec<Option<GroupPlacement>>,
    offsets: Vec<Vec<f32>>,
}

impl<'a> LayoutState<'a> {
    pub fn new(spec: &'a Spec, config: &'a LayoutConfig) -> Self {
        let mut links = Vec::with_capacity(spec.links.len());
        for (index, link) in spec.links.iter().enumerate() {
            match (spec.resolve(&link.source), spec.resolve(&link.target)) {
                (Some(source), Some(target)) => links.push(ResolvedLink {
                    index,
                    source,
                    target,
                }),
                _ => debug!("skipping unresolved link {link}"),
            }
        }
        Self {
            spec,
            config,
            links,
            placements: vec![None; spec.groups.len()],
            offsets: spec
                .groups
                .iter()
                .map(|group| vec![0.0; group.elements.len()])
                .collect(),
        }
    }

    pub fn spec(&self) -> &'a Spec {
        self.spec
    }

    pub fn config(&self) -> &'a LayoutConfig {
        self.config
    }

    pub fn links(&self) -> &[ResolvedLink] {
        &self.links
    }

    pub fn group(&self, group: usize) -> &'a Group {
        &self.spec.groups[group]
    }

    pub fn place(&mut self, group: usize, placement: GroupPlacement) {
        if let Some(slot) = self.placements.get_mut(group) {
            *slot = Some(placement);
        }
    }

    pub fn placement(&self, group: usize) -> Option<&GroupPlacement> {
        self.placements.get(group).and_then(Option::as_ref)
    }

    pub fn is_pinned(&self, group: usize) -> bool {
        self.placement(group).is_some_and(|p| p.pinned)
    }

    pub fn slot_position(&self, group: usize, slot: usize) -> Option<(f32, f32)> {
        let placement = self.placement(group)?;
        let offset = self.offsets.get(group)?.get(slot).copied()?;
        Some((
            placement.x + slot as f32 * self.config.within_group_spacing,
            placement.y + offset,
        ))
    }

    /// Drawing anchor of an endpoint. An underlined group used as a source
    /// is anchored below its center element.
    pub fn anchor(&self, endpoint: Endpoint, as_source: bool) -> Option<(f32, f32)> {
        match endpoint {
            Endpoint::Slot { group, slot } => self.slot_position(group, slot),
            Endpoint::Anchor { group } => {
                let owner = self.group(group);
                let (x, y) = self.slot_position(group, owner.center_slot())?;
                if as_source && owner.underline {
                    Some((x, y - self.config.underline_anchor_drop))
                } else {
                    Some((x, y))
                }
            }
        }
    }

    fn endpoint_slot(&self, endpoint: Endpoint) -> (usize, usize, bool) {
        match endpoint {
            Endpoint::Slot { group, slot } => (group, slot, false),
            Endpoint::Anchor { group } => (group, self.group(group).center_slot(), true),
        }
    }

    pub fn arrow_for(&self, link: &ResolvedLink) -> Option<Arrow> {
        let from = self.anchor(link.source, true)?;
        let to = self.anchor(link.target, false)?;
        let raw = &self.spec.links[link.index];
        let (source_group, source_slot, source_anchored) = self.endpoint_slot(link.source);
        let (target_group, target_slot, target_anchored) = self.endpoint_slot(link.target);
        Some(Arrow {
            source: raw.source.clone(),
            target: raw.target.clone(),
            source_group: self.group(source_group).name.clone(),
            source_slot,
            source_anchored,
            target_group: self.group(target_group).name.clone(),
            target_slot,
            target_anchored,
            from,
            to,
        })
    }

    /// Arrows whose both ends are placed.
    pub fn arrows(&self) -> Vec<Arrow> {
        self.links
            .iter()
            .filter_map(|link| self.arrow_for(link))
            .collect()
    }

    /// Placed arrows leaving any of `groups`.
    pub fn arrows_from(&self, groups: &[usize]) -> Vec<Arrow> {
        self.links
            .iter()
            .filter(|link| groups.contains(&link.source.group()))
            .filter_map(|link| self.arrow_for(link))
            .collect()
    }

    pub fn text_boxes(&self) -> Vec<TextBox> {
        let mut boxes = Vec::new();
        for (group_idx, group) in self.spec.groups.iter().enumerate() {
            for (slot, label) in group.visible_elements() {
                let Some((x, y)) = self.slot_position(group_idx, slot) else {
                    continue;
                };
                boxes.push(TextBox {
                    label: label.to_string(),
                    group: group.name.clone(),
                    slot,
                    x,
                    y,
                    width: self.config.text_width(label),
                    height: self.config.text_height,
                });
            }
        }
        boxes
    }

    pub fn detect(&self) -> Conflicts {
        geometry::detect_conflicts(&self.text_boxes(), &self.arrows(), self.config)
    }

    /// Moves a free group sideways. Pinned or unplaced groups stay put.
    pub fn shift_group(&mut self, group: usize, dx: f32) -> bool {
        match self.placements.get_mut(group).and_then(Option::as_mut) {
            Some(placement) if !placement.pinned => {
                placement.x += dx;
                true
            }
            _ => false,
        }
    }

    pub fn stagger(&mut self, group: usize, slot: usize, dy: f32) -> bool {
        if self.is_pinned(group) {
            return false;
        }
        match self.offsets.get_mut(group).and_then(|row| row.get_mut(slot)) {
            Some(offset) => {
                *offset += dy;
                true
            }
            None => false,
        }
    }

    pub fn is_staggered(&self, group: usize, slot: usize) -> bool {
        self.offsets
            .get(group)
            .and_then(|row| row.get(slot))
            .is_some_and(|offset| *offset != 0.0)
    }

    /// Horizontal span of the free groups sharing `group`'s row, as if
    /// `group` started at `x`.
    pub fn row_span_with(&self, group: usize, x: f32) -> f32 {
        let Some(moving) = self.placement(group) else {
            return 0.0;
        };
        let mut min_x = f32::INFINITY;
        let mut max_x = f32::NEG_INFINITY;
        for (idx, placement) in self.placements.iter().enumerate() {
            let Some(placement) = placement else {
                continue;
            };
            if placement.pinned || placement.y != moving.y {
                continue;
            }
            let start = if idx == group { x } else { placement.x };
            let width = self.group(idx).width(self.config.within_group_spacing);
            min_x = min_x.min(start);
            max_x = max_x.max(start + width);
        }
        if min_x.is_finite() { max_x - min_x } else { 0.0 }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            placements: self.placements.clone(),
            offsets: self.offsets.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: Snapshot) {
        self.placements = snapshot.placements;
        self.offsets = snapshot.offsets;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Element;

    fn spec() -> Spec {
        let mut spec = Spec::new();
        spec.add_group(
            Group::new(
                "group_0",
                vec![
                    Element::parse("P4"),
                    Element::parse("+"),
                    Element::parse("P5"),
                ],
            )
            .with_underline(true),
        );
        spec.add_group(Group::singleton("C"));
        spec.add_link("group_0", "C");
        spec
    }

    fn close(a: (f32, f32), b: (f32, f32)) -> bool {
        (a.0 - b.0).abs() < 1e-4 && (a.1 - b.1).abs() < 1e-4
    }

    fn placed(layer: usize, x: f32, y: f32) -> GroupPlacement {
        GroupPlacement {
            layer,
            x,
            y,
            pinned: false,
        }
    }

    #[test]
    fn underlined_source_anchors_below_center() {
        let spec = spec();
        let config = LayoutConfig::default();
        let mut state = LayoutState::new(&spec, &config);
        state.place(0, placed(1, 0.0, 1.0));
        state.place(1, placed(0, 2.5, 0.0));
        let arrows = state.arrows();
        assert_eq!(arrows.len(), 1);
        assert!(close(arrows[0].from, (2.5, 0.7)));
        assert!(close(arrows[0].to, (2.5, 0.0)));
        assert!(arrows[0].source_anchored);
        assert_eq!(arrows[0].source_slot, 1);
    }

    #[test]
    fn separators_get_no_text_box() {
        let spec = spec();
        let config = LayoutConfig::default();
        let mut state = LayoutState::new(&spec, &config);
        state.place(0, placed(1, 0.0, 1.0));
        let labels: Vec<String> = state.text_boxes().into_iter().map(|b| b.label).collect();
        assert_eq!(labels, vec!["P4".to_string(), "P5".to_string()]);
    }

    #[test]
    fn pinned_groups_refuse_moves() {
        let spec = spec();
        let config = LayoutConfig::default();
        let mut state = LayoutState::new(&spec, &config);
        state.place(
            0,
            GroupPlacement {
                pinned: true,
                ..placed(1, 0.0, 1.0)
            },
        );
        state.place(1, placed(0, 0.0, 0.0));
        assert!(!state.shift_group(0, 1.0));
        assert!(!state.stagger(0, 0, 0.3));
        assert!(state.shift_group(1, 1.0));
        assert_eq!(state.placement(1).map(|p| p.x), Some(1.0));
    }

    #[test]
    fn snapshot_round_trip_restores_positions() {
        let spec = spec();
        let config = LayoutConfig::default();
        let mut state = LayoutState::new(&spec, &config);
        state.place(1, placed(0, 0.0, 0.0));
        let saved = state.snapshot();
        state.shift_group(1, 3.0);
        state.stagger(1, 0, 0.3);
        assert!(state.is_staggered(1, 0));
        state.restore(saved);
        assert_eq!(state.slot_position(1, 0), Some((0.0, 0.0)));
    }

    #[test]
    fn row_span_accounts_for_group_width() {
        let spec = spec();
        let config = LayoutConfig::default();
        let mut state = LayoutState::new(&spec, &config);
        state.place(0, placed(0, 0.0, 0.0));
        state.place(1, placed(0, 7.6, 0.0));
        assert!((state.row_span_with(1, 7.6) - 7.6).abs() < 1e-4);
        assert!((state.row_span_with(0, -2.0) - 9.6).abs() < 1e-4);
    }
}
