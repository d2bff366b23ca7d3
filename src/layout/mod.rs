mod error;
mod geometry;
mod graph;
mod ordering;
mod ranking;
mod resolve;
mod rows;
mod state;
pub(crate) mod types;
pub use types::*;
use ordering::*;
use ranking::*;
use resolve::*;
use state::*;

pub use error::LayoutError;
pub use geometry::{
    Arrow, ArrowCrossing, ArrowThroughText, ConflictCounts, Conflicts, TextBox, TextOverlap,
    detect_conflicts, segment_crossing, segment_intersects_box,
};
pub use graph::DependencyGraph;
pub use ranking::Layering;
pub use resolve::{ResolutionOutcome, ResolutionReport};

use crate::config::LayoutConfig;
use crate::ir::Spec;
use log::{debug, info, warn};

/// Lays out a diagram: layering, per-layer ordering with row wrapping,
/// then conflict resolution. Fails on an invalid diagram or if any arrow
/// ends up pointing upward.
pub fn compute_layout(spec: &Spec, config: &LayoutConfig) -> Result<Layout, LayoutError> {
    spec.validate()?;

    let group_names: Vec<String> = spec.groups.iter().map(|g| g.name.clone()).collect();
    let graph = DependencyGraph::build(&group_names, &spec.element_groups(), &spec.links);
    let layering = assign_layers(&graph);
    let mut state = LayoutState::new(spec, config);

    for (idx, group) in spec.groups.iter().enumerate() {
        if let Some((x, y)) = group.override_position {
            state.place(
                idx,
                GroupPlacement {
                    layer: layering.layers[idx],
                    x,
                    y,
                    pinned: true,
                },
            );
        }
    }

    let mut base_y = 0.0f32;
    for (layer, bucket) in layering.buckets.iter().enumerate() {
        let free: Vec<usize> = bucket
            .iter()
            .copied()
            .filter(|group| *group < spec.groups.len() && !state.is_pinned(*group))
            .collect();
        if free.is_empty() {
            continue;
        }
        let order = ordering::order_layer(&state, &free, base_y);
        let targets: Vec<Option<f32>> = order.iter().map(|g| target_x(&state, *g)).collect();
        let plan = apply_plan(&mut state, &order, &targets, base_y, layer);
        debug!(
            "layer {layer}: {} groups on {} row(s) from y={base_y}",
            order.len(),
            plan.rows
        );
        base_y += plan.rows as f32;
    }

    let (conflicts, resolution) = resolve_conflicts(&mut state, &graph);
    let exempt_upward_links = check_downward(&state, &layering)?;

    let mut groups = Vec::with_capacity(spec.groups.len());
    let mut nodes = Vec::new();
    for (idx, group) in spec.groups.iter().enumerate() {
        let Some(placement) = state.placement(idx).copied() else {
            continue;
        };
        for (slot, element) in group.elements.iter().enumerate() {
            let Some((x, y)) = state.slot_position(idx, slot) else {
                continue;
            };
            nodes.push(NodeLayout {
                group: group.name.clone(),
                slot,
                element: element.clone(),
                x,
                y,
            });
        }
        groups.push(GroupLayout {
            name: group.name.clone(),
            layer: layering.layers[idx],
            x: placement.x,
            y: placement.y,
            width: group.width(config.within_group_spacing),
            elements: group.elements.clone(),
            underline: group.underline,
            pinned: placement.pinned,
        });
    }

    let residual = conflicts.counts();
    if residual.total() > 0 {
        warn!(
            "{} conflicts left: {} overlaps, {} crossings, {} arrows through text",
            residual.total(),
            residual.text_overlaps,
            residual.arrow_crossings,
            residual.arrow_through_text
        );
    }
    let diagnostics = Diagnostics {
        unresolved_groups: layering
            .unresolved
            .iter()
            .map(|idx| graph.groups[*idx].clone())
            .collect(),
        exempt_upward_links,
        residual,
    };
    info!(
        "layout done: {} groups, {} nodes, {} arrows",
        groups.len(),
        nodes.len(),
        spec.links.len()
    );

    Ok(Layout {
        groups,
        nodes,
        arrows: state.arrows(),
        conflicts,
        resolution,
        diagnostics,
    })
}

/// Every link must point strictly down. Links that stay inside one group
/// or touch a pinned or cyclic group are exempt and returned for reporting.
fn check_downward(
    state: &LayoutState<'_>,
    layering: &Layering,
) -> Result<Vec<LinkIssue>, LayoutError> {
    let mut fatal = Vec::new();
    let mut exempt = Vec::new();
    for link in state.links() {
        let (Some(from), Some(to)) = (
            state.anchor(link.source, false),
            state.anchor(link.target, false),
        ) else {
            continue;
        };
        if from.1 > to.1 {
            continue;
        }
        let raw = &state.spec().links[link.index];
        let issue = LinkIssue {
            source: raw.source.clone(),
            target: raw.target.clone(),
            source_y: from.1,
            target_y: to.1,
        };
        let (source_group, target_group) = (link.source.group(), link.target.group());
        let excused = source_group == target_group
            || [source_group, target_group]
                .iter()
                .any(|g| state.is_pinned(*g) || layering.is_unresolved(*g));
        if excused {
            warn!("link {} -> {} does not point down", issue.source, issue.target);
            exempt.push(issue);
        } else {
            fatal.push(issue);
        }
    }
    if fatal.is_empty() {
        Ok(exempt)
    } else {
        Err(LayoutError::NonDownwardArrows { arrows: fatal })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Element, Group};

    fn chain() -> Spec {
        let mut spec = Spec::new();
        for name in ["A", "B", "C"] {
            spec.add_group(Group::singleton(name));
        }
        spec.add_link("A", "B");
        spec.add_link("B", "C");
        spec
    }

    #[test]
    fn chain_points_down_without_conflicts() {
        let layout = compute_layout(&chain(), &LayoutConfig::default()).unwrap();
        let coords = layout.coordinates();
        assert!(coords["A"].1 > coords["B"].1);
        assert!(coords["B"].1 > coords["C"].1);
        assert_eq!(layout.resolution.initial.total(), 0);
        assert_eq!(layout.resolution.outcome, ResolutionOutcome::Clean);
        assert_eq!(layout.arrows.len(), 2);
    }

    #[test]
    fn invalid_spec_is_rejected_before_layout() {
        let mut spec = chain();
        spec.add_group(Group::new("dup", vec![Element::parse("A")]));
        assert!(matches!(
            compute_layout(&spec, &LayoutConfig::default()),
            Err(LayoutError::InvalidSpec(_))
        ));
    }

    #[test]
    fn cyclic_groups_are_reported_not_fatal() {
        let mut spec = Spec::new();
        spec.add_group(Group::singleton("A"));
        spec.add_group(Group::singleton("B"));
        spec.add_group(Group::singleton("C"));
        spec.add_link("A", "B");
        spec.add_link("B", "A");
        let layout = compute_layout(&spec, &LayoutConfig::default()).unwrap();
        assert_eq!(
            layout.diagnostics.unresolved_groups,
            vec!["A".to_string(), "B".to_string()]
        );
        assert_eq!(layout.diagnostics.exempt_upward_links.len(), 2);
        assert!(layout.diagnostics.has_warnings());
    }

    #[test]
    fn groups_above_a_cycle_stay_above_it() {
        let mut spec = Spec::new();
        for name in ["A", "B", "C", "D"] {
            spec.add_group(Group::singleton(name));
        }
        spec.add_link("A", "B");
        spec.add_link("B", "A");
        spec.add_link("C", "A");
        spec.add_link("D", "C");
        let layout = compute_layout(&spec, &LayoutConfig::default()).unwrap();
        let coords = layout.coordinates();
        assert!(coords["D"].1 > coords["C"].1);
        assert!(coords["C"].1 > coords["A"].1);
        assert_eq!(layout.group("C").unwrap().layer, 1);
        assert_eq!(layout.group("D").unwrap().layer, 2);
        assert_eq!(
            layout.diagnostics.unresolved_groups,
            vec!["A".to_string(), "B".to_string()]
        );
        let exempt: Vec<(&str, &str)> = layout
            .diagnostics
            .exempt_upward_links
            .iter()
            .map(|issue| (issue.source.as_str(), issue.target.as_str()))
            .collect();
        assert!(!exempt.contains(&("D", "C")));
        assert!(!exempt.contains(&("C", "A")));
    }

    #[test]
    fn pinned_group_keeps_its_position() {
        let mut spec = chain();
        spec.groups[0] = Group::singleton("A").pinned_at(7.0, 5.0);
        let layout = compute_layout(&spec, &LayoutConfig::default()).unwrap();
        let a = layout.group("A").unwrap();
        assert_eq!((a.x, a.y), (7.0, 5.0));
        assert!(a.pinned);
    }

    #[test]
    fn upward_arrow_is_fatal() {
        let spec = chain();
        let config = LayoutConfig::default();
        let mut state = LayoutState::new(&spec, &config);
        for (idx, y) in [(0, 0.0), (1, 1.0), (2, 0.0)] {
            state.place(
                idx,
                GroupPlacement {
                    layer: 0,
                    x: idx as f32 * 3.0,
                    y,
                    pinned: false,
                },
            );
        }
        let layering = Layering {
            layers: vec![0, 0, 0],
            buckets: vec![vec![0, 1, 2]],
            unresolved: Vec::new(),
        };
        match check_downward(&state, &layering) {
            Err(LayoutError::NonDownwardArrows { arrows }) => {
                assert_eq!(arrows.len(), 1);
                assert_eq!(arrows[0].source, "A");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
