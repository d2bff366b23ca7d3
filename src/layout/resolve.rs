use std::collections::HashSet;

use log::{debug, info};
use serde::Serialize;

use super::geometry::{
    Arrow, ArrowCrossing, ArrowThroughText, ConflictCounts, Conflicts, TextOverlap,
};
use super::graph::DependencyGraph;
use super::state::LayoutState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOutcome {
    /// Nothing to resolve.
    Clean,
    /// Every conflict was removed.
    Resolved,
    /// A full pass could not move anything.
    Stalled,
    /// Conflicts grew past the escalation ratio.
    Escalated,
    /// Iteration budget ran out with conflicts left.
    BudgetExhausted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionReport {
    pub iterations: usize,
    pub initial: ConflictCounts,
    #[serde(rename = "final")]
    pub final_counts: ConflictCounts,
    /// Moves present in the returned layout; moves from passes that were
    /// rolled back are not counted.
    pub moves: usize,
    pub outcome: ResolutionOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConflictClass {
    TextOverlap,
    ArrowCrossing,
    ArrowThroughText,
}

const CLASS_PRIORITY: [ConflictClass; 3] = [
    ConflictClass::TextOverlap,
    ConflictClass::ArrowCrossing,
    ConflictClass::ArrowThroughText,
];

/// Per-iteration bookkeeping: each group moves at most once.
struct Pass<'s, 'a> {
    state: &'s mut LayoutState<'a>,
    graph: &'s DependencyGraph,
    touched: HashSet<usize>,
    moves: usize,
}

impl Pass<'_, '_> {
    fn can_move(&self, group: usize) -> bool {
        !self.touched.contains(&group) && !self.state.is_pinned(group)
    }

    /// Shifts a group when it is free, untouched and its row stays in bounds.
    fn try_shift(&mut self, group: usize, dx: f32) -> bool {
        if !self.can_move(group) {
            return false;
        }
        let Some(placement) = self.state.placement(group).copied() else {
            return false;
        };
        let max_x = self.state.config().max_x_position;
        let before = self.state.row_span_with(group, placement.x);
        let after = self.state.row_span_with(group, placement.x + dx);
        if after > max_x.max(before) {
            debug!(
                "not moving {}: row span would reach {after:.2}",
                self.state.group(group).name
            );
            return false;
        }
        if self.state.shift_group(group, dx) {
            debug!("moved {} by {dx:+.2}", self.state.group(group).name);
            self.touched.insert(group);
            self.moves += 1;
            return true;
        }
        false
    }

    fn try_stagger(&mut self, group: usize, slot: usize, dy: f32) -> bool {
        if !self.can_move(group) || self.state.is_staggered(group, slot) {
            return false;
        }
        if self.state.stagger(group, slot, dy) {
            debug!(
                "staggered slot {slot} of {} by {dy:+.2}",
                self.state.group(group).name
            );
            self.touched.insert(group);
            self.moves += 1;
            return true;
        }
        false
    }

    fn group_index(&self, name: &str) -> Option<usize> {
        self.state.spec().group_index(name)
    }

    fn fix_overlaps(&mut self, overlaps: &[TextOverlap]) -> bool {
        let delta = self.state.config().resolve.overlap_shift;
        let mut moved = false;
        for overlap in overlaps {
            let (Some(first), Some(second)) = (
                self.group_index(&overlap.first_group),
                self.group_index(&overlap.second_group),
            ) else {
                continue;
            };
            if first == second {
                continue;
            }
            let first_is_left = overlap.first_at.0 < overlap.second_at.0
                || (overlap.first_at.0 == overlap.second_at.0 && first < second);
            let (left, right) = if first_is_left {
                (first, second)
            } else {
                (second, first)
            };
            moved |= self.try_shift(right, delta) || self.try_shift(left, -delta);
        }
        moved
    }

    fn fix_crossings(&mut self, crossings: &[ArrowCrossing], arrows: &[Arrow]) -> bool {
        let delta = self.state.config().resolve.crossing_shift;
        let mut moved = false;
        for crossing in crossings {
            let (Some(a), Some(b)) = (arrows.get(crossing.first), arrows.get(crossing.second))
            else {
                continue;
            };
            let (Some(ga), Some(gb)) = (
                self.group_index(&a.source_group),
                self.group_index(&b.source_group),
            ) else {
                continue;
            };
            if ga == gb {
                continue;
            }
            let (left, right) = if a.from.0 <= b.from.0 { (ga, gb) } else { (gb, ga) };
            match (self.can_move(left), self.can_move(right)) {
                (true, true) => {
                    let moved_left = self.try_shift(left, -delta);
                    let moved_right = self.try_shift(right, delta);
                    moved |= moved_left || moved_right;
                }
                (true, false) => moved |= self.try_shift(left, -delta),
                (false, true) => moved |= self.try_shift(right, delta),
                (false, false) => {}
            }
        }
        moved
    }

    fn fix_obstructions(
        &mut self,
        hits: &[ArrowThroughText],
        arrows: &[Arrow],
    ) -> bool {
        let config = &self.state.config().resolve;
        let (stagger, plain, inbound) = (
            config.stagger,
            config.obstruction_shift,
            config.obstruction_shift_inbound,
        );
        let mut moved = false;
        for hit in hits {
            let Some(arrow) = arrows.get(hit.arrow) else {
                continue;
            };
            let Some(group) = self.group_index(&hit.group) else {
                continue;
            };
            if hit.group == arrow.source_group {
                moved |= self.try_stagger(group, hit.slot, stagger);
                continue;
            }
            let delta = if self.graph.has_inbound(&hit.group) {
                inbound
            } else {
                plain
            };
            let direction = if hit.at.0 >= arrow.x_at(hit.at.1) { 1.0 } else { -1.0 };
            moved |= self.try_shift(group, direction * delta)
                || self.try_shift(group, -direction * delta);
        }
        moved
    }
}

/// Repositions groups to reduce conflicts. Each iteration works on one
/// conflict class, the highest-priority one that allows a move. The
/// best state seen is kept, so the result never has more conflicts than
/// the input.
pub(super) fn resolve_conflicts(
    state: &mut LayoutState<'_>,
    graph: &DependencyGraph,
) -> (Conflicts, ResolutionReport) {
    let config = state.config().resolve.clone();
    let mut conflicts = state.detect();
    let initial = conflicts.counts();
    info!(
        "initial conflicts: {} overlaps, {} crossings, {} arrows through text",
        initial.text_overlaps, initial.arrow_crossings, initial.arrow_through_text
    );

    let mut best_total = initial.total();
    let mut best = (state.snapshot(), conflicts.clone());
    let mut kept_moves = 0usize;
    let mut previous_total = initial.total();
    let mut iterations = 0usize;
    let mut moves = 0usize;
    let mut outcome = None;

    if initial.total() == 0 {
        outcome = Some(ResolutionOutcome::Clean);
    }

    while outcome.is_none() && iterations < config.max_iterations {
        iterations += 1;
        let arrows = state.arrows();
        let mut pass = Pass {
            state: &mut *state,
            graph,
            touched: HashSet::new(),
            moves: 0,
        };
        let mut moved = false;
        for class in CLASS_PRIORITY {
            moved = match class {
                ConflictClass::TextOverlap => pass.fix_overlaps(&conflicts.text_overlaps),
                ConflictClass::ArrowCrossing => {
                    pass.fix_crossings(&conflicts.arrow_crossings, &arrows)
                }
                ConflictClass::ArrowThroughText => {
                    pass.fix_obstructions(&conflicts.arrow_through_text, &arrows)
                }
            };
            if moved {
                debug!("iteration {iterations}: worked on {class:?}");
                break;
            }
        }
        moves += pass.moves;
        if !moved {
            outcome = Some(ResolutionOutcome::Stalled);
            break;
        }

        conflicts = state.detect();
        let total = conflicts.total();
        debug!("iteration {iterations}: {total} conflicts remain");
        if total < best_total {
            best_total = total;
            best = (state.snapshot(), conflicts.clone());
            kept_moves = moves;
        }
        if total == 0 {
            outcome = Some(ResolutionOutcome::Resolved);
        } else if total as f32 > previous_total as f32 * config.escalation_ratio {
            outcome = Some(ResolutionOutcome::Escalated);
        }
        previous_total = total;
    }

    let (snapshot, best_conflicts) = best;
    state.restore(snapshot);
    let outcome = outcome.unwrap_or(ResolutionOutcome::BudgetExhausted);
    let report = ResolutionReport {
        iterations,
        initial,
        final_counts: best_conflicts.counts(),
        moves: kept_moves,
        outcome,
    };
    info!(
        "conflict resolution {:?} after {} iterations: {} -> {} conflicts, {} of {} moves kept",
        report.outcome,
        report.iterations,
        report.initial.total(),
        report.final_counts.total(),
        report.moves,
        moves
    );
    (best_conflicts, report)
}
