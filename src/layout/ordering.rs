use log::debug;

use super::geometry::count_crossings;
use super::rows::{RowItem, RowPlan, plan_rows};
use super::state::{GroupPlacement, LayoutState};

/// Median x of the already placed endpoints the group links down to.
pub(super) fn target_x(state: &LayoutState<'_>, group: usize) -> Option<f32> {
    let mut values: Vec<f32> = state
        .links()
        .iter()
        .filter(|link| link.source.group() == group && link.target.group() != group)
        .filter_map(|link| state.anchor(link.target, false).map(|(x, _)| x))
        .collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) * 0.5)
    }
}

/// Chooses a left-to-right order for one layer. Small layers try every
/// permutation and keep the first with the fewest crossings; larger ones
/// are sorted by target position.
pub(super) fn order_layer(state: &LayoutState<'_>, groups: &[usize], base_y: f32) -> Vec<usize> {
    if groups.len() <= 1 {
        return groups.to_vec();
    }
    let targets: Vec<Option<f32>> = groups.iter().map(|g| target_x(state, *g)).collect();
    if targets.iter().all(Option::is_none) {
        return groups.to_vec();
    }

    let limit = state.config().exhaustive_order_limit;
    if groups.len() <= limit {
        return exhaustive_order(state, groups, &targets, base_y);
    }

    debug!(
        "layer at y={base_y}: {} groups exceed exhaustive limit {limit}, sorting by target",
        groups.len()
    );
    let mut indexed: Vec<usize> = (0..groups.len()).collect();
    indexed.sort_by(|a, b| match (targets[*a], targets[*b]) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    indexed.into_iter().map(|idx| groups[idx]).collect()
}

fn exhaustive_order(
    state: &LayoutState<'_>,
    groups: &[usize],
    targets: &[Option<f32>],
    base_y: f32,
) -> Vec<usize> {
    let existing = state.arrows();
    let mut scratch = state.clone();
    let mut perm: Vec<usize> = (0..groups.len()).collect();
    let mut best = perm.clone();
    let mut best_count = usize::MAX;
    let mut evaluated = 0usize;

    loop {
        let order: Vec<usize> = perm.iter().map(|idx| groups[*idx]).collect();
        let order_targets: Vec<Option<f32>> = perm.iter().map(|idx| targets[*idx]).collect();
        apply_plan(&mut scratch, &order, &order_targets, base_y, 0);
        let count = count_crossings(&scratch.arrows_from(&order), &existing);
        evaluated += 1;
        if count < best_count {
            best_count = count;
            best = perm.clone();
            if count == 0 {
                break;
            }
        }
        if !next_permutation(&mut perm) {
            break;
        }
    }

    debug!(
        "layer at y={base_y}: {evaluated} orders tried, best has {best_count} crossings"
    );
    best.into_iter().map(|idx| groups[idx]).collect()
}

/// Runs row planning for `order` and writes the result into `state`.
pub(super) fn apply_plan(
    state: &mut LayoutState<'_>,
    order: &[usize],
    targets: &[Option<f32>],
    base_y: f32,
    layer: usize,
) -> RowPlan {
    let spacing = state.config().within_group_spacing;
    let items: Vec<RowItem> = order
        .iter()
        .zip(targets)
        .map(|(group, target_x)| RowItem {
            width: state.group(*group).width(spacing),
            target_x: *target_x,
        })
        .collect();
    let plan = plan_rows(&items, base_y, state.config());
    for (group, slot) in order.iter().zip(&plan.slots) {
        state.place(
            *group,
            GroupPlacement {
                layer,
                x: slot.x,
                y: slot.y,
                pinned: false,
            },
        );
    }
    plan
}

/// Advances to the next lexicographic permutation; false once exhausted.
fn next_permutation(perm: &mut [usize]) -> bool {
    if perm.len() < 2 {
        return false;
    }
    let mut i = perm.len() - 1;
    while i > 0 && perm[i - 1] >= perm[i] {
        i -= 1;
    }
    if i == 0 {
        return false;
    }
    let mut j = perm.len() - 1;
    while perm[j] <= perm[i - 1] {
        j -= 1;
    }
    perm.swap(i - 1, j);
    perm[i..].reverse();
    true
}
