use log::{debug, warn};

use super::graph::DependencyGraph;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layering {
    /// Layer of each graph group, indexed like `DependencyGraph::groups`.
    pub layers: Vec<usize>,
    /// Group indices per layer, in declaration order.
    pub buckets: Vec<Vec<usize>>,
    /// Groups on a dependency cycle, forced onto layer 0.
    pub unresolved: Vec<usize>,
}

impl Layering {
    pub fn is_unresolved(&self, group: usize) -> bool {
        self.unresolved.contains(&group)
    }
}

/// Longest-path layering: groups with no lower dependency sit on layer 0,
/// every other group one above the highest group it links down to.
pub(super) fn assign_layers(graph: &DependencyGraph) -> Layering {
    let count = graph.groups.len();
    let targets: Vec<Vec<usize>> = (0..count)
        .map(|group| graph.targets_of(group).collect())
        .collect();

    let mut layers: Vec<Option<usize>> = targets
        .iter()
        .map(|lower| if lower.is_empty() { Some(0) } else { None })
        .collect();
    relax(&targets, &mut layers);

    // Only cycle members are forced down; groups above them are layered
    // normally once the cycle has a layer.
    let unresolved: Vec<usize> = (0..count)
        .filter(|idx| layers[*idx].is_none() && on_cycle(&targets, &layers, *idx))
        .collect();
    if !unresolved.is_empty() {
        let names: Vec<&str> = unresolved
            .iter()
            .map(|idx| graph.groups[*idx].as_str())
            .collect();
        warn!("cyclic dependencies: placing {names:?} on layer 0");
        for idx in &unresolved {
            layers[*idx] = Some(0);
        }
        relax(&targets, &mut layers);
    }

    let layers: Vec<usize> = layers.into_iter().map(|layer| layer.unwrap_or(0)).collect();
    let depth = layers.iter().copied().max().map_or(0, |max| max + 1);
    let mut buckets = vec![Vec::new(); depth];
    for (group, layer) in layers.iter().enumerate() {
        buckets[*layer].push(group);
    }
    debug!("assigned {count} groups to {depth} layers");

    Layering {
        layers,
        buckets,
        unresolved,
    }
}

/// Repeats passes in declaration order until no group becomes ready. A
/// group is ready once every group it links down to has a layer.
fn relax(targets: &[Vec<usize>], layers: &mut [Option<usize>]) {
    loop {
        let mut changed = false;
        for group in 0..targets.len() {
            if layers[group].is_some() {
                continue;
            }
            let mut highest = 0usize;
            let mut ready = true;
            for lower in &targets[group] {
                match layers[*lower] {
                    Some(layer) => highest = highest.max(layer),
                    None => {
                        ready = false;
                        break;
                    }
                }
            }
            if ready {
                layers[group] = Some(highest + 1);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

/// Whether `start` can reach itself through groups that are still unlayered.
fn on_cycle(targets: &[Vec<usize>], layers: &[Option<usize>], start: usize) -> bool {
    let mut seen = vec![false; targets.len()];
    let mut stack: Vec<usize> = targets[start].clone();
    while let Some(group) = stack.pop() {
        if group == start {
            return true;
        }
        if seen[group] || layers[group].is_some() {
            continue;
        }
        seen[group] = true;
        stack.extend(targets[group].iter().copied());
    }
    false
}
