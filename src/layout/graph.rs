use std::collections::{BTreeMap, HashMap};

use crate::ir::Link;

/// Element-level adjacency plus group-level dependencies derived from it.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    pub outgoing: BTreeMap<String, Vec<String>>,
    pub incoming: BTreeMap<String, Vec<String>>,
    /// Group names: declared groups first, then implicit singletons.
    pub groups: Vec<String>,
    /// `(upper, lower)` group indices; `upper` must sit strictly above `lower`.
    pub dependencies: Vec<(usize, usize)>,
    index: HashMap<String, usize>,
    element_groups: HashMap<String, String>,
}

impl DependencyGraph {
    pub fn build(
        group_names: &[String],
        element_groups: &HashMap<String, String>,
        links: &[Link],
    ) -> Self {
        let mut graph = DependencyGraph {
            element_groups: element_groups.clone(),
            ..Default::default()
        };
        for name in group_names {
            graph.intern(name);
        }

        for link in links {
            graph
                .outgoing
                .entry(link.source.clone())
                .or_default()
                .push(link.target.clone());
            graph
                .incoming
                .entry(link.target.clone())
                .or_default()
                .push(link.source.clone());

            let upper_name = graph.group_of(&link.source).to_string();
            let lower_name = graph.group_of(&link.target).to_string();
            let upper = graph.intern(&upper_name);
            let lower = graph.intern(&lower_name);
            if upper != lower && !graph.dependencies.contains(&(upper, lower)) {
                graph.dependencies.push((upper, lower));
            }
        }
        graph
    }

    fn intern(&mut self, name: &str) -> usize {
        if let Some(idx) = self.index.get(name) {
            return *idx;
        }
        let idx = self.groups.len();
        self.groups.push(name.to_string());
        self.index.insert(name.to_string(), idx);
        idx
    }

    /// Group that owns `name`; unknown names stand for themselves.
    pub fn group_of<'a>(&'a self, name: &'a str) -> &'a str {
        self.element_groups
            .get(name)
            .map(String::as_str)
            .unwrap_or(name)
    }

    /// Groups directly below `group`.
    pub fn targets_of(&self, group: usize) -> impl Iterator<Item = usize> + '_ {
        self.dependencies
            .iter()
            .filter(move |(upper, _)| *upper == group)
            .map(|(_, lower)| *lower)
    }

    /// Whether any element of the group, or the group itself, is a link target.
    pub fn has_inbound(&self, group: &str) -> bool {
        self.incoming
            .keys()
            .any(|target| target == group || self.group_of(target) == group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn owners(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(e, g)| (e.to_string(), g.to_string()))
            .collect()
    }

    #[test]
    fn builds_forward_and_reverse_maps() {
        let links = vec![Link::new("A", "B"), Link::new("C", "B")];
        let graph = DependencyGraph::build(
            &names(&["A", "B", "C"]),
            &owners(&[("A", "A"), ("B", "B"), ("C", "C")]),
            &links,
        );
        assert_eq!(graph.outgoing["A"], vec!["B".to_string()]);
        assert_eq!(graph.incoming["B"], names(&["A", "C"]));
        assert_eq!(graph.dependencies, vec![(0, 1), (2, 1)]);
        assert!(graph.has_inbound("B"));
        assert!(!graph.has_inbound("A"));
    }

    #[test]
    fn links_inside_a_group_add_no_dependency() {
        let links = vec![Link::new("P1", "P2"), Link::new("P1", "X")];
        let graph = DependencyGraph::build(
            &names(&["g", "X"]),
            &owners(&[("P1", "g"), ("P2", "g"), ("X", "X")]),
            &links,
        );
        assert_eq!(graph.dependencies, vec![(0, 1)]);
    }

    #[test]
    fn unmapped_element_becomes_its_own_group() {
        let links = vec![Link::new("A", "ghost")];
        let graph = DependencyGraph::build(&names(&["A"]), &owners(&[("A", "A")]), &links);
        assert_eq!(graph.groups, names(&["A", "ghost"]));
        assert_eq!(graph.group_of("ghost"), "ghost");
        assert_eq!(graph.dependencies, vec![(0, 1)]);
    }

    #[test]
    fn duplicate_group_edges_are_collapsed() {
        let links = vec![Link::new("P1", "X"), Link::new("P2", "X")];
        let graph = DependencyGraph::build(
            &names(&["g", "X"]),
            &owners(&[("P1", "g"), ("P2", "g"), ("X", "X")]),
            &links,
        );
        assert_eq!(graph.dependencies.len(), 1);
        assert_eq!(graph.targets_of(0).collect::<Vec<_>>(), vec![1]);
    }
}
