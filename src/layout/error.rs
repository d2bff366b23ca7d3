use crate::ir::SpecError;

use super::types::LinkIssue;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("invalid diagram: {0}")]
    InvalidSpec(#[from] SpecError),
    #[error("layout produced {} non-downward arrow(s): {}", .arrows.len(), describe(.arrows))]
    NonDownwardArrows { arrows: Vec<LinkIssue> },
}

fn describe(arrows: &[LinkIssue]) -> String {
    arrows
        .iter()
        .map(|issue| {
            format!(
                "{} (y={}) -> {} (y={})",
                issue.source, issue.source_y, issue.target, issue.target_y
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}
