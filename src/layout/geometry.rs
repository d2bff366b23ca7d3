use crate::config::LayoutConfig;
use serde::Serialize;

const EPS: f32 = 1e-6;

/// Axis-aligned label box centered on an element's coordinate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextBox {
    pub label: String,
    pub group: String,
    pub slot: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl TextBox {
    pub fn min_x(&self) -> f32 {
        self.x - self.width / 2.0
    }

    pub fn max_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn min_y(&self) -> f32 {
        self.y - self.height / 2.0
    }

    pub fn max_y(&self) -> f32 {
        self.y + self.height / 2.0
    }
}

/// A drawn link: a straight segment between two anchors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Arrow {
    pub source: String,
    pub target: String,
    pub source_group: String,
    pub source_slot: usize,
    /// Source is the group's center anchor rather than an element.
    pub source_anchored: bool,
    pub target_group: String,
    pub target_slot: usize,
    pub target_anchored: bool,
    pub from: (f32, f32),
    pub to: (f32, f32),
}

impl Arrow {
    fn shares_endpoint(&self, other: &Arrow) -> bool {
        let ends = [
            (&self.source_group, self.source_slot, &self.source),
            (&self.target_group, self.target_slot, &self.target),
        ];
        let other_ends = [
            (&other.source_group, other.source_slot, &other.source),
            (&other.target_group, other.target_slot, &other.target),
        ];
        ends.iter().any(|(group, slot, name)| {
            other_ends.iter().any(|(other_group, other_slot, other_name)| {
                name == other_name || (group == other_group && slot == other_slot)
            })
        })
    }

    /// True when the box belongs to this arrow's own endpoints.
    fn owns(&self, text: &TextBox) -> bool {
        let touches = |group: &String, slot: usize, anchored: bool| {
            *group == text.group && (anchored || slot == text.slot)
        };
        touches(&self.source_group, self.source_slot, self.source_anchored)
            || touches(&self.target_group, self.target_slot, self.target_anchored)
    }

    /// Horizontal position of the segment at height `y`, clamped to its ends.
    pub fn x_at(&self, y: f32) -> f32 {
        let (x1, y1) = self.from;
        let (x2, y2) = self.to;
        if (y2 - y1).abs() <= EPS {
            return (x1 + x2) / 2.0;
        }
        let t = ((y - y1) / (y2 - y1)).clamp(0.0, 1.0);
        x1 + t * (x2 - x1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextOverlap {
    pub first: String,
    pub first_group: String,
    pub second: String,
    pub second_group: String,
    pub first_at: (f32, f32),
    pub second_at: (f32, f32),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrowCrossing {
    pub first: usize,
    pub second: usize,
    pub first_link: (String, String),
    pub second_link: (String, String),
    pub point: (f32, f32),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrowThroughText {
    pub arrow: usize,
    pub link: (String, String),
    pub element: String,
    pub group: String,
    pub slot: usize,
    pub at: (f32, f32),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConflictCounts {
    pub text_overlaps: usize,
    pub arrow_crossings: usize,
    pub arrow_through_text: usize,
}

impl ConflictCounts {
    pub fn total(&self) -> usize {
        self.text_overlaps + self.arrow_crossings + self.arrow_through_text
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Conflicts {
    pub text_overlaps: Vec<TextOverlap>,
    pub arrow_crossings: Vec<ArrowCrossing>,
    pub arrow_through_text: Vec<ArrowThroughText>,
}

impl Conflicts {
    pub fn counts(&self) -> ConflictCounts {
        ConflictCounts {
            text_overlaps: self.text_overlaps.len(),
            arrow_crossings: self.arrow_crossings.len(),
            arrow_through_text: self.arrow_through_text.len(),
        }
    }

    pub fn total(&self) -> usize {
        self.counts().total()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Runs all three checks over finalized boxes and arrows.
pub fn detect_conflicts(boxes: &[TextBox], arrows: &[Arrow], config: &LayoutConfig) -> Conflicts {
    Conflicts {
        text_overlaps: text_overlaps(boxes, config),
        arrow_crossings: arrow_crossings(arrows),
        arrow_through_text: arrows_through_text(arrows, boxes),
    }
}

pub fn text_overlaps(boxes: &[TextBox], config: &LayoutConfig) -> Vec<TextOverlap> {
    let mut out = Vec::new();
    for (idx, a) in boxes.iter().enumerate() {
        for b in &boxes[idx + 1..] {
            if boxes_conflict(a, b, config) {
                out.push(TextOverlap {
                    first: a.label.clone(),
                    first_group: a.group.clone(),
                    second: b.label.clone(),
                    second_group: b.group.clone(),
                    first_at: (a.x, a.y),
                    second_at: (b.x, b.y),
                });
            }
        }
    }
    out
}

fn boxes_conflict(a: &TextBox, b: &TextBox, config: &LayoutConfig) -> bool {
    let dx = (a.x - b.x).abs();
    let dy = (a.y - b.y).abs();
    if dx < config.coincident_tolerance && dy < config.coincident_tolerance {
        return true;
    }
    let reach_x = (a.width + b.width) / 2.0 + config.text_gap;
    let reach_y = (a.height + b.height) / 2.0 + config.text_gap;
    dx < reach_x && dy < reach_y
}

pub fn arrow_crossings(arrows: &[Arrow]) -> Vec<ArrowCrossing> {
    let mut out = Vec::new();
    for (i, a) in arrows.iter().enumerate() {
        for (offset, b) in arrows[i + 1..].iter().enumerate() {
            if a.shares_endpoint(b) {
                continue;
            }
            if let Some(point) = segment_crossing(a.from, a.to, b.from, b.to) {
                out.push(ArrowCrossing {
                    first: i,
                    second: i + 1 + offset,
                    first_link: (a.source.clone(), a.target.clone()),
                    second_link: (b.source.clone(), b.target.clone()),
                    point,
                });
            }
        }
    }
    out
}

/// Counts crossings of `candidates` against each other and against `existing`.
pub fn count_crossings(candidates: &[Arrow], existing: &[Arrow]) -> usize {
    let mut count = 0;
    for (i, a) in candidates.iter().enumerate() {
        for b in candidates[i + 1..].iter().chain(existing.iter()) {
            if !a.shares_endpoint(b) && segment_crossing(a.from, a.to, b.from, b.to).is_some() {
                count += 1;
            }
        }
    }
    count
}

pub fn arrows_through_text(arrows: &[Arrow], boxes: &[TextBox]) -> Vec<ArrowThroughText> {
    let mut out = Vec::new();
    for (idx, arrow) in arrows.iter().enumerate() {
        for text in boxes {
            if arrow.owns(text) {
                continue;
            }
            if segment_intersects_box(arrow.from, arrow.to, text) {
                out.push(ArrowThroughText {
                    arrow: idx,
                    link: (arrow.source.clone(), arrow.target.clone()),
                    element: text.label.clone(),
                    group: text.group.clone(),
                    slot: text.slot,
                    at: (text.x, text.y),
                });
            }
        }
    }
    out
}

/// Interior crossing point of two segments, if any. Parallel and collinear
/// pairs never cross; touching at an end does not count.
pub fn segment_crossing(
    a: (f32, f32),
    b: (f32, f32),
    c: (f32, f32),
    d: (f32, f32),
) -> Option<(f32, f32)> {
    let r = (b.0 - a.0, b.1 - a.1);
    let s = (d.0 - c.0, d.1 - c.1);
    let denom = r.0 * s.1 - r.1 * s.0;
    if denom.abs() <= EPS {
        return None;
    }
    let qp = (c.0 - a.0, c.1 - a.1);
    let t = (qp.0 * s.1 - qp.1 * s.0) / denom;
    let u = (qp.0 * r.1 - qp.1 * r.0) / denom;
    if t <= EPS || t >= 1.0 - EPS || u <= EPS || u >= 1.0 - EPS {
        return None;
    }
    Some((a.0 + t * r.0, a.1 + t * r.1))
}

pub fn segment_intersects_box(a: (f32, f32), b: (f32, f32), text: &TextBox) -> bool {
    let (x1, y1) = a;
    let (x2, y2) = b;
    let (min_x, max_x) = (text.min_x(), text.max_x());
    let (min_y, max_y) = (text.min_y(), text.max_y());
    if x1.max(x2) < min_x || x1.min(x2) > max_x || y1.max(y2) < min_y || y1.min(y2) > max_y {
        return false;
    }
    let inside = |x: f32, y: f32| x >= min_x && x <= max_x && y >= min_y && y <= max_y;
    if inside(x1, y1) || inside(x2, y2) {
        return true;
    }
    let corners = [
        (min_x, min_y),
        (max_x, min_y),
        (max_x, max_y),
        (min_x, max_y),
    ];
    for idx in 0..4 {
        let c = corners[idx];
        let d = corners[(idx + 1) % 4];
        if segments_intersect(a, b, c, d) {
            return true;
        }
    }
    false
}

fn segments_intersect(a: (f32, f32), b: (f32, f32), c: (f32, f32), d: (f32, f32)) -> bool {
    fn orient(a: (f32, f32), b: (f32, f32), c: (f32, f32)) -> f32 {
        (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
    }
    fn on_segment(a: (f32, f32), b: (f32, f32), c: (f32, f32)) -> bool {
        c.0 >= a.0.min(b.0) - EPS
            && c.0 <= a.0.max(b.0) + EPS
            && c.1 >= a.1.min(b.1) - EPS
            && c.1 <= a.1.max(b.1) + EPS
    }
    let o1 = orient(a, b, c);
    let o2 = orient(a, b, d);
    let o3 = orient(c, d, a);
    let o4 = orient(c, d, b);
    if (o1 > 0.0 && o2 < 0.0 || o1 < 0.0 && o2 > 0.0)
        && (o3 > 0.0 && o4 < 0.0 || o3 < 0.0 && o4 > 0.0)
    {
        return true;
    }
    (o1.abs() <= EPS && on_segment(a, b, c))
        || (o2.abs() <= EPS && on_segment(a, b, d))
        || (o3.abs() <= EPS && on_segment(c, d, a))
        || (o4.abs() <= EPS && on_segment(c, d, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arrow(source: &str, target: &str, from: (f32, f32), to: (f32, f32)) -> Arrow {
        Arrow {
            source: source.to_string(),
            target: target.to_string(),
            source_group: source.to_string(),
            source_slot: 0,
            source_anchored: false,
            target_group: target.to_string(),
            target_slot: 0,
            target_anchored: false,
            from,
            to,
        }
    }

    fn text(label: &str, x: f32, y: f32) -> TextBox {
        TextBox {
            label: label.to_string(),
            group: label.to_string(),
            slot: 0,
            x,
            y,
            width: 0.64,
            height: 0.3,
        }
    }

    #[test]
    fn interior_crossing_reports_point() {
        let point = segment_crossing((0.0, 1.0), (4.0, 0.0), (4.0, 1.0), (0.0, 0.0)).unwrap();
        assert!((point.0 - 2.0).abs() < 1e-5);
        assert!((point.1 - 0.5).abs() < 1e-5);
    }

    #[test]
    fn touching_and_parallel_segments_do_not_cross() {
        assert!(segment_crossing((0.0, 1.0), (2.0, 0.0), (2.0, 0.0), (4.0, 1.0)).is_none());
        assert!(segment_crossing((0.0, 0.0), (2.0, 0.0), (0.0, 1.0), (2.0, 1.0)).is_none());
        assert!(segment_crossing((0.0, 0.0), (2.0, 0.0), (1.0, 0.0), (3.0, 0.0)).is_none());
    }

    #[test]
    fn shared_endpoints_are_skipped() {
        let arrows = vec![
            arrow("A", "C", (0.0, 1.0), (2.0, 0.0)),
            arrow("B", "C", (4.0, 1.0), (2.0, 0.0)),
            arrow("D", "E", (0.0, 0.5), (4.0, 0.5)),
        ];
        let crossings = arrow_crossings(&arrows);
        assert_eq!(crossings.len(), 2);
        assert!(crossings.iter().all(|c| c.second == 2));
    }

    #[test]
    fn overlap_by_proximity_and_coincidence() {
        let config = LayoutConfig::default();
        let boxes = vec![text("A", 0.0, 0.0), text("B", 0.5, 0.0), text("C", 5.0, 0.0)];
        let overlaps = text_overlaps(&boxes, &config);
        assert_eq!(overlaps.len(), 1);
        assert_eq!(overlaps[0].first, "A");
        assert_eq!(overlaps[0].second, "B");

        let stacked = vec![text("A", 0.0, 0.0), text("B", 0.0, 1.0)];
        assert!(text_overlaps(&stacked, &config).is_empty());

        let mut wide = text("same", 3.0, 2.0);
        wide.width = 0.0;
        let mut other = text("spot", 3.05, 2.0);
        other.width = 0.0;
        assert_eq!(text_overlaps(&[wide, other], &config).len(), 1);
    }

    #[test]
    fn arrow_through_unrelated_text_only() {
        let arrows = vec![arrow("A", "C", (0.0, 2.0), (0.0, 0.0))];
        let boxes = vec![
            text("A", 0.0, 2.0),
            text("B", 0.0, 1.0),
            text("C", 0.0, 0.0),
            text("D", 3.0, 1.0),
        ];
        let hits = arrows_through_text(&arrows, &boxes);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].element, "B");
    }

    #[test]
    fn anchored_source_ignores_its_whole_group() {
        let mut a = arrow("group_0", "C", (2.5, 0.7), (2.5, 0.0));
        a.source_group = "group_0".to_string();
        a.source_slot = 1;
        a.source_anchored = true;
        let mut sibling = text("P4", 2.5, 0.4);
        sibling.group = "group_0".to_string();
        let hits = arrows_through_text(&[a], &[sibling]);
        assert!(hits.is_empty());
    }

    #[test]
    fn count_crossings_includes_existing() {
        let existing = vec![arrow("X", "Y", (0.0, 1.0), (4.0, 0.0))];
        let candidates = vec![arrow("B", "C", (4.0, 1.0), (0.0, 0.0))];
        assert_eq!(count_crossings(&candidates, &existing), 1);
        assert_eq!(count_crossings(&candidates, &[]), 0);
    }

    #[test]
    fn x_at_interpolates_along_segment() {
        let a = arrow("A", "B", (0.0, 2.0), (4.0, 0.0));
        assert!((a.x_at(1.0) - 2.0).abs() < 1e-6);
        assert_eq!(a.x_at(5.0), 0.0);
    }
}
