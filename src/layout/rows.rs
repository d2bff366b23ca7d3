use crate::config::LayoutConfig;

/// One group waiting for a row slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct RowItem {
    pub width: f32,
    /// Preferred center, usually the median of the group's link targets.
    pub target_x: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct RowSlot {
    pub row: usize,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct RowPlan {
    pub slots: Vec<RowSlot>,
    pub rows: usize,
}

/// Places items left to right, centering each over its target when room
/// allows. A row is closed when the next item would stretch its span past
/// `max_x_position`; the overflow opens a new row one unit higher.
pub(super) fn plan_rows(items: &[RowItem], base_y: f32, config: &LayoutConfig) -> RowPlan {
    let mut slots = Vec::with_capacity(items.len());
    let mut row = 0usize;
    let mut row_start: Option<f32> = None;
    let mut cursor = 0.0f32;

    for item in items {
        let desired = item.target_x.map(|center| center - item.width / 2.0);
        let mut x = match row_start {
            None => desired.unwrap_or(0.0),
            Some(_) => desired.map_or(cursor, |wanted| wanted.max(cursor)),
        };
        if let Some(start) = row_start {
            if x + item.width - start > config.max_x_position {
                x = cursor;
            }
            if x + item.width - start > config.max_x_position {
                row += 1;
                row_start = None;
                x = desired.unwrap_or(0.0);
            }
        }
        if row_start.is_none() {
            row_start = Some(x);
        }
        slots.push(RowSlot {
            row,
            x,
            y: base_y + row as f32,
        });
        cursor = x + item.width + config.between_group_spacing;
    }

    RowPlan {
        rows: if items.is_empty() { 0 } else { row + 1 },
        slots,
    }
}
