use serde::{Deserialize, Serialize};

/// Drawing styles applied to the TikZ primitives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub arrow_color: String,
    pub underline_color: String,
    pub line_width_pt: f32,
}

impl Theme {
    pub fn blue() -> Self {
        Self {
            arrow_color: "blue".to_string(),
            underline_color: "blue".to_string(),
            line_width_pt: 2.0,
        }
    }

    pub fn monochrome() -> Self {
        Self {
            arrow_color: "black".to_string(),
            underline_color: "black".to_string(),
            line_width_pt: 1.2,
        }
    }

    pub fn arrow_style(&self) -> String {
        format!("->, {}", self.arrow_color)
    }

    pub fn underline_style(&self) -> String {
        self.underline_color.clone()
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::blue()
    }
}
