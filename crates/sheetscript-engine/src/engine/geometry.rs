//! Table geometry records.

use serde::{Deserialize, Serialize};

/// Canvas rectangle of a table, in points.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Rect {
        Rect {
            x,
            y,
            width,
            height,
        }
    }
}

/// Number of label rows/columns in each band around a table body.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelBands {
    #[serde(rename = "topRows")]
    pub top: usize,
    #[serde(rename = "bottomRows")]
    pub bottom: usize,
    #[serde(rename = "leftCols")]
    pub left: usize,
    #[serde(rename = "rightCols")]
    pub right: usize,
}

impl LabelBands {
    pub fn new(top: usize, left: usize, bottom: usize, right: usize) -> LabelBands {
        LabelBands {
            top,
            bottom,
            left,
            right,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == LabelBands::default()
    }
}
