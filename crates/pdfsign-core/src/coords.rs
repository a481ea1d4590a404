//! Coordinate transformation between percent rectangles and PDF page space
//!
//! Percent rectangles have a top-left origin and are fractions of the page;
//! page space has a bottom-left origin and is measured in PDF units.

use crate::field::Field;

/// A rectangle in page units, bottom-left origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PageRect {
    pub fn translate(self, dx: f64, dy: f64) -> PageRect {
        PageRect {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Convert a field's percent rectangle to page space (flip Y axis).
/// No clamping happens here.
pub fn to_page_rect(field: &Field, page_width: f64, page_height: f64) -> PageRect {
    let width = field.width_percent * page_width;
    let height = field.height_percent * page_height;

    PageRect {
        x: field.x_percent * page_width,
        y: page_height - field.y_percent * page_height - height,
        width,
        height,
    }
}

/// Convert a page-space rectangle back to `(x, y, width, height)` percents
pub fn to_percent_rect(rect: &PageRect, page_width: f64, page_height: f64) -> (f64, f64, f64, f64) {
    let width_pct = rect.width / page_width;
    let height_pct = rect.height / page_height;
    // Top edge in page space is y + height
    let y_pct = 1.0 - (rect.y + rect.height) / page_height;

    (rect.x / page_width, y_pct, width_pct, height_pct)
}
