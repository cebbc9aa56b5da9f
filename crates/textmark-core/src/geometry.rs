//! Viewport geometry for the near-visible check.

/// Element bounding box in viewport coordinates (CSS pixels).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
}

impl Rect {
    pub fn new(top: f64, left: f64, bottom: f64, right: f64) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
        }
    }

    /// Box of the given size with its top-left corner at `(left, top)`.
    pub fn from_origin(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            bottom: top + height,
            right: left + width,
        }
    }

    /// Same box moved by `dy` pixels vertically, as when the page scrolls.
    pub fn shifted_y(self, dy: f64) -> Self {
        Self {
            top: self.top + dy,
            bottom: self.bottom + dy,
            ..self
        }
    }
}

/// Visible window size in CSS pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ViewportSize {
    pub width: f64,
    pub height: f64,
}

impl ViewportSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Whether `rect` overlaps the viewport grown by `margin` on every side.
///
/// Edges are inclusive: a box whose bottom sits exactly `margin` pixels above
/// the viewport still counts.
pub fn is_near_viewport(rect: &Rect, viewport: &ViewportSize, margin: f64) -> bool {
    rect.bottom >= -margin
        && rect.top <= viewport.height + margin
        && rect.right >= -margin
        && rect.left <= viewport.width + margin
}
