//! Shared styling for the control window

use egui::{Color32, Frame, Stroke};

use crate::control::{Direction, Property};

/// Dark theme palette
pub struct UiColors;

impl UiColors {
    pub const MAIN_BG: Color32 = Color32::from_rgb(30, 30, 30);

    pub const INNER_BG: Color32 = Color32::from_rgb(25, 25, 25);

    pub const BORDER: Color32 = Color32::from_rgb(60, 60, 60);

    /// Settled / connected
    pub const ACTIVE: Color32 = Color32::from_rgb(50, 200, 20);

    /// Failed apply
    pub const INACTIVE: Color32 = Color32::from_rgb(200, 50, 20);

    /// Apply outstanding
    pub const PENDING: Color32 = Color32::from_rgb(220, 170, 30);
}

pub fn create_frame(bg_color: Color32, border_color: Color32) -> Frame {
    Frame::new()
        .stroke(Stroke::new(1.0, border_color))
        .fill(bg_color)
        .inner_margin(4)
        .outer_margin(2)
}

/// Button caption for stepping `property` in `direction`
///
/// Pan runs mirrored, so its decrease button points right.
pub fn glyph(property: Property, direction: Direction) -> &'static str {
    match (property, direction) {
        (Property::Pan, Direction::Decrease) => "▶",
        (Property::Pan, Direction::Increase) => "◀",
        (Property::Tilt, Direction::Decrease) => "▼",
        (Property::Tilt, Direction::Increase) => "▲",
        (Property::Zoom, Direction::Decrease) => "⇲",
        (Property::Zoom, Direction::Increase) => "⇱",
    }
}

pub const RESET_GLYPH: &str = "•";
