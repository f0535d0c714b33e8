use egui::{vec2, Button, Label, Response, RichText, Ui};
use std::collections::HashSet;

use super::common::{create_frame, glyph, UiColors, RESET_GLYPH};
use crate::control::{Direction, Property, SlotIndex};
use crate::device::DeviceId;
use crate::hub::SurfaceSnapshot;

/// A button that reports press start/end instead of clicks
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PressKey {
    Step {
        device: DeviceId,
        property: Property,
        direction: Direction,
    },
    Preset {
        device: DeviceId,
        slot: SlotIndex,
    },
}

#[derive(Default)]
pub struct PanelOutput {
    pub held: HashSet<PressKey>,
    pub reset: bool,
}

fn is_held(response: &Response) -> bool {
    response.is_pointer_button_down_on() && response.contains_pointer()
}

/// Draws one camera: a row per property, then the preset and reset buttons
pub fn render(ui: &mut Ui, surface: &SurfaceSnapshot, failed: bool) -> PanelOutput {
    let mut output = PanelOutput::default();

    create_frame(UiColors::INNER_BG, UiColors::BORDER).show(ui, |ui| {
        ui.horizontal(|ui| {
            ui.heading(&surface.label);
            ui.label(RichText::new(surface.device.as_str()).weak());
            if surface.in_flight {
                ui.spinner();
            } else if failed {
                ui.colored_label(UiColors::INACTIVE, "apply failed");
            } else {
                ui.colored_label(UiColors::ACTIVE, "settled");
            }
        });

        for control in &surface.properties {
            ui.horizontal(|ui| {
                ui.add_sized(vec2(48.0, 20.0), Label::new(control.property.to_string()));
                for direction in [Direction::Decrease, Direction::Increase] {
                    let button = Button::new(RichText::new(glyph(control.property, direction)).size(20.0))
                        .min_size(vec2(48.0, 36.0));
                    if is_held(&ui.add(button)) {
                        output.held.insert(PressKey::Step {
                            device: surface.device.clone(),
                            property: control.property,
                            direction,
                        });
                    }
                }

                let color = if control.current == control.desired {
                    UiColors::ACTIVE
                } else {
                    UiColors::PENDING
                };
                ui.colored_label(color, format!("{:.0} → {:.0}", control.current, control.desired));
                ui.label(
                    RichText::new(format!("[{:.0}, {:.0}] step {}", control.min, control.max, control.step))
                        .weak(),
                );
            });
        }

        ui.horizontal(|ui| {
            for preset in &surface.presets {
                let button = Button::new(RichText::new(preset.slot.to_string()).size(18.0))
                    .min_size(vec2(36.0, 36.0))
                    .selected(preset.acknowledged);
                let response = ui.add(button);
                let response = match preset.saved_at {
                    Some(saved_at) => response.on_hover_text(format!("Saved {}", saved_at.format("%H:%M:%S"))),
                    None => response.on_hover_text("Hold to save, tap to recall"),
                };
                if is_held(&response) {
                    output.held.insert(PressKey::Preset {
                        device: surface.device.clone(),
                        slot: preset.slot,
                    });
                }
            }

            let reset = Button::new(RichText::new(RESET_GLYPH).size(18.0)).min_size(vec2(36.0, 36.0));
            if ui.add(reset).on_hover_text("Back to zero").clicked() {
                output.reset = true;
            }
        });
    });

    output
}
