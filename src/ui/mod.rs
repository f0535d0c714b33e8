//! Control window
//!
//! An eframe/egui front end over [`HubHandle`]. The window owns no control
//! state: each frame renders the latest surface snapshots from the hub and
//! turns button edges into hub commands.
//!
//! 1. [`camera_panel`] - One camera's controls, presets and reset
//! 2. [`press_tracker`] - Frame-to-frame press start/end detection
//! 3. [`common`] - Colours, frames and button glyphs

pub mod camera_panel;
pub mod common;
pub mod press_tracker;

use chrono::Local;
use egui::RichText;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::{broadcast, watch};
use tracing::{error, warn};

use self::camera_panel::{PanelOutput, PressKey};
use self::common::UiColors;
use self::press_tracker::PressTracker;
use crate::device::DeviceId;
use crate::hub::{HubEvent, HubHandle, PressPhase, SurfaceSnapshot};

const LOG_LINES: usize = 8;

pub struct PtzUi {
    hub: HubHandle,
    surfaces: watch::Receiver<Vec<SurfaceSnapshot>>,
    events: broadcast::Receiver<HubEvent>,
    gamepad: Option<watch::Receiver<bool>>,
    presses: PressTracker<PressKey>,
    failed: HashSet<DeviceId>,
    log: VecDeque<String>,
}

impl PtzUi {
    pub fn new(cc: &eframe::CreationContext<'_>, hub: HubHandle, gamepad: Option<watch::Receiver<bool>>) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());
        Self {
            surfaces: hub.surfaces(),
            events: hub.subscribe(),
            hub,
            gamepad,
            presses: PressTracker::new(),
            failed: HashSet::new(),
            log: VecDeque::with_capacity(LOG_LINES),
        }
    }

    fn drain_events(&mut self) {
        loop {
            let event = match self.events.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("UI skipped {} hub events", skipped);
                    continue;
                }
                Err(_) => break,
            };

            let line = match &event {
                HubEvent::Applied { device, payload } => {
                    self.failed.remove(device);
                    format!("{}: applied {}", device, payload)
                }
                HubEvent::ApplyFailed {
                    device,
                    payload,
                    error,
                } => {
                    self.failed.insert(device.clone());
                    format!("{}: {} failed: {}", device, payload, error)
                }
                HubEvent::PresetSaved { device, slot } => format!("{}: preset {} saved", device, slot),
                HubEvent::PresetLoaded { device, slot } => format!("{}: preset {} loaded", device, slot),
            };
            if self.log.len() == LOG_LINES {
                self.log.pop_front();
            }
            self.log
                .push_back(format!("{} {}", Local::now().format("%H:%M:%S%.3f"), line));
        }
    }

    fn send_press(&self, key: PressKey, phase: PressPhase) {
        let result = match key {
            PressKey::Step {
                device,
                property,
                direction,
            } => self.hub.hold(&device, property, direction, phase),
            PressKey::Preset { device, slot } => self.hub.preset(&device, slot, phase),
        };
        if let Err(e) = result {
            error!("Failed to forward press to hub: {}", e);
        }
    }
}

impl eframe::App for PtzUi {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint_after(Duration::from_millis(33));
        self.drain_events();
        let surfaces = self.surfaces.borrow().clone();

        egui::TopBottomPanel::bottom("status_panel")
            .show_separator_line(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    match &self.gamepad {
                        Some(polling) if *polling.borrow() => {
                            ui.colored_label(UiColors::ACTIVE, "🎮 gamepad active");
                        }
                        Some(_) => {
                            ui.label("🎮 no gamepad");
                        }
                        None => {
                            ui.label(RichText::new("🎮 gamepad disabled").weak());
                        }
                    }
                    ui.label(format!("{} cameras", surfaces.len()));
                });
                for line in &self.log {
                    ui.label(RichText::new(line).monospace().small());
                }
            });

        let mut output = PanelOutput::default();
        let mut resets = Vec::new();
        egui::CentralPanel::default()
            .frame(egui::Frame::new().fill(UiColors::MAIN_BG).inner_margin(8))
            .show(ctx, |ui| {
                if surfaces.is_empty() {
                    ui.label("No controllable cameras registered");
                }
                egui::ScrollArea::vertical().show(ui, |ui| {
                    for surface in &surfaces {
                        let panel = camera_panel::render(ui, surface, self.failed.contains(&surface.device));
                        output.held.extend(panel.held);
                        if panel.reset {
                            resets.push(surface.device.clone());
                        }
                    }
                });
            });

        let (pointer_down, focused) = ctx.input(|i| (i.pointer.any_down(), i.focused));
        for (key, phase) in self.presses.frame(output.held, pointer_down, focused) {
            self.send_press(key, phase);
        }
        for device in resets {
            if let Err(e) = self.hub.reset(&device) {
                error!("Failed to forward reset to hub: {}", e);
            }
        }
    }
}
