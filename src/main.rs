pub mod config;
pub mod control;
pub mod device;
pub mod hub;
pub mod input;
pub mod reconcile;
pub mod ui;

use crate::config::PtzConfig;
use crate::device::PtzDevice;
use crate::hub::HubHandle;
use crate::input::{GamepadHandle, GilrsSource};
use crate::ui::PtzUi;
use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = PtzConfig::load_or_init(&PtzConfig::default_path()).await?;

    let hub = HubHandle::spawn(Some(config.hub_settings()));
    for camera in &config.cameras {
        let device: Arc<dyn PtzDevice> = Arc::new(camera.build());
        let descriptor = hub
            .register(device)
            .await
            .map_err(|e| eyre!("Failed to register camera {}: {}", camera.id, e))?;
        if descriptor.controls.is_empty() {
            warn!("Camera {} has no controls and gets no surface", camera.id);
        }
    }

    let gamepad = if config.gamepad.enabled {
        match GilrsSource::new() {
            Ok(source) => Some(GamepadHandle::spawn(
                Box::new(source),
                Some(config.gamepad_settings()),
                hub.clone(),
            )),
            Err(e) => {
                warn!("Gamepad input unavailable: {}", e);
                None
            }
        }
    } else {
        info!("Gamepad input disabled in config");
        None
    };
    let gamepad_status = gamepad.as_ref().map(GamepadHandle::subscribe);

    info!("Starting UI");
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([520.0, 640.0]),
        ..Default::default()
    };

    let ui_hub = hub.clone();
    let result = eframe::run_native(
        "OpenPTZ",
        native_options,
        Box::new(move |cc| Ok(Box::new(PtzUi::new(cc, ui_hub, gamepad_status)))),
    );

    if let Some(gamepad) = gamepad {
        gamepad.shutdown().await;
    }
    if let Err(e) = hub.shutdown() {
        error!("Failed to stop control hub: {}", e);
    }

    result.map_err(|e| eyre!("UI terminated with error: {}", e))
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
