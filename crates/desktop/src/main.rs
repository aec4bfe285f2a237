//! Relay Desktop: application entry.

mod app;
mod worker;

use eframe::egui;

fn main() -> eframe::Result<()> {
    app::install_logger();

    let (config, config_path) = match relay::config::load_config(None) {
        Ok(loaded) => loaded,
        Err(e) => {
            log::error!("desktop: {:#}; using defaults", e);
            (
                relay::config::Config::default(),
                relay::config::default_config_path(),
            )
        }
    };

    let mut viewport = egui::ViewportBuilder::default()
        .with_inner_size([1000.0, 720.0])
        .with_min_inner_size([640.0, 480.0]);
    let positions = relay::position::PositionStore::new(relay::config::state_path(&config_path));
    if let Some(pos) = positions.load() {
        log::debug!("desktop: restoring window position {},{}", pos.x, pos.y);
        viewport = viewport.with_position([pos.x, pos.y]);
    }

    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    eframe::run_native(
        "Relay",
        options,
        Box::new(move |cc| Box::new(app::RelayApp::new(cc, config, config_path))),
    )
}
