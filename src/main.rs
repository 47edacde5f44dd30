use std::sync::Arc;

use eframe::egui;
use log::info;

use vision_overlay::app::VisionApp;
use vision_overlay::config::{config_path_from_args, AppConfig};
use vision_overlay::HttpTransport;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        eprintln!("Usage: vision-overlay [settings.json]");
        std::process::exit(0);
    }

    let config_path = config_path_from_args(&args);
    let config = AppConfig::load(&config_path);

    env_logger::Builder::new()
        .filter_level(config.log_level.to_level_filter())
        .parse_default_env()
        .init();
    info!(
        "API at {} (settings: {})",
        config.api_base_url,
        config_path.display()
    );

    let transport = match HttpTransport::new(config.api_base_url.clone(), config.request_timeout()) {
        Ok(transport) => Arc::new(transport),
        Err(err) => {
            eprintln!("Could not create HTTP client: {err}");
            std::process::exit(1);
        }
    };

    let title = "vision-overlay";
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title(title),
        ..Default::default()
    };

    if let Err(err) = eframe::run_native(
        title,
        options,
        Box::new(move |cc| Ok(Box::new(VisionApp::new(&cc.egui_ctx, config, transport)))),
    ) {
        eprintln!("Application error: {err}");
        std::process::exit(1);
    }
}
