mod app;

use eframe::egui;
use std::error::Error;
use stylegan_panel::config::{default_path_file, load_generator_path};
use stylegan_panel::{GeneratorPaths, Settings};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init(); // Log to stderr (if you run with `RUST_LOG=debug`).

    // Process spawning, the poll timer and assembly all run on this runtime.
    let runtime = tokio::runtime::Runtime::new()?;
    let handle = runtime.handle().clone();

    let settings = Settings::load();
    let (install_dir, startup_error) = match load_generator_path(&default_path_file()) {
        Ok(dir) => (dir, None),
        Err(e) => {
            log::warn!("{}", e);
            (Default::default(), Some(e.to_string()))
        }
    };
    let paths = GeneratorPaths::new(install_dir, settings.executable_stem.clone());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([800.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        "StyleGAN Panel",
        options,
        Box::new(move |cc| {
            Ok(Box::new(app::PanelApp::new(
                cc,
                handle,
                paths,
                settings,
                startup_error,
            )))
        }),
    )?;
    Ok(())
}
