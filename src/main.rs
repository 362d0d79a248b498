use std::path::PathBuf;

use eframe::egui;
use maskfe::app::MaskApp;
use maskfe::{cli, logger};

fn main() -> Result<(), eframe::Error> {
    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = cli::CliArgs::parse();
        let code = cli::run(args);
        std::process::exit(if code == std::process::ExitCode::SUCCESS { 0 } else { 1 });
    }

    // -- GUI mode -----------------------------------------------------

    // Initialize session log (overwrites previous session log)
    logger::init();

    // `MaskFE photo.png` opens the image straight away.
    let startup_file = std::env::args().nth(1).filter(|a| !a.starts_with('-')).map(PathBuf::from);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([640.0, 400.0])
            .with_title("MaskFE"),
        ..Default::default()
    };

    eframe::run_native(
        "MaskFE",
        options,
        Box::new(move |cc| Box::new(MaskApp::new(cc, startup_file))),
    )
}
