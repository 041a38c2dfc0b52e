//! Desktop chat window built on eframe

mod app;
pub mod components;
mod state;
mod theme;

pub use app::MentrisApp;
pub use state::{ChatCoordinator, StreamingResponse, VoiceSettings, WELCOME_MESSAGE};
pub use theme::Theme;

pub const WINDOW_TITLE: &str = "Mentris Chat";

/// Open the window and run until it is closed
pub fn run(chat: ChatCoordinator) -> eframe::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([800.0, 600.0])
            .with_min_inner_size([700.0, 500.0])
            .with_title(WINDOW_TITLE),
        ..Default::default()
    };

    eframe::run_native(
        "Mentris",
        options,
        Box::new(|cc| Ok(Box::new(MentrisApp::new(cc, chat)))),
    )
}
