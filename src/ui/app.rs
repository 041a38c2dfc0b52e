//! eframe application shell

use crate::ui::components::{InputBar, MessageList};
use crate::ui::state::ChatCoordinator;
use crate::ui::theme::Theme;
use egui::{CentralPanel, RichText, TopBottomPanel};
use tracing::info;

pub struct MentrisApp {
    chat: ChatCoordinator,
    theme: Theme,
}

impl MentrisApp {
    pub fn new(cc: &eframe::CreationContext<'_>, mut chat: ChatCoordinator) -> Self {
        let theme = Theme::dark();
        theme.apply(&cc.egui_ctx);

        // Workers wake the UI instead of it polling on a timer
        let ctx = cc.egui_ctx.clone();
        chat.set_waker(move || ctx.request_repaint());

        info!("Chat window ready");
        Self { chat, theme }
    }

    /// Build without a native window, for headless rendering
    pub fn with_chat(chat: ChatCoordinator) -> Self {
        Self {
            chat,
            theme: Theme::dark(),
        }
    }

    pub fn chat(&self) -> &ChatCoordinator {
        &self.chat
    }

    pub fn chat_mut(&mut self) -> &mut ChatCoordinator {
        &mut self.chat
    }

    /// Draw one frame into `ctx`; shared by eframe and the UI tests
    pub fn ui(&mut self, ctx: &egui::Context) {
        self.chat.poll();

        self.show_header(ctx);
        self.show_input_area(ctx);
        self.show_log(ctx);
    }

    fn status_text(&self) -> Option<&'static str> {
        if self.chat.is_listening() {
            Some("Escutando...")
        } else if self.chat.is_generating() {
            Some("Respondendo...")
        } else if self.chat.is_speaking() {
            Some("Falando...")
        } else {
            None
        }
    }

    fn show_header(&self, ctx: &egui::Context) {
        TopBottomPanel::top("header")
            .frame(egui::Frame::none().fill(self.theme.bg_panel).inner_margin(self.theme.spacing))
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(
                        RichText::new("Mentris")
                            .size(20.0)
                            .strong()
                            .color(self.theme.text_primary),
                    );

                    if let Some(status) = self.status_text() {
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            ui.label(RichText::new(status).color(self.theme.text_muted));
                        });
                    }
                });
            });
    }

    fn show_input_area(&mut self, ctx: &egui::Context) {
        TopBottomPanel::bottom("input_area")
            .frame(egui::Frame::none().fill(self.theme.bg_window).inner_margin(self.theme.spacing))
            .show(ctx, |ui| {
                InputBar::new(&mut self.chat, &self.theme).show(ui);
            });
    }

    fn show_log(&self, ctx: &egui::Context) {
        CentralPanel::default()
            .frame(egui::Frame::none().fill(self.theme.bg_window).inner_margin(self.theme.spacing))
            .show(ctx, |ui| {
                MessageList::new(&self.chat, &self.theme).show(ui);
            });
    }
}

impl eframe::App for MentrisApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.ui(ctx);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        info!(
            "Closing after {} completed turns",
            self.chat.history().completed_turns()
        );
    }
}
