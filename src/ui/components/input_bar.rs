//! Text entry, send and voice controls

use crate::ui::state::ChatCoordinator;
use crate::ui::theme::Theme;
use egui::{self, Key, RichText, Vec2};
use tracing::warn;

pub const INPUT_HINT: &str = "Digite sua mensagem...";
pub const SEND_LABEL: &str = "Enviar";
pub const VOICE_LABEL: &str = "🎤 Falar";
pub const LISTENING_LABEL: &str = "Escutando...";

/// Accessibility names used by UI automation
pub const INPUT_ACCESS_NAME: &str = "Message input";
pub const SEND_ACCESS_NAME: &str = "Send message";
pub const VOICE_ACCESS_NAME: &str = "Voice input";

pub struct InputBar<'a> {
    chat: &'a mut ChatCoordinator,
    theme: &'a Theme,
}

impl<'a> InputBar<'a> {
    pub fn new(chat: &'a mut ChatCoordinator, theme: &'a Theme) -> Self {
        Self { chat, theme }
    }

    pub fn show(mut self, ui: &mut egui::Ui) {
        egui::Frame::none()
            .fill(self.theme.bg_panel)
            .rounding(self.theme.bubble_rounding)
            .inner_margin(self.theme.spacing_sm)
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    self.show_text_input(ui);
                    self.show_send_button(ui);
                    self.show_voice_button(ui);
                });
            });
    }

    fn show_text_input(&mut self, ui: &mut egui::Ui) {
        let enabled = self.chat.input_enabled();
        let width = (ui.available_width() - 220.0).max(120.0);

        let text_edit = egui::TextEdit::singleline(&mut self.chat.input_text)
            .hint_text(INPUT_HINT)
            .desired_width(width)
            .id(egui::Id::new("message_input"))
            .margin(egui::Margin::symmetric(10.0, 8.0));

        let response = ui.add_enabled(enabled, text_edit);
        response.widget_info(|| {
            egui::WidgetInfo::labeled(egui::WidgetType::TextEdit, enabled, INPUT_ACCESS_NAME)
        });

        if response.lost_focus() && ui.input(|i| i.key_pressed(Key::Enter)) {
            self.send();
            response.request_focus();
        }
    }

    fn show_send_button(&mut self, ui: &mut egui::Ui) {
        let enabled = self.chat.can_send();

        let button = egui::Button::new(RichText::new(SEND_LABEL).color(egui::Color32::WHITE))
            .min_size(Vec2::new(80.0, 34.0))
            .rounding(self.theme.button_rounding)
            .fill(if enabled { self.theme.accent } else { self.theme.bg_field });

        let response = ui.add_enabled(enabled, button);
        response.widget_info(|| {
            egui::WidgetInfo::labeled(egui::WidgetType::Button, enabled, SEND_ACCESS_NAME)
        });

        if response.clicked() {
            self.send();
        }
    }

    fn show_voice_button(&mut self, ui: &mut egui::Ui) {
        let listening = self.chat.is_listening();
        let enabled = self.chat.voice_enabled();

        let (label, fill) = if listening {
            (LISTENING_LABEL, self.theme.listening)
        } else {
            (VOICE_LABEL, self.theme.bg_field)
        };

        let button = egui::Button::new(RichText::new(label).color(self.theme.text_primary))
            .min_size(Vec2::new(110.0, 34.0))
            .rounding(self.theme.button_rounding)
            .fill(fill);

        let response = ui.add_enabled(enabled, button);
        response.widget_info(|| {
            egui::WidgetInfo::labeled(egui::WidgetType::Button, enabled, VOICE_ACCESS_NAME)
        });

        let response = if !self.chat.voice_settings().capture {
            response.on_disabled_hover_text("Reconhecimento de voz indisponível")
        } else {
            response
        };

        if response.clicked() {
            if let Err(e) = self.chat.start_voice_capture() {
                warn!("Voice capture not started: {}", e);
            }
        }
    }

    fn send(&mut self) {
        if let Err(e) = self.chat.submit_input() {
            warn!("Message not sent: {}", e);
        }
    }
}
