//! Scrollback of the conversation

use crate::messages::{LogEntry, Speaker};
use crate::ui::state::ChatCoordinator;
use crate::ui::theme::Theme;
use egui::{self, Align, RichText};

pub struct MessageList<'a> {
    chat: &'a ChatCoordinator,
    theme: &'a Theme,
}

impl<'a> MessageList<'a> {
    pub fn new(chat: &'a ChatCoordinator, theme: &'a Theme) -> Self {
        Self { chat, theme }
    }

    pub fn show(self, ui: &mut egui::Ui) {
        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                ui.add_space(self.theme.spacing_sm);

                for entry in self.chat.log() {
                    self.show_entry(ui, entry);
                    ui.add_space(self.theme.spacing_sm);
                }

                let streaming = self.chat.streaming();
                if streaming.is_active() {
                    self.show_streaming(ui, &streaming.text);
                }
            });
    }

    fn show_entry(&self, ui: &mut egui::Ui, entry: &LogEntry) {
        let align = match entry.speaker {
            Speaker::User => Align::RIGHT,
            _ => Align::LEFT,
        };

        ui.with_layout(egui::Layout::top_down(align), |ui| {
            ui.label(
                RichText::new(format!(
                    "{}  {}",
                    entry.speaker.label(),
                    entry.timestamp.format("%H:%M")
                ))
                .small()
                .color(self.theme.text_muted),
            );

            let text_color = match entry.speaker {
                Speaker::System => self.theme.error,
                _ => self.theme.text_primary,
            };
            let access_name = format!("{}: {}", entry.speaker.label(), entry.text);

            self.bubble(ui, self.theme.bubble_fill(entry.speaker), |ui| {
                let response = ui.label(RichText::new(&entry.text).color(text_color));
                response.widget_info(|| {
                    egui::WidgetInfo::labeled(egui::WidgetType::Label, true, &access_name)
                });
            });
        });
    }

    fn show_streaming(&self, ui: &mut egui::Ui, text: &str) {
        ui.with_layout(egui::Layout::top_down(Align::LEFT), |ui| {
            ui.label(
                RichText::new(Speaker::Assistant.label())
                    .small()
                    .color(self.theme.text_muted),
            );

            self.bubble(ui, self.theme.assistant_bubble, |ui| {
                if text.is_empty() {
                    ui.spinner();
                } else {
                    let response = ui.label(RichText::new(text).color(self.theme.text_primary));
                    let access_name = format!("Streaming response: {}", text);
                    response.widget_info(|| {
                        egui::WidgetInfo::labeled(egui::WidgetType::Label, true, &access_name)
                    });
                }
            });
        });
    }

    fn bubble(&self, ui: &mut egui::Ui, fill: egui::Color32, content: impl FnOnce(&mut egui::Ui)) {
        let max_width = ui.available_width() * 0.8;
        egui::Frame::none()
            .fill(fill)
            .rounding(self.theme.bubble_rounding)
            .inner_margin(egui::Margin::symmetric(12.0, 8.0))
            .show(ui, |ui| {
                ui.set_max_width(max_width);
                content(ui);
            });
    }
}
