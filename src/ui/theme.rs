//! Colors and spacing for the chat window

use egui::{Color32, FontFamily, FontId, Rounding, Stroke, Vec2, Visuals};

use crate::messages::Speaker;

#[derive(Clone, Debug)]
pub struct Theme {
    pub accent: Color32,
    pub listening: Color32,
    pub error: Color32,

    pub bg_window: Color32,
    pub bg_panel: Color32,
    pub bg_field: Color32,

    pub user_bubble: Color32,
    pub assistant_bubble: Color32,
    pub system_bubble: Color32,

    pub text_primary: Color32,
    pub text_muted: Color32,

    pub bubble_rounding: Rounding,
    pub button_rounding: Rounding,

    pub spacing: f32,
    pub spacing_sm: f32,
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            accent: Color32::from_rgb(20, 184, 166),
            listening: Color32::from_rgb(239, 68, 68),
            error: Color32::from_rgb(248, 113, 113),

            bg_window: Color32::from_rgb(15, 23, 42),
            bg_panel: Color32::from_rgb(30, 41, 59),
            bg_field: Color32::from_rgb(51, 65, 85),

            user_bubble: Color32::from_rgb(13, 148, 136),
            assistant_bubble: Color32::from_rgb(30, 41, 59),
            system_bubble: Color32::from_rgb(69, 26, 3),

            text_primary: Color32::from_rgb(241, 245, 249),
            text_muted: Color32::from_rgb(148, 163, 184),

            bubble_rounding: Rounding::same(10.0),
            button_rounding: Rounding::same(6.0),

            spacing: 12.0,
            spacing_sm: 6.0,
        }
    }

    /// Bubble fill for a log entry's sender
    pub fn bubble_fill(&self, speaker: Speaker) -> Color32 {
        match speaker {
            Speaker::User => self.user_bubble,
            Speaker::Assistant => self.assistant_bubble,
            Speaker::System => self.system_bubble,
        }
    }

    pub fn apply(&self, ctx: &egui::Context) {
        let mut visuals = Visuals::dark();
        visuals.panel_fill = self.bg_window;
        visuals.window_fill = self.bg_panel;
        visuals.extreme_bg_color = self.bg_field;

        visuals.widgets.inactive.bg_fill = self.bg_field;
        visuals.widgets.inactive.weak_bg_fill = self.bg_field;
        visuals.widgets.hovered.bg_fill = self.accent.gamma_multiply(0.8);
        visuals.widgets.hovered.weak_bg_fill = self.accent.gamma_multiply(0.8);
        visuals.widgets.active.bg_fill = self.accent;
        visuals.widgets.noninteractive.fg_stroke = Stroke::new(1.0, self.text_muted);

        visuals.selection.bg_fill = self.accent.gamma_multiply(0.35);
        visuals.selection.stroke = Stroke::new(1.0, self.accent);
        visuals.window_rounding = self.bubble_rounding;
        ctx.set_visuals(visuals);

        let mut style = (*ctx.style()).clone();
        style.spacing.item_spacing = Vec2::splat(self.spacing_sm);
        style.spacing.button_padding = Vec2::new(self.spacing, self.spacing_sm);
        style
            .text_styles
            .insert(egui::TextStyle::Body, FontId::new(15.0, FontFamily::Proportional));
        style
            .text_styles
            .insert(egui::TextStyle::Button, FontId::new(15.0, FontFamily::Proportional));
        style
            .text_styles
            .insert(egui::TextStyle::Small, FontId::new(11.0, FontFamily::Proportional));
        ctx.set_style(style);
    }
}
