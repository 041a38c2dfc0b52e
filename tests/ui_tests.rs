//! UI automation tests using egui_kittest and AccessKit
//!
//! The real chat window is rendered headless over scripted collaborators and
//! driven through its accessibility tree.

mod common;

use common::*;
use egui_kittest::kittest::Queryable;
use egui_kittest::Harness;
use mentris::messages::HistoryConfig;
use mentris::ui::{MentrisApp, VoiceSettings};
use mentris::MentrisError;
use std::sync::Arc;

fn harness(app: MentrisApp) -> Harness<'static, MentrisApp> {
    Harness::builder()
        .with_size(egui::Vec2::new(800.0, 600.0))
        .build_state(|ctx, app: &mut MentrisApp| app.ui(ctx), app)
}

fn app_with(model: ScriptedModel, capture: ScriptedCapture, voice: VoiceSettings) -> MentrisApp {
    MentrisApp::with_chat(coordinator_with(
        Arc::new(model),
        Arc::new(capture),
        Arc::new(RecordingOutput::default()),
        &HistoryConfig::default(),
        voice,
    ))
}

fn app(model: ScriptedModel) -> MentrisApp {
    app_with(model, ScriptedCapture::default(), VoiceSettings::default())
}

/// Let workers finish, then render the result
fn settle(harness: &mut Harness<'static, MentrisApp>) {
    assert!(harness.state_mut().chat_mut().wait_idle(TIMEOUT));
    harness.run();
}

#[test]
fn test_welcome_message_shown() {
    let mut harness = harness(app(ScriptedModel::default()));
    harness.run();

    let _welcome = harness.get_by_label("Mentris: Bem-vindo! Como posso te ajudar hoje?");
}

#[test]
fn test_controls_exist() {
    let mut harness = harness(app(ScriptedModel::default()));
    harness.run();

    let _input = harness.get_by_label("Message input");
    let _send = harness.get_by_label("Send message");
    let _voice = harness.get_by_label("Voice input");
}

#[test]
fn test_type_text_into_input() {
    let mut harness = harness(app(ScriptedModel::default()));
    harness.run();

    harness.get_by_label("Message input").focus();
    harness.run();
    harness.get_by_label("Message input").type_text("Olá, Mentris!");
    harness.run();

    assert_eq!(harness.state().chat().input_text, "Olá, Mentris!");
}

#[test]
fn test_send_streams_reply_into_log() {
    let model = ScriptedModel::new(vec![Reply::text(&["2 + 2 ", "é 4."])]);
    let mut harness = harness(app(model));
    harness.run();

    harness.get_by_label("Message input").focus();
    harness.run();
    harness.get_by_label("Message input").type_text("Quanto é 2 + 2?");
    harness.run();

    harness.get_by_label("Send message").click();
    harness.run();
    assert!(harness.state().chat().input_text.is_empty());

    settle(&mut harness);

    let _question = harness.get_by_label("Você: Quanto é 2 + 2?");
    let _answer = harness.get_by_label("Mentris: 2 + 2 é 4.");
    assert_eq!(harness.state().chat().history().completed_turns(), 1);
}

#[test]
fn test_cannot_send_empty_message() {
    let model = Arc::new(ScriptedModel::default());
    let chat = coordinator(
        model.clone(),
        Arc::new(ScriptedCapture::default()),
        Arc::new(RecordingOutput::default()),
    );
    let mut harness = harness(MentrisApp::with_chat(chat));
    harness.run();

    harness.get_by_label("Send message").click();
    harness.run();

    assert!(model.requests().is_empty());
    assert_eq!(harness.state().chat().log().len(), 1);
}

#[test]
fn test_stream_failure_shows_system_error() {
    let model = ScriptedModel::new(vec![Reply::fail_after(&["meia"], "servidor caiu")]);
    let mut harness = harness(app(model));
    harness.run();

    harness.state_mut().chat_mut().input_text = "Oi".to_string();
    harness.get_by_label("Send message").click();
    harness.run();
    settle(&mut harness);

    let _error = harness.get_by_label("Sistema: Erro: servidor caiu");
    assert_eq!(harness.state().chat().history().completed_turns(), 0);
}

#[test]
fn test_voice_button_starts_turn() {
    let model = ScriptedModel::new(vec![Reply::text(&["Bom dia!"])]);
    let capture = ScriptedCapture::new(vec![Ok("Bom dia".into())]);
    let mut harness = harness(app_with(model, capture, VoiceSettings::default()));
    harness.run();

    harness.get_by_label("Voice input").click();
    harness.run();
    settle(&mut harness);

    let _question = harness.get_by_label("Você: Bom dia");
    let _answer = harness.get_by_label("Mentris: Bom dia!");
}

#[test]
fn test_voice_failure_is_reported() {
    let capture = ScriptedCapture::new(vec![Err(MentrisError::NoSpeechRecognized)]);
    let mut harness = harness(app_with(ScriptedModel::default(), capture, VoiceSettings::default()));
    harness.run();

    harness.get_by_label("Voice input").click();
    harness.run();
    settle(&mut harness);

    let _error = harness.get_by_label("Sistema: Erro: não entendi o que falou.");
    assert!(harness.state().chat().input_enabled());
}

#[test]
fn test_voice_button_inert_without_recognizer() {
    let voice = VoiceSettings {
        capture: false,
        speak_replies: false,
    };
    let capture = ScriptedCapture::new(vec![Ok("nunca ouvido".into())]);
    let mut harness = harness(app_with(ScriptedModel::default(), capture, voice));
    harness.run();

    harness.get_by_label("Voice input").click();
    harness.run();

    assert!(!harness.state().chat().is_listening());
    assert_eq!(harness.state().chat().log().len(), 1);
}
