pub mod audio;
pub mod integration;
pub mod llm;
pub mod messages;
pub mod speech;
pub mod ui;

use integration::dispatcher::TaskKind;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MentrisError {
    #[error("Model stream error: {0}")]
    StreamError(String),

    #[error("No speech recognized")]
    NoSpeechRecognized,

    #[error("Speech recognition service error: {0}")]
    RecognitionServiceError(String),

    #[error("Speech synthesis error: {0}")]
    SynthesisError(String),

    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    #[error("Audio processing error: {0}")]
    AudioProcessingError(String),

    #[error("Model load error: {0}")]
    ModelLoadError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("A {0} task is already running")]
    SlotBusy(TaskKind),
}

impl From<std::io::Error> for MentrisError {
    fn from(e: std::io::Error) -> Self {
        MentrisError::IOError(e.to_string())
    }
}

impl MentrisError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            // The user simply re-issues the action
            MentrisError::StreamError(_) => true,
            MentrisError::NoSpeechRecognized => true,
            MentrisError::RecognitionServiceError(_) => true,
            MentrisError::SynthesisError(_) => true,
            MentrisError::AudioProcessingError(_) => true,
            MentrisError::SlotBusy(_) => true,
            // Hardware, model and setup problems need user intervention
            MentrisError::AudioDeviceError(_) => false,
            MentrisError::ModelLoadError(_) => false,
            MentrisError::ConfigError(_) => false,
            MentrisError::IOError(_) => false,
            MentrisError::ChannelError(_) => false,
        }
    }

    /// Get a user-friendly description, in the language of the chat surface
    pub fn user_message(&self) -> String {
        match self {
            MentrisError::StreamError(e) => e.clone(),
            MentrisError::NoSpeechRecognized => "não entendi o que falou.".to_string(),
            MentrisError::RecognitionServiceError(e) => format!("erro no serviço de voz: {}", e),
            MentrisError::SynthesisError(e) => format!("falha ao falar a resposta: {}", e),
            MentrisError::AudioDeviceError(_) => {
                "problema no dispositivo de áudio. Verifique o microfone e os alto-falantes."
                    .to_string()
            }
            MentrisError::AudioProcessingError(_) => {
                "falha no processamento de áudio. Tente novamente.".to_string()
            }
            MentrisError::ModelLoadError(_) => {
                "não foi possível carregar o modelo. Verifique os arquivos configurados."
                    .to_string()
            }
            MentrisError::ConfigError(e) => format!("configuração inválida: {}", e),
            MentrisError::IOError(_) => "erro de sistema de arquivos.".to_string(),
            MentrisError::ChannelError(_) => {
                "erro interno de comunicação. Reinicie o aplicativo.".to_string()
            }
            MentrisError::SlotBusy(_) => "aguarde a tarefa atual terminar.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MentrisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(MentrisError::StreamError("down".into()).is_recoverable());
        assert!(MentrisError::NoSpeechRecognized.is_recoverable());
        assert!(MentrisError::SlotBusy(TaskKind::ChatTurn).is_recoverable());
        assert!(!MentrisError::ModelLoadError("missing".into()).is_recoverable());
        assert!(!MentrisError::ConfigError("bad".into()).is_recoverable());
    }

    #[test]
    fn test_stream_error_message_passes_through() {
        let err = MentrisError::StreamError("connection refused".into());
        assert_eq!(err.user_message(), "connection refused");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: MentrisError = io.into();
        assert!(matches!(err, MentrisError::IOError(_)));
    }
}
