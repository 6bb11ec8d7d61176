//! Модуль обработки ошибок библиотеки tts-player
//!
//! Ни одна из ошибок не является фатальной для плеера: в худшем случае
//! пропускается озвучка одного субтитра, а видео продолжает воспроизводиться.

use thiserror::Error;

/// Ошибки библиотеки tts-player
#[derive(Debug, Error)]
pub enum TtsPlayerError {
    /// Все провайдеры синтеза речи завершились ошибкой
    #[error("Speech synthesis unavailable: {0}")]
    SynthesisUnavailable(String),

    /// Аудиовыход не смог начать или продолжить воспроизведение
    #[error("Playback device error: {0}")]
    PlaybackDevice(String),

    /// Не задан обязательный параметр конфигурации
    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    /// Ошибка отдельного провайдера синтеза
    #[error("Provider error: {0}")]
    Provider(String),

    /// Ошибка HTTP запроса
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Ошибка WebSocket соединения
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Ошибка разбора URL
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Ошибка парсинга субтитров
    #[error("Subtitle parsing error: {0}")]
    SubtitleParsing(String),

    /// Неверный формат
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Другая ошибка
    #[error("Other error: {0}")]
    Other(String),
}

impl From<&str> for TtsPlayerError {
    fn from(s: &str) -> Self {
        TtsPlayerError::Other(s.to_string())
    }
}

impl From<String> for TtsPlayerError {
    fn from(s: String) -> Self {
        TtsPlayerError::Other(s)
    }
}

/// Тип Result для библиотеки tts-player
pub type Result<T> = std::result::Result<T, TtsPlayerError>;
