//! Модуль синтеза речи
//!
//! Все варианты синтеза реализуют единый трейт [`SpeechProvider`] и
//! перебираются цепочкой [`ProviderChain`] в фиксированном порядке.

pub mod backend;
pub mod chain;
pub mod edge;
pub mod frame;
pub mod local;
pub mod voices;

use async_trait::async_trait;
use bytes::Bytes;
use crate::config::EngineKind;
use crate::error::Result;

pub use chain::ProviderChain;

/// Формат синтезированного аудио
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
}

impl AudioFormat {
    /// Подсказка расширения для определения формата
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
        }
    }
}

/// Результат синтеза речи
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    /// Байты аудио
    pub data: Bytes,
    /// Формат аудио
    pub format: AudioFormat,
    /// Длительность в секундах, если известна
    pub duration: Option<f64>,
    /// Какой вариант синтеза вернул аудио
    pub provider: EngineKind,
}

impl SynthesizedAudio {
    pub fn new(data: Bytes, format: AudioFormat, provider: EngineKind) -> Self {
        Self {
            data,
            format,
            duration: None,
            provider,
        }
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Длительность, если она известна и положительна
    pub fn measured_duration(&self) -> Option<f64> {
        self.duration.filter(|d| d.is_finite() && *d > 0.0)
    }
}

/// Трейт провайдера синтеза речи
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Вариант синтеза
    fn kind(&self) -> EngineKind;

    /// Синтезировать речь для текста
    async fn synthesize(&self, text: &str, voice: &str, rate_hint: f64) -> Result<SynthesizedAudio>;
}
