//! Цепочка провайдеров синтеза
//!
//! Варианты перебираются строго последовательно до первого успеха. Ошибки
//! отдельных вариантов только логируются; наружу выходит одна составная
//! ошибка, если не сработал ни один.

use crate::config::{EngineKind, PlayerConfig};
use crate::error::{Result, TtsPlayerError};
use crate::media::audio::audio_duration;
use crate::tts::backend::BackendSpeechProvider;
use crate::tts::edge::EdgeSpeechProvider;
use crate::tts::local::LocalSpeechProvider;
use crate::tts::{SpeechProvider, SynthesizedAudio};

/// Упорядоченный набор провайдеров синтеза
pub struct ProviderChain {
    providers: Vec<Box<dyn SpeechProvider>>,
}

impl ProviderChain {
    /// Создать цепочку из провайдеров
    ///
    /// Провайдеры упорядочиваются: локальный, потоковый, HTTP бэкенд.
    pub fn new(mut providers: Vec<Box<dyn SpeechProvider>>) -> Self {
        providers.sort_by_key(|provider| provider.kind());
        Self { providers }
    }

    /// Собрать цепочку из включенных в конфигурации вариантов
    pub fn from_config(config: &PlayerConfig) -> Self {
        let mut engines = config.engines.clone();
        engines.sort();
        engines.dedup();

        let providers = engines
            .into_iter()
            .map(|engine| -> Box<dyn SpeechProvider> {
                match engine {
                    EngineKind::OnDevice => Box::new(LocalSpeechProvider::from_config(config)),
                    EngineKind::Streaming => Box::new(EdgeSpeechProvider::from_config(config)),
                    EngineKind::Backend => Box::new(BackendSpeechProvider::from_config(config)),
                }
            })
            .collect();

        Self::new(providers)
    }

    /// Варианты в порядке перебора
    pub fn kinds(&self) -> Vec<EngineKind> {
        self.providers.iter().map(|provider| provider.kind()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Синтезировать речь первым успешным вариантом
    pub async fn synthesize(&self, text: &str, voice: &str, rate_hint: f64) -> Result<SynthesizedAudio> {
        let mut failures = Vec::new();

        for provider in &self.providers {
            match provider.synthesize(text, voice, rate_hint).await {
                Ok(mut audio) => {
                    if audio.measured_duration().is_none() {
                        audio.duration = measure_duration(&audio).await;
                    }
                    log::info!(
                        "Synthesized {} bytes with {} provider (duration: {:?})",
                        audio.data.len(),
                        provider.kind().as_str(),
                        audio.duration
                    );
                    return Ok(audio);
                }
                Err(e) => {
                    log::warn!("{} provider failed, trying next: {}", provider.kind().as_str(), e);
                    failures.push(format!("{}: {}", provider.kind().as_str(), e));
                }
            }
        }

        if failures.is_empty() {
            return Err(TtsPlayerError::SynthesisUnavailable(
                "no speech providers configured".to_string(),
            ));
        }

        log::error!("All speech providers failed: {}", failures.join("; "));
        Err(TtsPlayerError::SynthesisUnavailable(failures.join("; ")))
    }
}

/// Измерить длительность аудио вне потоков асинхронного рантайма
async fn measure_duration(audio: &SynthesizedAudio) -> Option<f64> {
    let data = audio.data.clone();
    let format = audio.format;
    match tokio::task::spawn_blocking(move || audio_duration(&data, format)).await {
        Ok(duration) => duration,
        Err(e) => {
            log::warn!("Audio duration measurement failed: {}", e);
            None
        }
    }
}
