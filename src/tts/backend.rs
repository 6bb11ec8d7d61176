//! Синтез речи через HTTP бэкенд
//!
//! Бэкенд возвращает ссылку на аудио и его измеренную длительность, после
//! чего аудио скачивается вторым запросом.

use std::time::Duration;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use crate::config::{EngineKind, PlayerConfig};
use crate::error::{Result, TtsPlayerError};
use crate::playback::rate::format_rate_percent;
use crate::tts::{AudioFormat, SpeechProvider, SynthesizedAudio};

/// Тело запроса синтеза
#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    voice: &'a str,
    rate: String,
}

/// Ответ бэкенда
#[derive(Debug, Deserialize)]
pub struct TtsResponse {
    /// Путь к аудио относительно адреса бэкенда
    pub url: String,
    /// Длительность аудио в секундах
    #[serde(default)]
    pub duration: Option<f64>,
}

/// Провайдер синтеза через HTTP бэкенд
pub struct BackendSpeechProvider {
    base_url: Option<String>,
    client: Client,
}

impl BackendSpeechProvider {
    pub fn new(base_url: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("Failed to build HTTP client with timeout, using defaults: {}", e);
                Client::new()
            });
        Self {
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
            client,
        }
    }

    pub fn from_config(config: &PlayerConfig) -> Self {
        Self::new(
            config.backend_base_url(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn base_url(&self) -> Result<&str> {
        self.base_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| TtsPlayerError::ConfigurationMissing("backend URL is not configured".to_string()))
    }
}

/// Определить формат по ссылке на аудио
fn format_from_url(url: &str) -> AudioFormat {
    let path = url.split('?').next().unwrap_or(url);
    if path.to_ascii_lowercase().ends_with(".wav") {
        AudioFormat::Wav
    } else {
        AudioFormat::Mp3
    }
}

/// Полный адрес аудио
fn resolve_audio_url(base_url: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else if url.starts_with('/') {
        format!("{}{}", base_url, url)
    } else {
        format!("{}/{}", base_url, url)
    }
}

#[async_trait]
impl SpeechProvider for BackendSpeechProvider {
    fn kind(&self) -> EngineKind {
        EngineKind::Backend
    }

    async fn synthesize(&self, text: &str, voice: &str, rate_hint: f64) -> Result<SynthesizedAudio> {
        let base_url = self.base_url()?;

        log::info!("Sending TTS request to backend {}", base_url);
        let response = self
            .client
            .post(format!("{}/api/tts", base_url))
            .json(&TtsRequest {
                text,
                voice,
                rate: format_rate_percent(rate_hint),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = match response.text().await {
                Ok(text) => text,
                Err(e) => format!("Failed to read error response: {}", e),
            };
            return Err(TtsPlayerError::Provider(format!(
                "Backend TTS failed (status {}): {}",
                status, error_text
            )));
        }

        let result: TtsResponse = response.json().await?;
        let audio_url = resolve_audio_url(base_url, &result.url);
        let bytes = self.client.get(&audio_url).send().await?.error_for_status()?.bytes().await?;
        if bytes.is_empty() {
            return Err(TtsPlayerError::Provider(format!("Backend returned empty audio at {}", audio_url)));
        }

        let mut audio = SynthesizedAudio::new(bytes, format_from_url(&result.url), EngineKind::Backend);
        audio.duration = result.duration;
        Ok(audio)
    }
}
