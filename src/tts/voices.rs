//! Список голосов
//!
//! Голоса запрашиваются напрямую у потокового сервиса, при неудаче у
//! бэкенда.

use std::time::Duration;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use crate::config::{PlayerConfig, DEFAULT_VOICE, EDGE_VOICE_LIST_URL};
use crate::error::{Result, TtsPlayerError};

/// Описание голоса
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VoiceInfo {
    pub short_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub local_name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub friendly_name: Option<String>,
}

impl VoiceInfo {
    /// Название голоса для отображения
    pub fn label(&self) -> String {
        let name = self
            .local_name
            .as_deref()
            .or(self.display_name.as_deref())
            .or(self.friendly_name.as_deref())
            .or(self.name.as_deref())
            .unwrap_or(&self.short_name);
        match self.locale.as_deref().or(self.gender.as_deref()) {
            Some(suffix) => format!("{} ({})", name, suffix),
            None => name.to_string(),
        }
    }
}

/// Получить список голосов
pub async fn fetch_voices(config: &PlayerConfig) -> Result<Vec<VoiceInfo>> {
    let client = Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()?;

    let url = format!("{}?trustedclienttoken={}", EDGE_VOICE_LIST_URL, config.edge_trusted_token);
    match fetch_list(&client, &url).await {
        Ok(voices) if !voices.is_empty() => return Ok(voices),
        Ok(_) => log::warn!("Voice service returned an empty list, trying backend"),
        Err(e) => log::warn!("Failed to fetch voices from voice service, trying backend: {}", e),
    }

    let base_url = config
        .backend_base_url()
        .ok_or_else(|| TtsPlayerError::ConfigurationMissing("backend URL is not configured".to_string()))?;
    fetch_list(&client, &format!("{}/api/voices", base_url)).await
}

async fn fetch_list(client: &Client, url: &str) -> Result<Vec<VoiceInfo>> {
    let voices = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json::<Vec<VoiceInfo>>()
        .await?;
    Ok(voices)
}

/// Голоса с локалью, начинающейся с `locale_prefix`
///
/// Если таких голосов нет, возвращается весь список.
pub fn preferred_voices<'a>(voices: &'a [VoiceInfo], locale_prefix: &str) -> Vec<&'a VoiceInfo> {
    let matching: Vec<&VoiceInfo> = voices
        .iter()
        .filter(|voice| voice.locale.as_deref().is_some_and(|locale| locale.starts_with(locale_prefix)))
        .collect();
    if matching.is_empty() {
        voices.iter().collect()
    } else {
        matching
    }
}

/// Выбрать голос: сохраненный, затем голос по умолчанию, затем первый
pub fn select_voice(voices: &[&VoiceInfo], saved: Option<&str>) -> Option<String> {
    let contains = |name: &str| voices.iter().any(|voice| voice.short_name == name);
    if let Some(saved) = saved.filter(|name| contains(name)) {
        return Some(saved.to_string());
    }
    if contains(DEFAULT_VOICE) {
        return Some(DEFAULT_VOICE.to_string());
    }
    voices.first().map(|voice| voice.short_name.clone())
}

/// Пример текста для прослушивания голоса
pub fn preview_text(voice: &str) -> &'static str {
    if voice.contains("English") || voice.contains("en-") {
        "Hello, this is a sample of my voice."
    } else if voice.contains("Japanese") || voice.contains("ja-") {
        "こんにちは、これは私の声のサンプルです。"
    } else {
        "你好，我是这个声音。Hello, this is a sample."
    }
}
