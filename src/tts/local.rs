//! Локальный синтез речи
//!
//! Запускает установленный движок синтеза (по умолчанию `espeak-ng`) и
//! читает WAV из стандартного вывода. Сеть не используется.

use std::process::Stdio;
use std::time::Duration;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::process::Command;
use crate::config::{EngineKind, PlayerConfig};
use crate::error::{Result, TtsPlayerError};
use crate::tts::{AudioFormat, SpeechProvider, SynthesizedAudio};

/// Скорость движка при множителе 1.0, слов в минуту
const BASE_WORDS_PER_MINUTE: f64 = 175.0;

/// Провайдер локального синтеза
pub struct LocalSpeechProvider {
    command: String,
    voice_override: Option<String>,
    timeout: Duration,
}

impl LocalSpeechProvider {
    pub fn new(command: impl Into<String>, voice_override: Option<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            voice_override,
            timeout,
        }
    }

    pub fn from_config(config: &PlayerConfig) -> Self {
        Self::new(
            config.local_engine_command.clone(),
            config.local_engine_voice.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn engine_voice(&self, voice: &str) -> String {
        self.voice_override
            .clone()
            .unwrap_or_else(|| engine_voice_for(voice))
    }
}

/// Голос локального движка для идентификатора облачного голоса
///
/// `zh-CN-XiaoxiaoNeural` превращается в `zh`, остальные значения
/// передаются как есть.
pub fn engine_voice_for(voice: &str) -> String {
    if voice.ends_with("Neural") {
        if let Some(language) = voice.split('-').next() {
            return language.to_ascii_lowercase();
        }
    }
    voice.to_string()
}

/// Скорость движка в словах в минуту
pub fn words_per_minute(rate_hint: f64) -> u32 {
    let rate = if rate_hint.is_finite() && rate_hint > 0.0 { rate_hint } else { 1.0 };
    (BASE_WORDS_PER_MINUTE * rate).round() as u32
}

/// Аргументы командной строки движка
///
/// Текст идет после `--`: реплики диалога начинаются с дефиса и иначе
/// читаются как опции.
pub fn engine_args(engine_voice: &str, rate_hint: f64, text: &str) -> Vec<String> {
    vec![
        "-v".to_string(),
        engine_voice.to_string(),
        "-s".to_string(),
        words_per_minute(rate_hint).to_string(),
        "--stdout".to_string(),
        "--".to_string(),
        text.to_string(),
    ]
}

#[async_trait]
impl SpeechProvider for LocalSpeechProvider {
    fn kind(&self) -> EngineKind {
        EngineKind::OnDevice
    }

    async fn synthesize(&self, text: &str, voice: &str, rate_hint: f64) -> Result<SynthesizedAudio> {
        let engine_voice = self.engine_voice(voice);
        log::debug!("Running local TTS engine {} with voice {}", self.command, engine_voice);

        let child = Command::new(&self.command)
            .args(engine_args(&engine_voice, rate_hint, text))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| TtsPlayerError::Provider(format!("{} timed out", self.command)))??;

        if !output.status.success() {
            return Err(TtsPlayerError::Provider(format!(
                "{} failed with status {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(TtsPlayerError::Provider(format!("{} produced no audio", self.command)));
        }

        Ok(SynthesizedAudio::new(Bytes::from(output.stdout), AudioFormat::Wav, EngineKind::OnDevice))
    }
}
