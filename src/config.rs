//! Модуль конфигурации библиотеки tts-player
//!
//! Этот модуль содержит структуры и перечисления для настройки плеера,
//! а также загрузку и сохранение настроек в JSON.

use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::error::Result;

/// Голос по умолчанию
pub const DEFAULT_VOICE: &str = "zh-CN-XiaoxiaoNeural";

/// Адрес бэкенда по умолчанию
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5001";

/// Токен клиента для потокового сервиса синтеза
pub const EDGE_TRUSTED_CLIENT_TOKEN: &str = "6A5AA1D4EAFF4E9FB37E23D68491D6F4";

/// WebSocket адрес потокового сервиса синтеза
pub const EDGE_WSS_URL: &str =
    "wss://speech.platform.bing.com/consumer/speech/synthesize/readaloud/edge/v1";

/// Адрес списка голосов потокового сервиса
pub const EDGE_VOICE_LIST_URL: &str =
    "https://speech.platform.bing.com/consumer/speech/synthesize/readaloud/voices/list";

/// Минимальная ручная скорость речи
pub const MIN_MANUAL_RATE: f64 = 0.5;

/// Максимальная ручная скорость речи
pub const MAX_MANUAL_RATE: f64 = 3.0;

/// Режим звука плеера
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    /// Оригинальная звуковая дорожка видео
    #[default]
    Original,
    /// Озвучка субтитров синтезированной речью
    Tts,
}

impl PlaybackMode {
    /// Получить строковое представление режима
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Tts => "tts",
        }
    }

    /// Противоположный режим
    pub fn toggled(&self) -> Self {
        match self {
            Self::Original => Self::Tts,
            Self::Tts => Self::Original,
        }
    }
}

/// Стратегия согласования длительности речи с окном субтитра
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpeedStrategy {
    /// Ускорить синтезированную речь, чтобы она уложилась в субтитр
    #[default]
    SpeedUp,
    /// Поставить видео на паузу, пока речь не закончится
    PauseVideo,
}

impl SpeedStrategy {
    /// Получить строковое представление стратегии
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SpeedUp => "speed_up",
            Self::PauseVideo => "pause_video",
        }
    }
}

/// Вариант провайдера синтеза речи
///
/// Порядок вариантов совпадает с порядком перебора в цепочке провайдеров.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Локальный движок синтеза без сети
    OnDevice,
    /// Потоковый облачный синтез
    Streaming,
    /// HTTP бэкенд
    Backend,
}

impl EngineKind {
    /// Получить строковое представление варианта
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnDevice => "on_device",
            Self::Streaming => "streaming",
            Self::Backend => "backend",
        }
    }
}

/// Конфигурация плеера
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Адрес бэкенда (нужен только HTTP варианту)
    pub backend_url: Option<String>,
    /// Идентификатор голоса
    pub voice: String,
    /// Включенные провайдеры синтеза
    pub engines: Vec<EngineKind>,
    /// Стратегия согласования длительности
    pub strategy: SpeedStrategy,
    /// Автоматический подбор скорости речи
    pub auto_rate: bool,
    /// Ручная скорость речи
    pub manual_rate: f64,
    /// Начальный режим звука
    pub mode: PlaybackMode,
    /// Команда локального движка синтеза
    pub local_engine_command: String,
    /// Голос локального движка (если отличается от основного)
    pub local_engine_voice: Option<String>,
    /// WebSocket адрес потокового сервиса
    pub edge_endpoint: String,
    /// Токен клиента потокового сервиса
    pub edge_trusted_token: String,
    /// Таймаут одного запроса к провайдеру в секундах
    pub request_timeout_secs: u64,
    /// Команда аудиоплеера для воспроизведения речи
    pub ffplay_command: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            backend_url: Some(DEFAULT_BACKEND_URL.to_string()),
            voice: DEFAULT_VOICE.to_string(),
            engines: vec![EngineKind::Streaming, EngineKind::Backend],
            strategy: SpeedStrategy::default(),
            auto_rate: true,
            manual_rate: 1.0,
            mode: PlaybackMode::default(),
            local_engine_command: "espeak-ng".to_string(),
            local_engine_voice: None,
            edge_endpoint: EDGE_WSS_URL.to_string(),
            edge_trusted_token: EDGE_TRUSTED_CLIENT_TOKEN.to_string(),
            request_timeout_secs: 30,
            ffplay_command: "ffplay".to_string(),
        }
    }
}

impl PlayerConfig {
    /// Загрузить конфигурацию из JSON файла
    ///
    /// Отсутствующие в файле ключи получают значения по умолчанию.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut config: PlayerConfig = serde_json::from_str(&content)?;
        config.manual_rate = clamp_manual_rate(config.manual_rate);
        log::info!("Loaded player config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Загрузить конфигурацию или вернуть значения по умолчанию
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load player config from {}: {}", path.as_ref().display(), e);
                Self::default()
            }
        }
    }

    /// Сохранить конфигурацию в JSON файл
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Адрес бэкенда без завершающего слэша, если он задан
    pub fn backend_base_url(&self) -> Option<String> {
        self.backend_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(|url| url.trim_end_matches('/').to_string())
    }

    /// Применить сохраненные настройки интерфейса
    pub fn apply_settings(&mut self, settings: &PlayerSettings) {
        if let Some(engine) = settings.engine {
            if !self.engines.contains(&engine) {
                self.engines.push(engine);
            }
        }
        if let Some(voice) = &settings.voice {
            self.voice = voice.clone();
        }
        self.auto_rate = settings.auto_rate;
        self.strategy = settings.strategy;
        self.manual_rate = clamp_manual_rate(settings.rate);
        self.mode = if settings.tts_mode { PlaybackMode::Tts } else { PlaybackMode::Original };
    }
}

/// Снимок пользовательских настроек плеера
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerSettings {
    /// Предпочитаемый движок
    pub engine: Option<EngineKind>,
    /// Выбранный голос
    pub voice: Option<String>,
    /// Автоматическая скорость
    pub auto_rate: bool,
    /// Стратегия
    pub strategy: SpeedStrategy,
    /// Ручная скорость
    pub rate: f64,
    /// Включен ли режим озвучки
    pub tts_mode: bool,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            engine: None,
            voice: None,
            auto_rate: true,
            strategy: SpeedStrategy::default(),
            rate: 1.0,
            tts_mode: false,
        }
    }
}

impl PlayerSettings {
    /// Загрузить настройки из JSON файла
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Сохранить настройки в JSON файл
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Ограничить ручную скорость допустимым диапазоном
pub fn clamp_manual_rate(rate: f64) -> f64 {
    if !rate.is_finite() {
        return 1.0;
    }
    rate.clamp(MIN_MANUAL_RATE, MAX_MANUAL_RATE)
}
