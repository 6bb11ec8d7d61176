//! Плеер озвучки
//!
//! Все события (тики часов видео, действия пользователя, результаты
//! синтеза и завершение аудио) проходят через одну очередь и
//! обрабатываются по одному. Синтез и ожидание конца аудио выполняются в
//! отдельных задачах, которые возвращают результат в ту же очередь.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use crate::config::{PlaybackMode, PlayerConfig, PlayerSettings, SpeedStrategy};
use crate::error::{Result, TtsPlayerError};
use crate::media::audio::{AudioSink, PlaybackWatch};
use crate::media::video::VideoSurface;
use crate::playback::arbiter::{Generation, SynthesisRequest};
use crate::playback::synchronizer::{PlaybackSynchronizer, SynthesisOutcome};
use crate::status::StatusNotifier;
use crate::subtitle::timeline::CueTimeline;
use crate::tts::{ProviderChain, SynthesizedAudio};

/// Событие для плеера
#[derive(Debug)]
pub enum PlayerEvent {
    ClockTick(f64),
    VideoPlayed,
    VideoPaused,
    SetMode(PlaybackMode),
    ToggleMode,
    SetStrategy(SpeedStrategy),
    SetAutoRate(bool),
    SetManualRate(f64),
    SetVoice(String),
    LoadTimeline(CueTimeline),
    ApplyTranslation {
        texts: Vec<String>,
        reply: oneshot::Sender<Result<()>>,
    },
    PreviewVoice,
    Settings(oneshot::Sender<PlayerSettings>),
    SynthesisFinished {
        generation: Generation,
        result: Result<SynthesizedAudio>,
    },
    AudioFinished {
        generation: Generation,
    },
    AudioFailed {
        generation: Generation,
        message: String,
    },
    Shutdown,
}

/// Ручка для отправки событий в работающий плеер
#[derive(Clone)]
pub struct PlayerHandle {
    sender: mpsc::UnboundedSender<PlayerEvent>,
}

impl PlayerHandle {
    fn send(&self, event: PlayerEvent) -> Result<()> {
        self.sender
            .send(event)
            .map_err(|_| TtsPlayerError::Other("player is not running".to_string()))
    }

    /// Текущее время видео в секундах
    pub fn clock_tick(&self, time: f64) -> Result<()> {
        self.send(PlayerEvent::ClockTick(time))
    }

    pub fn video_played(&self) -> Result<()> {
        self.send(PlayerEvent::VideoPlayed)
    }

    pub fn video_paused(&self) -> Result<()> {
        self.send(PlayerEvent::VideoPaused)
    }

    pub fn set_mode(&self, mode: PlaybackMode) -> Result<()> {
        self.send(PlayerEvent::SetMode(mode))
    }

    pub fn toggle_mode(&self) -> Result<()> {
        self.send(PlayerEvent::ToggleMode)
    }

    pub fn set_strategy(&self, strategy: SpeedStrategy) -> Result<()> {
        self.send(PlayerEvent::SetStrategy(strategy))
    }

    pub fn set_auto_rate(&self, enabled: bool) -> Result<()> {
        self.send(PlayerEvent::SetAutoRate(enabled))
    }

    pub fn set_manual_rate(&self, rate: f64) -> Result<()> {
        self.send(PlayerEvent::SetManualRate(rate))
    }

    pub fn set_voice(&self, voice: impl Into<String>) -> Result<()> {
        self.send(PlayerEvent::SetVoice(voice.into()))
    }

    pub fn load_timeline(&self, timeline: CueTimeline) -> Result<()> {
        self.send(PlayerEvent::LoadTimeline(timeline))
    }

    /// Заменить текст субтитров переводом
    pub async fn apply_translation(&self, texts: Vec<String>) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(PlayerEvent::ApplyTranslation { texts, reply })?;
        response
            .await
            .map_err(|_| TtsPlayerError::Other("player stopped before replying".to_string()))?
    }

    pub fn preview_voice(&self) -> Result<()> {
        self.send(PlayerEvent::PreviewVoice)
    }

    /// Снимок пользовательских настроек
    pub async fn settings(&self) -> Result<PlayerSettings> {
        let (reply, response) = oneshot::channel();
        self.send(PlayerEvent::Settings(reply))?;
        response
            .await
            .map_err(|_| TtsPlayerError::Other("player stopped before replying".to_string()))
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(PlayerEvent::Shutdown)
    }
}

/// Плеер, озвучивающий субтитры синхронно с видео
pub struct TtsPlayer {
    synchronizer: PlaybackSynchronizer,
    chain: Arc<ProviderChain>,
    sender: mpsc::UnboundedSender<PlayerEvent>,
    events: mpsc::UnboundedReceiver<PlayerEvent>,
}

impl TtsPlayer {
    /// Создать плеер с цепочкой провайдеров из конфигурации
    pub fn new(config: &PlayerConfig, video: Box<dyn VideoSurface>, audio: Box<dyn AudioSink>) -> Self {
        Self::with_chain(config, ProviderChain::from_config(config), video, audio, StatusNotifier::new())
    }

    /// Создать плеер с заданной цепочкой провайдеров и строками состояния
    pub fn with_chain(
        config: &PlayerConfig,
        chain: ProviderChain,
        video: Box<dyn VideoSurface>,
        audio: Box<dyn AudioSink>,
        status: StatusNotifier,
    ) -> Self {
        if chain.is_empty() {
            log::warn!("No speech providers configured, every cue will be skipped");
        }
        let (sender, events) = mpsc::unbounded_channel();
        Self {
            synchronizer: PlaybackSynchronizer::new(config, video, audio, status),
            chain: Arc::new(chain),
            sender,
            events,
        }
    }

    pub fn handle(&self) -> PlayerHandle {
        PlayerHandle {
            sender: self.sender.clone(),
        }
    }

    /// Обрабатывать события до команды завершения
    pub async fn run(mut self) {
        log::info!("TTS player started with providers {:?}", self.chain.kinds());
        while let Some(event) = self.events.recv().await {
            if !self.handle_event(event) {
                break;
            }
        }
        log::info!("TTS player stopped");
    }

    fn handle_event(&mut self, event: PlayerEvent) -> bool {
        match event {
            PlayerEvent::ClockTick(time) => {
                let request = self.synchronizer.on_clock_tick(time);
                self.dispatch(request);
            }
            PlayerEvent::VideoPlayed => {
                let request = self.synchronizer.on_video_play();
                self.dispatch(request);
            }
            PlayerEvent::VideoPaused => self.synchronizer.on_video_pause(),
            PlayerEvent::SetMode(mode) => self.synchronizer.set_mode(mode),
            PlayerEvent::ToggleMode => self.synchronizer.toggle_mode(),
            PlayerEvent::SetStrategy(strategy) => self.synchronizer.set_strategy(strategy),
            PlayerEvent::SetAutoRate(enabled) => self.synchronizer.set_auto_rate(enabled),
            PlayerEvent::SetManualRate(rate) => self.synchronizer.set_manual_rate(rate),
            PlayerEvent::SetVoice(voice) => self.synchronizer.set_voice(voice),
            PlayerEvent::LoadTimeline(timeline) => self.synchronizer.load_timeline(timeline),
            PlayerEvent::ApplyTranslation { texts, reply } => {
                let _ = reply.send(self.synchronizer.apply_translation(&texts));
            }
            PlayerEvent::PreviewVoice => {
                let request = self.synchronizer.preview_voice();
                self.dispatch(request);
            }
            PlayerEvent::Settings(reply) => {
                let _ = reply.send(self.synchronizer.settings());
            }
            PlayerEvent::SynthesisFinished { generation, result } => {
                if let SynthesisOutcome::Playing { generation, watch, .. } =
                    self.synchronizer.on_synthesis_result(generation, result)
                {
                    self.watch_playback(generation, watch);
                }
            }
            PlayerEvent::AudioFinished { generation } => self.synchronizer.on_audio_finished(generation),
            PlayerEvent::AudioFailed { generation, message } => {
                self.synchronizer.on_audio_failed(generation, &message)
            }
            PlayerEvent::Shutdown => {
                self.synchronizer.stop_speaking();
                return false;
            }
        }
        true
    }

    fn dispatch(&self, request: Option<SynthesisRequest>) {
        let Some(request) = request else {
            return;
        };

        let chain = self.chain.clone();
        let sender = self.sender.clone();
        tokio::spawn(async move {
            log::debug!("Synthesizing utterance {}: {:?}", request.generation, request.text);
            let result = chain
                .synthesize(&request.text, &request.voice, request.rate_hint)
                .await;
            let _ = sender.send(PlayerEvent::SynthesisFinished {
                generation: request.generation,
                result,
            });
        });
    }

    fn watch_playback(&self, generation: Generation, watch: PlaybackWatch) {
        let sender = self.sender.clone();
        tokio::spawn(async move {
            let event = match watch.await {
                Ok(Ok(())) => PlayerEvent::AudioFinished { generation },
                Ok(Err(message)) => PlayerEvent::AudioFailed { generation, message },
                // Аудиовыход остановлен без результата
                Err(_) => PlayerEvent::AudioFinished { generation },
            };
            let _ = sender.send(event);
        });
    }
}
