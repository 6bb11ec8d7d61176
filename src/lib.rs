//! Основной файл библиотеки tts-player
//!
//! Библиотека озвучивает субтитры синтезированной речью синхронно с видео:
//! следит за временем воспроизведения, запрашивает синтез для каждого
//! нового субтитра, подбирает скорость речи и при необходимости ставит
//! видео на паузу, пока реплика не договорена.

pub mod config;
pub mod error;
pub mod media;
pub mod playback;
pub mod player;
pub mod status;
pub mod subtitle;
pub mod tts;

pub use config::{EngineKind, PlaybackMode, PlayerConfig, PlayerSettings, SpeedStrategy};
pub use error::{Result, TtsPlayerError};
pub use media::{AudioSink, FfplaySink, VideoSurface};
pub use player::{PlayerEvent, PlayerHandle, TtsPlayer};
pub use status::{StatusLevel, StatusMessage, StatusObserver};
pub use subtitle::{Cue, CueTimeline};
pub use tts::{ProviderChain, SpeechProvider, SynthesizedAudio};

/// Запустить плеер в фоновой задаче tokio
///
/// Синтез идет через варианты, включенные в конфигурации, звук выводится
/// через `ffplay`.
pub fn spawn_player(config: &PlayerConfig, video: Box<dyn VideoSurface>) -> PlayerHandle {
    let player = TtsPlayer::new(config, video, Box::new(FfplaySink::from_config(config)));
    let handle = player.handle();
    tokio::spawn(player.run());
    handle
}
