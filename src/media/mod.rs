//! Модуль для работы с медиа

pub mod audio;
pub mod video;

pub use audio::{AudioSink, FfplaySink, PlaybackWatch};
pub use video::VideoSurface;
