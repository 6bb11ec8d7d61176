//! Модуль для работы с субтитрами

pub mod parser;
pub mod timeline;

pub use parser::{Cue, SubtitleFormat};
pub use timeline::CueTimeline;
