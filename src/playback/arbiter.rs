//! Арбитр запросов синтеза
//!
//! Каждый запрос получает номер поколения. Изменять состояние плеера может
//! только результат запроса с последним выданным номером, остальные
//! результаты отбрасываются при получении.

use std::fmt;
use crate::config::SpeedStrategy;
use crate::playback::rate::NEUTRAL_RATE;
use crate::subtitle::parser::Cue;

/// Номер поколения запроса синтеза
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Ссылка на субтитр, для которого синтезируется речь
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CueRef {
    pub index: usize,
    pub start: f64,
    pub end: f64,
}

impl CueRef {
    pub fn new(index: usize, cue: &Cue) -> Self {
        Self {
            index,
            start: cue.start,
            end: cue.end,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Запрос синтеза речи
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub generation: Generation,
    pub text: String,
    pub voice: String,
    pub cue: Option<CueRef>,
    pub strategy: SpeedStrategy,
    /// Скорость, с которой запрашивается синтез
    pub rate_hint: f64,
}

/// Счетчик поколений запросов синтеза
#[derive(Debug, Default)]
pub struct SynthesisArbiter {
    latest: u64,
}

impl SynthesisArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Выдать новый запрос, делая все предыдущие устаревшими
    pub fn issue(
        &mut self,
        text: impl Into<String>,
        voice: impl Into<String>,
        strategy: SpeedStrategy,
        cue: Option<CueRef>,
    ) -> SynthesisRequest {
        self.latest += 1;
        let generation = Generation(self.latest);
        log::debug!("Issued synthesis request {}", generation);
        SynthesisRequest {
            generation,
            text: text.into(),
            voice: voice.into(),
            cue,
            strategy,
            rate_hint: NEUTRAL_RATE,
        }
    }

    /// Является ли поколение последним выданным
    pub fn is_current(&self, generation: Generation) -> bool {
        generation.0 == self.latest
    }

    /// Сделать устаревшими все выданные запросы
    pub fn cancel_all(&mut self) {
        self.latest += 1;
    }

    /// Последнее значение счетчика
    pub fn latest(&self) -> Generation {
        Generation(self.latest)
    }
}
