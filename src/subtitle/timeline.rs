//! Временная шкала субтитров
//!
//! Шкала неизменна в пределах одной загрузки. Перевод заменяет только текст,
//! позиции и временные метки субтитров сохраняются.

use std::path::Path;
use crate::error::{Result, TtsPlayerError};
use crate::subtitle::parser::{self, Cue};

/// Упорядоченный список субтитров с исходным снимком текста
#[derive(Debug, Clone, Default)]
pub struct CueTimeline {
    cues: Vec<Cue>,
    original: Vec<Cue>,
}

impl CueTimeline {
    /// Создать шкалу из списка субтитров
    ///
    /// Субтитры сортируются по времени начала.
    pub fn new(mut cues: Vec<Cue>) -> Self {
        cues.sort_by(|a, b| a.start.total_cmp(&b.start));
        Self {
            original: cues.clone(),
            cues,
        }
    }

    /// Разобрать текст SRT/WebVTT
    pub fn from_subtitle_text(content: &str) -> Result<Self> {
        Ok(Self::new(parser::parse_subtitles(content)?))
    }

    /// Загрузить файл субтитров
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(parser::parse_subtitle_file(path)?))
    }

    /// Найти субтитр, активный в момент `time`
    ///
    /// Возвращается первый подходящий субтитр в порядке шкалы; для
    /// перекрывающихся субтитров более поздние не рассматриваются.
    pub fn find_active_cue(&self, time: f64) -> Option<(usize, &Cue)> {
        self.cues
            .iter()
            .enumerate()
            .find(|(_, cue)| cue.contains(time))
    }

    pub fn get(&self, index: usize) -> Option<&Cue> {
        self.cues.get(index)
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    /// Исходные субтитры до перевода
    pub fn original_cues(&self) -> &[Cue] {
        &self.original
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Заменить текст субтитров переводом
    ///
    /// Число строк перевода должно совпадать с числом субтитров; текст
    /// строится от исходного снимка, поэтому повторный перевод не накапливает
    /// ошибок.
    pub fn apply_translation(&mut self, texts: &[String]) -> Result<()> {
        if texts.len() != self.original.len() {
            return Err(TtsPlayerError::InvalidFormat(format!(
                "Translation has {} lines, timeline has {} cues",
                texts.len(),
                self.original.len()
            )));
        }

        self.cues = self
            .original
            .iter()
            .zip(texts)
            .map(|(cue, text)| {
                let text = text.trim();
                // Пустой перевод оставляет исходный текст
                let text = if text.is_empty() { cue.text.as_str() } else { text };
                Cue::new(cue.start, cue.end, text)
            })
            .collect();

        Ok(())
    }

    /// Вернуть исходный текст субтитров
    pub fn restore_original(&mut self) {
        self.cues = self.original.clone();
    }
}
