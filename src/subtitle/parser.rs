//! Модуль для парсинга субтитров
//!
//! Этот модуль содержит функции для парсинга WebVTT и SRT в список субтитров.

use std::path::Path;
use lazy_static::lazy_static;
use regex::Regex;
use crate::error::{Result, TtsPlayerError};

lazy_static! {
    static ref TAG_REGEX: Regex = Regex::new(r"<[^>]+>").unwrap();
}

/// Субтитр с временными метками в секундах
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    /// Время начала, секунды
    pub start: f64,
    /// Время окончания, секунды
    pub end: f64,
    /// Текст субтитра
    pub text: String,
}

impl Cue {
    /// Создать новый субтитр
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// Длительность показа субтитра
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Активен ли субтитр в момент `time`
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time <= self.end
    }
}

/// Формат файла субтитров
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    /// WebVTT
    WebVtt,
    /// SubRip
    Srt,
}

impl SubtitleFormat {
    /// Определить формат по содержимому
    pub fn detect(content: &str) -> Self {
        let head = content.trim_start_matches('\u{feff}').trim_start();
        if head.starts_with("WEBVTT") {
            return Self::WebVtt;
        }
        // В SRT миллисекунды отделяются запятой
        match head.lines().find(|line| line.contains("-->")) {
            Some(line) if line.contains(',') => Self::Srt,
            Some(_) => Self::WebVtt,
            None => Self::Srt,
        }
    }
}

/// Парсинг файла субтитров с автоопределением формата
pub fn parse_subtitle_file<P: AsRef<Path>>(path: P) -> Result<Vec<Cue>> {
    let content = std::fs::read_to_string(&path).map_err(|e| {
        TtsPlayerError::SubtitleParsing(format!(
            "Failed to open subtitle file {}: {}",
            path.as_ref().display(),
            e
        ))
    })?;
    parse_subtitles(&content)
}

/// Парсинг текста субтитров с автоопределением формата
pub fn parse_subtitles(content: &str) -> Result<Vec<Cue>> {
    let cues = match SubtitleFormat::detect(content) {
        SubtitleFormat::WebVtt => parse_vtt(content),
        SubtitleFormat::Srt => parse_srt(content),
    };
    if cues.is_empty() && !content.trim().is_empty() {
        return Err(TtsPlayerError::InvalidFormat(
            "No subtitle cues found in input".to_string(),
        ));
    }
    log::info!("Parsed {} subtitle cues", cues.len());
    Ok(cues)
}

/// Парсинг WebVTT
///
/// Заголовок и метаданные до первой строки с `-->` пропускаются.
pub fn parse_vtt(content: &str) -> Vec<Cue> {
    parse_blocks(content)
}

/// Парсинг SRT
pub fn parse_srt(content: &str) -> Vec<Cue> {
    parse_blocks(content)
}

/// Разбор на блоки, разделенные пустыми строками
fn parse_blocks(content: &str) -> Vec<Cue> {
    let normalized = content.replace("\r\n", "\n");
    let mut cues = Vec::new();
    let mut current_block: Vec<&str> = Vec::new();

    for line in normalized.lines() {
        if line.trim().is_empty() {
            if !current_block.is_empty() {
                if let Some(cue) = parse_cue_block(&current_block) {
                    cues.push(cue);
                }
                current_block.clear();
            }
        } else {
            current_block.push(line);
        }
    }

    // Обрабатываем последний блок, если он есть
    if !current_block.is_empty() {
        if let Some(cue) = parse_cue_block(&current_block) {
            cues.push(cue);
        }
    }

    cues
}

/// Парсинг блока субтитра
fn parse_cue_block(lines: &[&str]) -> Option<Cue> {
    let timing_index = lines.iter().position(|line| line.contains("-->"))?;
    let parts: Vec<&str> = lines[timing_index].split("-->").collect();
    if parts.len() != 2 {
        log::warn!("Malformed timing line: {}", lines[timing_index]);
        return None;
    }

    let start = parse_timestamp(parts[0])?;
    // После времени окончания в WebVTT могут идти настройки позиционирования
    let end = parse_timestamp(parts[1].split_whitespace().next()?)?;
    if end <= start {
        log::warn!("Skipping cue with non-positive duration: {}", lines[timing_index]);
        return None;
    }

    let text = lines[timing_index + 1..]
        .iter()
        .map(|line| TAG_REGEX.replace_all(line.trim(), "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<String>>()
        .join(" ");

    if text.is_empty() {
        return None;
    }

    Some(Cue::new(start, end, text))
}

/// Парсинг строки времени в форматах HH:MM:SS.mmm, MM:SS.mmm и HH:MM:SS,mmm
pub fn parse_timestamp(time_str: &str) -> Option<f64> {
    let normalized = time_str.trim().replace(',', ".");
    let parts: Vec<&str> = normalized.split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return None;
    }

    let (hours, minutes, seconds_part) = if parts.len() == 3 {
        (parts[0].parse::<u64>().ok()?, parts[1].parse::<u64>().ok()?, parts[2])
    } else {
        (0, parts[0].parse::<u64>().ok()?, parts[1])
    };

    let seconds_parts: Vec<&str> = seconds_part.split('.').collect();
    let seconds = seconds_parts[0].parse::<u64>().ok()?;
    let milliseconds = if seconds_parts.len() > 1 {
        let ms_str = seconds_parts[1];
        let ms = ms_str.parse::<u64>().ok()?;
        match ms_str.len() {
            1 => ms * 100,
            2 => ms * 10,
            3 => ms,
            _ => ms / 10_u64.pow(ms_str.len() as u32 - 3),
        }
    } else {
        0
    };

    let total_ms = hours * 3_600_000 + minutes * 60_000 + seconds * 1000 + milliseconds;
    Some(total_ms as f64 / 1000.0)
}
