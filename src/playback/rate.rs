//! Расчет скорости воспроизведения речи
//!
//! Чистые функции без побочных эффектов. Синтез всегда запрашивается с
//! нейтральной скоростью, множитель применяется при воспроизведении.

use lazy_static::lazy_static;
use regex::Regex;

/// Нейтральная скорость синтеза
pub const NEUTRAL_RATE: f64 = 1.0;

/// Минимальная автоматическая скорость
pub const MIN_AUTO_RATE: f64 = 0.8;

/// Максимальная автоматическая скорость
pub const MAX_AUTO_RATE: f64 = 2.5;

/// Базовая плотность речи при скорости 1.0, взвешенных символов в секунду
pub const BASELINE_CHARS_PER_SECOND: f64 = 2.5;

/// Запас, чтобы речь успевала закончиться до конца субтитра
pub const SAFETY_FACTOR: f64 = 1.2;

/// Окно вокруг 1.0, в котором скорость округляется до 1.0
const SNAP_LOW: f64 = 0.85;
const SNAP_HIGH: f64 = 1.15;

/// Резерв времени в конце субтитра, секунды
const END_MARGIN_SECS: f64 = 0.2;

/// Минимальное целевое время речи, секунды
const MIN_TARGET_SECS: f64 = 0.5;

const PUNCTUATION: &str = "，。！？、；：“”‘’（）,.!?;:()\"'";

lazy_static! {
    static ref LATIN_WORD_REGEX: Regex = Regex::new(r"[a-zA-Z]+").unwrap();
}

/// Состав текста для оценки плотности
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TextDensity {
    pub ideographs: usize,
    pub latin_words: usize,
    pub punctuation: usize,
}

impl TextDensity {
    /// Посчитать состав текста
    pub fn of(text: &str) -> Self {
        Self {
            ideographs: text.chars().filter(|c| ('\u{4e00}'..='\u{9fa5}').contains(c)).count(),
            latin_words: LATIN_WORD_REGEX.find_iter(text).count(),
            punctuation: text.chars().filter(|c| PUNCTUATION.contains(*c)).count(),
        }
    }

    /// Взвешенное число символов
    pub fn weighted(&self) -> f64 {
        self.ideographs as f64 + 0.7 * self.latin_words as f64 + 0.3 * self.punctuation as f64
    }
}

/// Взвешенное число символов текста
pub fn weighted_char_count(text: &str) -> f64 {
    TextDensity::of(text).weighted()
}

/// Скорость по плотности текста
///
/// Возвращает 1.0 для пустого текста или нулевой длительности, иначе
/// значение в диапазоне [0.8, 2.5].
pub fn text_density_rate(text: &str, duration: f64) -> f64 {
    let weighted = weighted_char_count(text);
    if duration <= 0.0 || weighted < 1.0 || !duration.is_finite() {
        return NEUTRAL_RATE;
    }

    let required = weighted / duration;
    let rate = (required / BASELINE_CHARS_PER_SECOND * SAFETY_FACTOR).clamp(MIN_AUTO_RATE, MAX_AUTO_RATE);

    let rate = if (SNAP_LOW..=SNAP_HIGH).contains(&rate) { NEUTRAL_RATE } else { rate };
    log::debug!(
        "Text density rate: weighted={:.1}, duration={:.2}s, rate={:.2}",
        weighted,
        duration,
        rate
    );
    rate
}

/// Скорость по измеренной длительности синтезированной речи
///
/// Ограничение несимметрично: слишком медленная скорость сбрасывается в 1.0,
/// а не поднимается до минимума.
pub fn duration_fit_rate(audio_duration: f64, cue_duration: f64, video_speed: f64) -> f64 {
    let video_speed = if video_speed > 0.0 && video_speed.is_finite() { video_speed } else { 1.0 };
    let target = (cue_duration / video_speed - END_MARGIN_SECS).max(MIN_TARGET_SECS);
    let rate = audio_duration / target;

    let rate = if rate > MAX_AUTO_RATE {
        MAX_AUTO_RATE
    } else if rate < MIN_AUTO_RATE || !rate.is_finite() {
        NEUTRAL_RATE
    } else {
        rate
    };
    log::debug!(
        "Duration fit rate: audio={:.2}s, cue={:.2}s, video speed={:.2}, rate={:.2}",
        audio_duration,
        cue_duration,
        video_speed,
        rate
    );
    rate
}

/// Записать множитель скорости в виде `+N%` для SSML
pub fn format_rate_percent(rate: f64) -> String {
    let percent = ((rate - 1.0) * 100.0).round() as i64;
    if percent >= 0 {
        format!("+{}%", percent)
    } else {
        format!("{}%", percent)
    }
}
