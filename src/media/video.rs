//! Модуль для управления видео
//!
//! Плеер не воспроизводит видео сам, он только управляет внешним
//! видеоэлементом через трейт [`VideoSurface`].

/// Внешний видеоэлемент
pub trait VideoSurface: Send {
    /// Продолжить воспроизведение
    fn play(&mut self);

    /// Поставить на паузу
    fn pause(&mut self);

    /// Стоит ли видео на паузе
    fn is_paused(&self) -> bool;

    /// Собственная скорость воспроизведения видео
    fn playback_rate(&self) -> f64 {
        1.0
    }

    /// Заглушить оригинальный звук
    fn set_muted(&mut self, muted: bool);
}
