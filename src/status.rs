//! Модуль строк состояния
//!
//! Плеер сообщает пользователю о переключениях и ошибках короткими
//! сообщениями. Сообщения носят справочный характер и доставляются
//! наблюдателям, подписанным на [`StatusNotifier`].

use std::sync::Arc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Уровень сообщения
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Info,
    Success,
    Error,
}

/// Строка состояния
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub level: StatusLevel,
    pub text: String,
}

impl StatusMessage {
    pub fn new(level: StatusLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

/// Трейт для наблюдателя, получающего строки состояния
pub trait StatusObserver: Send + Sync {
    /// Метод, вызываемый при новом сообщении
    fn on_status(&self, status: &StatusMessage);
}

/// Наблюдатель, пишущий сообщения в лог
#[derive(Default)]
pub struct LogStatusObserver;

impl StatusObserver for LogStatusObserver {
    fn on_status(&self, status: &StatusMessage) {
        match status.level {
            StatusLevel::Error => log::error!("[status] {}", status.text),
            _ => log::info!("[status] {}", status.text),
        }
    }
}

/// Наблюдатель, сохраняющий сообщения в памяти
#[derive(Clone, Default)]
pub struct MemoryStatusObserver {
    history: Arc<Mutex<Vec<StatusMessage>>>,
}

impl MemoryStatusObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Получить историю сообщений
    pub fn history(&self) -> Vec<StatusMessage> {
        self.history.lock().clone()
    }

    /// Последнее сообщение
    pub fn last(&self) -> Option<StatusMessage> {
        self.history.lock().last().cloned()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }
}

impl StatusObserver for MemoryStatusObserver {
    fn on_status(&self, status: &StatusMessage) {
        self.history.lock().push(status.clone());
    }
}

/// Наблюдатель, отправляющий сообщения в канал
pub struct ChannelStatusObserver {
    sender: mpsc::UnboundedSender<StatusMessage>,
}

impl ChannelStatusObserver {
    pub fn new(sender: mpsc::UnboundedSender<StatusMessage>) -> Self {
        Self { sender }
    }
}

impl StatusObserver for ChannelStatusObserver {
    fn on_status(&self, status: &StatusMessage) {
        if self.sender.send(status.clone()).is_err() {
            log::debug!("Status receiver dropped");
        }
    }
}

/// Наблюдатель, вызывающий функцию обратного вызова
pub struct CallbackStatusObserver<F>
where
    F: Fn(&StatusMessage) + Send + Sync + 'static,
{
    callback: F,
}

impl<F> CallbackStatusObserver<F>
where
    F: Fn(&StatusMessage) + Send + Sync + 'static,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> StatusObserver for CallbackStatusObserver<F>
where
    F: Fn(&StatusMessage) + Send + Sync + 'static,
{
    fn on_status(&self, status: &StatusMessage) {
        (self.callback)(status);
    }
}

/// Наблюдатель, объединяющий несколько наблюдателей
#[derive(Default)]
pub struct CompositeStatusObserver {
    observers: Vec<Box<dyn StatusObserver>>,
}

impl CompositeStatusObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_observer(&mut self, observer: Box<dyn StatusObserver>) {
        self.observers.push(observer);
    }

    /// Удалить всех наблюдателей
    pub fn clear(&mut self) {
        self.observers.clear();
    }
}

impl StatusObserver for CompositeStatusObserver {
    fn on_status(&self, status: &StatusMessage) {
        for observer in &self.observers {
            observer.on_status(status);
        }
    }
}

/// Рассыльщик строк состояния
///
/// Без подписчиков сообщения только пишутся в лог.
#[derive(Default)]
pub struct StatusNotifier {
    observers: Vec<Box<dyn StatusObserver>>,
}

impl StatusNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавить наблюдателя
    pub fn add_observer(&mut self, observer: Box<dyn StatusObserver>) {
        self.observers.push(observer);
    }

    pub fn info(&self, text: impl Into<String>) {
        self.notify(StatusMessage::new(StatusLevel::Info, text));
    }

    pub fn success(&self, text: impl Into<String>) {
        self.notify(StatusMessage::new(StatusLevel::Success, text));
    }

    pub fn error(&self, text: impl Into<String>) {
        self.notify(StatusMessage::new(StatusLevel::Error, text));
    }

    /// Уведомить всех наблюдателей
    pub fn notify(&self, status: StatusMessage) {
        if self.observers.is_empty() {
            LogStatusObserver.on_status(&status);
            return;
        }
        for observer in &self.observers {
            observer.on_status(&status);
        }
    }
}
