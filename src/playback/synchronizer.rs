//! Синхронизатор воспроизведения
//!
//! Единственный владелец состояния сеанса. Реагирует на тики часов видео,
//! события паузы/воспроизведения и результаты синтеза, связывает паузу
//! видео с жизнью текущей реплики.
//!
//! Фазы: `Idle` → `AwaitingSynthesis` → `Speaking` → `Idle`. При стратегии
//! `pause_video` видео может быть остановлено синхронизатором, это
//! наблюдаемая снаружи фаза `PausedForSpeech`.

use crate::config::{EngineKind, PlaybackMode, PlayerConfig, PlayerSettings, SpeedStrategy, clamp_manual_rate};
use crate::error::{Result, TtsPlayerError};
use crate::media::audio::{AudioSink, PlaybackWatch};
use crate::media::video::VideoSurface;
use crate::playback::arbiter::{CueRef, Generation, SynthesisArbiter, SynthesisRequest};
use crate::playback::rate::{duration_fit_rate, text_density_rate, NEUTRAL_RATE};
use crate::status::StatusNotifier;
use crate::subtitle::timeline::CueTimeline;
use crate::tts::voices::preview_text;
use crate::tts::SynthesizedAudio;

/// Запас перед концом субтитра, при котором видео ставится на паузу
const PAUSE_LEAD_SECS: f64 = 0.1;

/// Фаза синхронизатора
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    AwaitingSynthesis,
    Speaking,
    PausedForSpeech,
}

/// Состояние сеанса воспроизведения
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub mode: PlaybackMode,
    pub strategy: SpeedStrategy,
    pub auto_rate_enabled: bool,
    pub manual_rate: f64,
    pub phase: SyncPhase,
    pub active_cue_index: Option<usize>,
    pub last_spoken_cue_index: Option<usize>,
    pub pending_generation: Option<Generation>,
    pub synthesis_in_flight: bool,
    pub audio_playing: bool,
    pub speaking_cue_end: Option<f64>,
    pub video_paused_by_synchronizer: bool,
    /// Скорость последней реплики
    pub current_rate: f64,
}

impl SessionState {
    fn from_config(config: &PlayerConfig) -> Self {
        Self {
            mode: config.mode,
            strategy: config.strategy,
            auto_rate_enabled: config.auto_rate,
            manual_rate: clamp_manual_rate(config.manual_rate),
            phase: SyncPhase::Idle,
            active_cue_index: None,
            last_spoken_cue_index: None,
            pending_generation: None,
            synthesis_in_flight: false,
            audio_playing: false,
            speaking_cue_end: None,
            video_paused_by_synchronizer: false,
            current_rate: NEUTRAL_RATE,
        }
    }
}

/// Итог обработки результата синтеза
#[derive(Debug)]
pub enum SynthesisOutcome {
    /// Результат устарел и отброшен
    Stale,
    /// Аудио запущено
    Playing {
        generation: Generation,
        rate: f64,
        watch: PlaybackWatch,
    },
    /// Реплика пропущена, воспроизведение видео восстановлено
    Failed,
}

/// Текущая реплика
#[derive(Debug, Clone, Copy)]
struct Utterance {
    generation: Generation,
    cue: Option<CueRef>,
    strategy: SpeedStrategy,
    provisional_rate: f64,
}

/// Синхронизатор видео и синтезированной речи
pub struct PlaybackSynchronizer {
    timeline: CueTimeline,
    arbiter: SynthesisArbiter,
    state: SessionState,
    voice: String,
    /// Первый вариант синтеза в порядке перебора
    engine: Option<EngineKind>,
    current: Option<Utterance>,
    video: Box<dyn VideoSurface>,
    audio: Box<dyn AudioSink>,
    status: StatusNotifier,
}

impl PlaybackSynchronizer {
    pub fn new(
        config: &PlayerConfig,
        mut video: Box<dyn VideoSurface>,
        audio: Box<dyn AudioSink>,
        status: StatusNotifier,
    ) -> Self {
        video.set_muted(config.mode == PlaybackMode::Tts);
        Self {
            timeline: CueTimeline::default(),
            arbiter: SynthesisArbiter::new(),
            state: SessionState::from_config(config),
            voice: config.voice.clone(),
            engine: config.engines.iter().min().copied(),
            current: None,
            video,
            audio,
            status,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> SyncPhase {
        self.state.phase
    }

    pub fn timeline(&self) -> &CueTimeline {
        &self.timeline
    }

    pub fn voice(&self) -> &str {
        &self.voice
    }

    /// Снимок пользовательских настроек для сохранения
    pub fn settings(&self) -> PlayerSettings {
        PlayerSettings {
            engine: self.engine,
            voice: Some(self.voice.clone()),
            auto_rate: self.state.auto_rate_enabled,
            strategy: self.state.strategy,
            rate: self.state.manual_rate,
            tts_mode: self.state.mode == PlaybackMode::Tts,
        }
    }

    /// Обработать тик часов видео
    ///
    /// Возвращает запрос синтеза, если начался новый субтитр в режиме озвучки.
    pub fn on_clock_tick(&mut self, time: f64) -> Option<SynthesisRequest> {
        if self.must_hold_for_speech(time) {
            self.hold_video_for_speech();
            return None;
        }

        if self.timeline.is_empty() {
            return None;
        }

        let found = self.timeline.find_active_cue(time).map(|(index, _)| index);
        if found == self.state.active_cue_index {
            return None;
        }

        log::debug!("Active cue changed: {:?} -> {:?} at {:.3}s", self.state.active_cue_index, found, time);
        self.state.active_cue_index = found;

        match found {
            Some(index) if self.state.mode == PlaybackMode::Tts => {
                let request = self.begin_cue(index);
                self.state.last_spoken_cue_index = Some(index);
                request
            }
            Some(_) => None,
            None => {
                self.stop_speaking();
                None
            }
        }
    }

    /// Обработать результат синтеза
    pub fn on_synthesis_result(
        &mut self,
        generation: Generation,
        result: Result<SynthesizedAudio>,
    ) -> SynthesisOutcome {
        let utterance = match self.current_utterance(generation) {
            Some(utterance) => utterance,
            None => {
                log::debug!("Dropping stale synthesis result {}", generation);
                return SynthesisOutcome::Stale;
            }
        };

        self.state.synthesis_in_flight = false;
        self.state.pending_generation = None;

        let audio = match result {
            Ok(audio) => audio,
            Err(e) => {
                self.fail_utterance(&e);
                return SynthesisOutcome::Failed;
            }
        };

        let rate = self.final_rate(&utterance, &audio);
        self.state.current_rate = rate;
        match self.audio.play(&audio, rate) {
            Ok(watch) => {
                log::info!("Speaking utterance {} at rate {:.2}", generation, rate);
                self.state.audio_playing = true;
                self.settle_phase();
                SynthesisOutcome::Playing { generation, rate, watch }
            }
            Err(e) => {
                self.fail_utterance(&e);
                SynthesisOutcome::Failed
            }
        }
    }

    /// Аудио реплики доиграло до конца
    pub fn on_audio_finished(&mut self, generation: Generation) {
        if self.current_utterance(generation).is_none() {
            log::debug!("Ignoring completion of stale utterance {}", generation);
            return;
        }

        self.current = None;
        self.state.audio_playing = false;
        self.state.speaking_cue_end = None;
        self.release_video();
        self.settle_phase();
    }

    /// Аудиовыход не смог доиграть реплику
    pub fn on_audio_failed(&mut self, generation: Generation, message: &str) {
        if self.current_utterance(generation).is_none() {
            log::debug!("Ignoring failure of stale utterance {}: {}", generation, message);
            return;
        }
        self.fail_utterance(&TtsPlayerError::PlaybackDevice(message.to_string()));
    }

    /// Видео поставлено на паузу
    pub fn on_video_pause(&mut self) {
        if self.state.video_paused_by_synchronizer {
            log::debug!("Video paused by synchronizer, keeping speech");
            return;
        }
        self.stop_speaking();
    }

    /// Видео продолжило воспроизведение
    pub fn on_video_play(&mut self) -> Option<SynthesisRequest> {
        if self.state.video_paused_by_synchronizer {
            // Пользователь снял паузу, не дожидаясь конца речи
            log::debug!("Video resumed while held for speech");
            self.state.video_paused_by_synchronizer = false;
            self.state.speaking_cue_end = None;
            self.settle_phase();
            return None;
        }

        if self.state.mode != PlaybackMode::Tts {
            return None;
        }

        let index = self.state.active_cue_index?;
        if self.state.last_spoken_cue_index == Some(index) {
            return None;
        }

        let request = self.begin_cue(index);
        self.state.last_spoken_cue_index = Some(index);
        request
    }

    /// Переключить режим звука
    pub fn set_mode(&mut self, mode: PlaybackMode) {
        if self.state.mode == mode {
            return;
        }
        self.state.mode = mode;

        match mode {
            PlaybackMode::Tts => {
                self.video.set_muted(true);
                self.status.success("Включен режим озвучки субтитров");
            }
            PlaybackMode::Original => {
                self.video.set_muted(false);
                self.stop_speaking();
                self.status.success("Включен оригинальный звук");
            }
        }
        log::info!("Playback mode switched to {}", mode.as_str());
    }

    pub fn toggle_mode(&mut self) {
        self.set_mode(self.state.mode.toggled());
    }

    /// Сменить стратегию согласования длительности
    pub fn set_strategy(&mut self, strategy: SpeedStrategy) {
        if self.state.strategy == strategy {
            return;
        }
        self.state.strategy = strategy;
        self.state.speaking_cue_end = None;
        self.release_video();
        self.settle_phase();
        log::info!("Speed strategy switched to {}", strategy.as_str());
    }

    pub fn set_auto_rate(&mut self, enabled: bool) {
        self.state.auto_rate_enabled = enabled;
        if enabled {
            self.status.info("Включен автоматический подбор скорости речи");
        } else {
            self.status.info("Включена ручная скорость речи");
        }
    }

    pub fn set_manual_rate(&mut self, rate: f64) {
        self.state.manual_rate = clamp_manual_rate(rate);
    }

    pub fn set_voice(&mut self, voice: impl Into<String>) {
        self.voice = voice.into();
    }

    /// Загрузить новую шкалу субтитров
    pub fn load_timeline(&mut self, timeline: CueTimeline) {
        self.stop_speaking();
        log::info!("Loaded timeline with {} cues", timeline.len());
        self.timeline = timeline;
        self.state.active_cue_index = None;
        self.state.last_spoken_cue_index = None;
    }

    /// Заменить текст субтитров переводом
    pub fn apply_translation(&mut self, texts: &[String]) -> Result<()> {
        self.timeline.apply_translation(texts)
    }

    /// Озвучить пример текста выбранным голосом
    pub fn preview_voice(&mut self) -> Option<SynthesisRequest> {
        self.stop_speaking();
        let text = preview_text(&self.voice);
        self.speak(text, None, self.state.manual_rate)
    }

    /// Остановить текущую реплику и вернуть видео, если оно удерживается
    pub fn stop_speaking(&mut self) {
        self.arbiter.cancel_all();
        self.current = None;
        self.state.pending_generation = None;
        self.state.synthesis_in_flight = false;
        if self.state.audio_playing {
            self.audio.stop();
            self.state.audio_playing = false;
        }
        self.state.speaking_cue_end = None;
        self.release_video();
        self.settle_phase();
    }

    fn begin_cue(&mut self, index: usize) -> Option<SynthesisRequest> {
        let cue = self.timeline.get(index)?.clone();
        self.stop_speaking();

        let text = cue.text.trim();
        if text.is_empty() {
            return None;
        }

        let provisional_rate = if self.state.auto_rate_enabled && self.state.strategy == SpeedStrategy::SpeedUp {
            text_density_rate(text, cue.duration())
        } else {
            self.state.manual_rate
        };

        self.speak(text, Some(CueRef::new(index, &cue)), provisional_rate)
    }

    fn speak(&mut self, text: &str, cue: Option<CueRef>, provisional_rate: f64) -> Option<SynthesisRequest> {
        let strategy = self.state.strategy;
        let request = self.arbiter.issue(text, self.voice.as_str(), strategy, cue);

        self.state.pending_generation = Some(request.generation);
        self.state.synthesis_in_flight = true;
        self.state.current_rate = provisional_rate;
        if strategy == SpeedStrategy::PauseVideo {
            // Конец субтитра нужен сразу, чтобы успеть остановить видео до прихода аудио
            self.state.speaking_cue_end = cue.map(|cue| cue.end);
        }
        self.current = Some(Utterance {
            generation: request.generation,
            cue,
            strategy,
            provisional_rate,
        });
        self.settle_phase();
        Some(request)
    }

    fn current_utterance(&self, generation: Generation) -> Option<Utterance> {
        if !self.arbiter.is_current(generation) {
            return None;
        }
        self.current.filter(|utterance| utterance.generation == generation)
    }

    fn final_rate(&self, utterance: &Utterance, audio: &SynthesizedAudio) -> f64 {
        if utterance.strategy != SpeedStrategy::SpeedUp || !self.state.auto_rate_enabled {
            return self.state.manual_rate;
        }
        match (utterance.cue, audio.measured_duration()) {
            (Some(cue), Some(duration)) => duration_fit_rate(duration, cue.duration(), self.video.playback_rate()),
            _ => utterance.provisional_rate,
        }
    }

    fn must_hold_for_speech(&self, time: f64) -> bool {
        if self.state.mode != PlaybackMode::Tts || self.state.strategy != SpeedStrategy::PauseVideo {
            return false;
        }
        let Some(end) = self.state.speaking_cue_end else {
            return false;
        };
        time >= end - PAUSE_LEAD_SECS && (self.state.synthesis_in_flight || self.state.audio_playing)
    }

    fn hold_video_for_speech(&mut self) {
        if self.state.video_paused_by_synchronizer || self.video.is_paused() {
            return;
        }
        log::info!(
            "Reached cue end {:?} before speech finished, pausing video",
            self.state.speaking_cue_end
        );
        self.state.video_paused_by_synchronizer = true;
        self.video.pause();
        self.settle_phase();
    }

    fn release_video(&mut self) {
        if self.state.video_paused_by_synchronizer {
            log::debug!("Resuming video held for speech");
            self.state.video_paused_by_synchronizer = false;
            self.video.play();
        }
    }

    fn fail_utterance(&mut self, error: &TtsPlayerError) {
        log::error!("Skipping speech for current cue: {}", error);
        self.status.error(format!("Не удалось озвучить субтитр: {}", error));

        self.current = None;
        self.state.pending_generation = None;
        self.state.synthesis_in_flight = false;
        if self.state.audio_playing {
            self.audio.stop();
            self.state.audio_playing = false;
        }
        self.state.speaking_cue_end = None;
        self.release_video();
        self.settle_phase();
    }

    fn settle_phase(&mut self) {
        let phase = if self.state.video_paused_by_synchronizer {
            SyncPhase::PausedForSpeech
        } else if self.state.synthesis_in_flight {
            SyncPhase::AwaitingSynthesis
        } else if self.state.audio_playing {
            SyncPhase::Speaking
        } else {
            SyncPhase::Idle
        };

        if phase != self.state.phase {
            log::debug!("Synchronizer phase {:?} -> {:?}", self.state.phase, phase);
            self.state.phase = phase;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use tokio::sync::oneshot;
    use crate::status::{MemoryStatusObserver, StatusLevel};
    use crate::subtitle::parser::Cue;
    use crate::tts::AudioFormat;

    #[derive(Debug, Default)]
    struct VideoLog {
        paused: bool,
        pause_calls: usize,
        play_calls: usize,
        muted: bool,
        speed: Option<f64>,
    }

    struct FakeVideo(Arc<Mutex<VideoLog>>);

    impl VideoSurface for FakeVideo {
        fn play(&mut self) {
            let mut log = self.0.lock();
            log.paused = false;
            log.play_calls += 1;
        }

        fn pause(&mut self) {
            let mut log = self.0.lock();
            log.paused = true;
            log.pause_calls += 1;
        }

        fn is_paused(&self) -> bool {
            self.0.lock().paused
        }

        fn playback_rate(&self) -> f64 {
            self.0.lock().speed.unwrap_or(1.0)
        }

        fn set_muted(&mut self, muted: bool) {
            self.0.lock().muted = muted;
        }
    }

    #[derive(Default)]
    struct SinkLog {
        rates: Vec<f64>,
        stops: usize,
        fail: bool,
        senders: Vec<oneshot::Sender<std::result::Result<(), String>>>,
    }

    struct FakeSink(Arc<Mutex<SinkLog>>);

    impl AudioSink for FakeSink {
        fn play(&mut self, _audio: &SynthesizedAudio, rate: f64) -> Result<PlaybackWatch> {
            let mut log = self.0.lock();
            if log.fail {
                return Err(TtsPlayerError::PlaybackDevice("no output device".to_string()));
            }
            log.rates.push(rate);
            let (tx, rx) = oneshot::channel();
            log.senders.push(tx);
            Ok(rx)
        }

        fn stop(&mut self) {
            self.0.lock().stops += 1;
        }
    }

    struct Harness {
        sync: PlaybackSynchronizer,
        video: Arc<Mutex<VideoLog>>,
        sink: Arc<Mutex<SinkLog>>,
        status: MemoryStatusObserver,
    }

    fn harness(mode: PlaybackMode, strategy: SpeedStrategy, auto_rate: bool) -> Harness {
        let config = PlayerConfig {
            mode,
            strategy,
            auto_rate,
            manual_rate: 1.3,
            ..PlayerConfig::default()
        };
        let video = Arc::new(Mutex::new(VideoLog::default()));
        let sink = Arc::new(Mutex::new(SinkLog::default()));
        let status = MemoryStatusObserver::new();
        let mut notifier = StatusNotifier::new();
        notifier.add_observer(Box::new(status.clone()));

        let mut sync = PlaybackSynchronizer::new(
            &config,
            Box::new(FakeVideo(video.clone())),
            Box::new(FakeSink(sink.clone())),
            notifier,
        );
        sync.load_timeline(CueTimeline::new(vec![
            Cue::new(2.0, 4.0, "你好世界"),
            Cue::new(5.0, 6.0, "Second cue"),
            Cue::new(8.0, 10.0, "Third cue"),
        ]));

        Harness { sync, video, sink, status }
    }

    fn audio(duration: Option<f64>) -> SynthesizedAudio {
        let audio = SynthesizedAudio::new(Bytes::from_static(b"mp3"), AudioFormat::Mp3, EngineKind::Streaming);
        match duration {
            Some(duration) => audio.with_duration(duration),
            None => audio,
        }
    }

    #[test]
    fn test_original_mode_never_requests_synthesis() {
        let mut h = harness(PlaybackMode::Original, SpeedStrategy::SpeedUp, true);
        for tick in 0..100 {
            assert!(h.sync.on_clock_tick(tick as f64 * 0.1).is_none());
        }
        assert!(h.sync.on_video_play().is_none());
        assert_eq!(h.sync.state().active_cue_index, Some(2));
        assert_eq!(h.sync.phase(), SyncPhase::Idle);
    }

    #[test]
    fn test_one_request_per_cue_transition() {
        let mut h = harness(PlaybackMode::Tts, SpeedStrategy::SpeedUp, true);
        assert!(h.video.lock().muted);
        assert!(h.sync.on_clock_tick(1.0).is_none());

        let request = h.sync.on_clock_tick(2.1).unwrap();
        assert_eq!(request.text, "你好世界");
        assert_eq!(request.cue.unwrap().index, 0);
        assert_eq!(request.rate_hint, NEUTRAL_RATE);
        assert_eq!(h.sync.phase(), SyncPhase::AwaitingSynthesis);
        assert_eq!(h.sync.state().current_rate, 1.0);

        assert!(h.sync.on_clock_tick(2.5).is_none());
        assert!(h.sync.on_clock_tick(3.9).is_none());

        let second = h.sync.on_clock_tick(5.5).unwrap();
        assert!(second.generation > request.generation);
        assert_eq!(h.sync.state().last_spoken_cue_index, Some(1));
    }

    #[test]
    fn test_late_stale_result_does_not_mutate_state() {
        let mut h = harness(PlaybackMode::Tts, SpeedStrategy::SpeedUp, true);
        let a = h.sync.on_clock_tick(2.1).unwrap();
        let b = h.sync.on_clock_tick(5.1).unwrap();

        let outcome = h.sync.on_synthesis_result(b.generation, Ok(audio(Some(0.9))));
        assert!(matches!(outcome, SynthesisOutcome::Playing { .. }));
        let before = h.sync.state().clone();

        let outcome = h.sync.on_synthesis_result(a.generation, Ok(audio(Some(10.0))));
        assert!(matches!(outcome, SynthesisOutcome::Stale));
        assert_eq!(h.sync.state(), &before);
        assert_eq!(h.sink.lock().rates.len(), 1);

        h.sync.on_audio_finished(a.generation);
        assert_eq!(h.sync.phase(), SyncPhase::Speaking);
        h.sync.on_audio_finished(b.generation);
        assert_eq!(h.sync.phase(), SyncPhase::Idle);
    }

    #[test]
    fn test_speed_up_uses_measured_duration() {
        let mut h = harness(PlaybackMode::Tts, SpeedStrategy::SpeedUp, true);
        h.sync.load_timeline(CueTimeline::new(vec![Cue::new(0.0, 1.0, "Quick line")]));

        let request = h.sync.on_clock_tick(0.5).unwrap();
        match h.sync.on_synthesis_result(request.generation, Ok(audio(Some(2.6)))) {
            SynthesisOutcome::Playing { rate, .. } => assert_eq!(rate, 2.5),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(h.sink.lock().rates, vec![2.5]);
        assert_eq!(h.sync.phase(), SyncPhase::Speaking);
    }

    #[test]
    fn test_speed_up_without_duration_keeps_text_rate() {
        let mut h = harness(PlaybackMode::Tts, SpeedStrategy::SpeedUp, true);
        h.sync.load_timeline(CueTimeline::new(vec![Cue::new(0.0, 1.0, "一二三四五六七八九十")]));

        let request = h.sync.on_clock_tick(0.5).unwrap();
        h.sync.on_synthesis_result(request.generation, Ok(audio(None)));
        assert_eq!(h.sink.lock().rates, vec![2.5]);
    }

    #[test]
    fn test_manual_rate_without_auto() {
        let mut h = harness(PlaybackMode::Tts, SpeedStrategy::SpeedUp, false);
        let request = h.sync.on_clock_tick(2.5).unwrap();
        h.sync.set_manual_rate(1.7);
        h.sync.on_synthesis_result(request.generation, Ok(audio(Some(5.0))));
        assert_eq!(h.sink.lock().rates, vec![1.7]);

        h.sync.set_manual_rate(10.0);
        assert_eq!(h.sync.state().manual_rate, 3.0);
    }

    #[test]
    fn test_pause_video_holds_once_and_resumes() {
        let mut h = harness(PlaybackMode::Tts, SpeedStrategy::PauseVideo, true);
        let request = h.sync.on_clock_tick(2.1).unwrap();
        assert_eq!(h.sync.state().speaking_cue_end, Some(4.0));

        // До конца субтитра видео не трогаем
        assert!(h.sync.on_clock_tick(3.8).is_none());
        assert_eq!(h.video.lock().pause_calls, 0);

        // Синтез еще идет, а субтитр заканчивается
        assert!(h.sync.on_clock_tick(3.95).is_none());
        assert!(h.sync.on_clock_tick(3.96).is_none());
        assert!(h.sync.on_clock_tick(4.2).is_none());
        assert_eq!(h.video.lock().pause_calls, 1);
        assert_eq!(h.sync.phase(), SyncPhase::PausedForSpeech);
        assert!(h.sync.state().video_paused_by_synchronizer);

        // Собственная пауза не останавливает речь
        h.sync.on_video_pause();
        assert!(h.sync.state().synthesis_in_flight);

        match h.sync.on_synthesis_result(request.generation, Ok(audio(Some(3.0)))) {
            SynthesisOutcome::Playing { rate, .. } => assert_eq!(rate, 1.3),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(h.sync.phase(), SyncPhase::PausedForSpeech);
        assert!(h.sync.on_clock_tick(3.96).is_none());
        assert_eq!(h.video.lock().pause_calls, 1);

        h.sync.on_audio_finished(request.generation);
        assert_eq!(h.video.lock().play_calls, 1);
        assert!(!h.video.lock().paused);
        assert!(!h.sync.state().video_paused_by_synchronizer);
        assert_eq!(h.sync.state().speaking_cue_end, None);
        assert_eq!(h.sync.phase(), SyncPhase::Idle);

        // Следующий субтитр озвучивается как обычно
        assert!(h.sync.on_clock_tick(5.2).is_some());
    }

    #[test]
    fn test_audio_finishing_before_cue_end_does_not_pause() {
        let mut h = harness(PlaybackMode::Tts, SpeedStrategy::PauseVideo, true);
        let request = h.sync.on_clock_tick(2.1).unwrap();
        h.sync.on_synthesis_result(request.generation, Ok(audio(Some(1.0))));
        h.sync.on_audio_finished(request.generation);

        assert!(h.sync.on_clock_tick(3.95).is_none());
        assert_eq!(h.video.lock().pause_calls, 0);
        assert_eq!(h.video.lock().play_calls, 0);
    }

    #[test]
    fn test_failure_restores_playing_video() {
        let mut h = harness(PlaybackMode::Tts, SpeedStrategy::PauseVideo, true);
        let request = h.sync.on_clock_tick(2.1).unwrap();
        h.sync.on_clock_tick(3.95);
        assert!(h.video.lock().paused);

        let error = TtsPlayerError::SynthesisUnavailable("streaming: blocked; backend: down".to_string());
        assert!(matches!(h.sync.on_synthesis_result(request.generation, Err(error)), SynthesisOutcome::Failed));

        assert!(!h.video.lock().paused);
        assert_eq!(h.sync.phase(), SyncPhase::Idle);
        assert_eq!(h.status.last().unwrap().level, StatusLevel::Error);
        assert!(!h.sync.state().video_paused_by_synchronizer);
    }

    #[test]
    fn test_failure_keeps_user_paused_video_paused() {
        let mut h = harness(PlaybackMode::Tts, SpeedStrategy::PauseVideo, true);
        h.video.lock().paused = true;
        let request = h.sync.on_clock_tick(2.1).unwrap();
        h.sync.on_clock_tick(3.95);
        assert_eq!(h.video.lock().pause_calls, 0);

        h.sync.on_synthesis_result(request.generation, Err(TtsPlayerError::SynthesisUnavailable("down".into())));
        assert!(h.video.lock().paused);
        assert_eq!(h.video.lock().play_calls, 0);
    }

    #[test]
    fn test_device_error_restores_playback() {
        let mut h = harness(PlaybackMode::Tts, SpeedStrategy::PauseVideo, true);
        h.sink.lock().fail = true;
        let request = h.sync.on_clock_tick(2.1).unwrap();
        h.sync.on_clock_tick(4.0);
        assert!(h.video.lock().paused);

        assert!(matches!(
            h.sync.on_synthesis_result(request.generation, Ok(audio(Some(1.0)))),
            SynthesisOutcome::Failed
        ));
        assert!(!h.video.lock().paused);
        assert_eq!(h.status.last().unwrap().level, StatusLevel::Error);
    }

    #[test]
    fn test_audio_failure_mid_speech_restores_playback() {
        let mut h = harness(PlaybackMode::Tts, SpeedStrategy::PauseVideo, true);
        let request = h.sync.on_clock_tick(2.1).unwrap();
        h.sync.on_synthesis_result(request.generation, Ok(audio(Some(5.0))));
        h.sync.on_clock_tick(3.95);
        assert_eq!(h.sync.phase(), SyncPhase::PausedForSpeech);

        h.sync.on_audio_failed(request.generation, "decoder error");
        assert!(!h.video.lock().paused);
        assert_eq!(h.sync.phase(), SyncPhase::Idle);
    }

    #[test]
    fn test_user_pause_cancels_speech() {
        let mut h = harness(PlaybackMode::Tts, SpeedStrategy::SpeedUp, true);
        let request = h.sync.on_clock_tick(2.1).unwrap();
        h.sync.on_video_pause();
        assert_eq!(h.sync.phase(), SyncPhase::Idle);

        let outcome = h.sync.on_synthesis_result(request.generation, Ok(audio(Some(1.0))));
        assert!(matches!(outcome, SynthesisOutcome::Stale));
        assert!(h.sink.lock().rates.is_empty());

        // Повторное воспроизведение не озвучивает уже начатый субтитр
        assert!(h.sync.on_video_play().is_none());
    }

    #[test]
    fn test_play_speaks_unspoken_active_cue() {
        let mut h = harness(PlaybackMode::Original, SpeedStrategy::SpeedUp, true);
        assert!(h.sync.on_clock_tick(2.5).is_none());
        h.sync.toggle_mode();
        assert!(h.video.lock().muted);

        let request = h.sync.on_video_play().unwrap();
        assert_eq!(request.cue.unwrap().index, 0);
        assert!(h.sync.on_video_play().is_none());
    }

    #[test]
    fn test_gap_stops_speech_immediately() {
        let mut h = harness(PlaybackMode::Tts, SpeedStrategy::SpeedUp, true);
        let request = h.sync.on_clock_tick(2.1).unwrap();
        h.sync.on_synthesis_result(request.generation, Ok(audio(Some(1.0))));
        assert_eq!(h.sync.phase(), SyncPhase::Speaking);

        assert!(h.sync.on_clock_tick(4.5).is_none());
        assert_eq!(h.sink.lock().stops, 1);
        assert_eq!(h.sync.phase(), SyncPhase::Idle);
        assert_eq!(h.sync.state().active_cue_index, None);
    }

    #[test]
    fn test_switch_to_original_releases_held_video() {
        let mut h = harness(PlaybackMode::Tts, SpeedStrategy::PauseVideo, true);
        h.sync.on_clock_tick(2.1).unwrap();
        h.sync.on_clock_tick(4.0);
        assert!(h.video.lock().paused);

        h.sync.set_mode(PlaybackMode::Original);
        assert!(!h.video.lock().paused);
        assert!(!h.video.lock().muted);
        assert_eq!(h.sync.phase(), SyncPhase::Idle);
        assert!(h.sync.on_clock_tick(5.5).is_none());
    }

    #[test]
    fn test_user_resume_overrides_hold() {
        let mut h = harness(PlaybackMode::Tts, SpeedStrategy::PauseVideo, true);
        let request = h.sync.on_clock_tick(2.1).unwrap();
        h.sync.on_clock_tick(4.0);
        h.video.lock().paused = false;

        assert!(h.sync.on_video_play().is_none());
        assert!(!h.sync.state().video_paused_by_synchronizer);
        assert_eq!(h.sync.phase(), SyncPhase::AwaitingSynthesis);

        // Речь продолжается, повторной паузы нет
        h.sync.on_clock_tick(4.0);
        assert_eq!(h.video.lock().pause_calls, 1);
        assert!(matches!(
            h.sync.on_synthesis_result(request.generation, Ok(audio(Some(1.0)))),
            SynthesisOutcome::Playing { .. }
        ));
    }

    #[test]
    fn test_strategy_change_releases_hold() {
        let mut h = harness(PlaybackMode::Tts, SpeedStrategy::PauseVideo, true);
        h.sync.on_clock_tick(2.1).unwrap();
        h.sync.on_clock_tick(4.0);
        assert!(h.video.lock().paused);

        h.sync.set_strategy(SpeedStrategy::SpeedUp);
        assert!(!h.video.lock().paused);
        assert_eq!(h.sync.phase(), SyncPhase::AwaitingSynthesis);
    }

    #[test]
    fn test_video_speed_shrinks_target_window() {
        let mut h = harness(PlaybackMode::Tts, SpeedStrategy::SpeedUp, true);
        h.video.lock().speed = Some(2.0);
        let request = h.sync.on_clock_tick(2.1).unwrap();
        // (2.0 / 2.0) - 0.2 = 0.8, 1.2 / 0.8 = 1.5
        match h.sync.on_synthesis_result(request.generation, Ok(audio(Some(1.2)))) {
            SynthesisOutcome::Playing { rate, .. } => assert!((rate - 1.5).abs() < 1e-9),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_preview_and_translation() {
        let mut h = harness(PlaybackMode::Tts, SpeedStrategy::SpeedUp, true);
        h.sync.set_voice("en-US-AriaNeural");
        let request = h.sync.preview_voice().unwrap();
        assert!(request.cue.is_none());
        assert!(request.text.starts_with("Hello"));

        let texts = vec!["Hello world".to_string(), "Zweite".to_string(), "Dritte".to_string()];
        h.sync.apply_translation(&texts).unwrap();
        let request = h.sync.on_clock_tick(2.1).unwrap();
        assert_eq!(request.text, "Hello world");
        assert_eq!(request.voice, "en-US-AriaNeural");
    }

    #[test]
    fn test_settings_snapshot() {
        let mut h = harness(PlaybackMode::Tts, SpeedStrategy::PauseVideo, false);
        h.sync.set_manual_rate(1.8);
        let settings = h.sync.settings();
        assert!(settings.tts_mode);
        assert_eq!(settings.strategy, SpeedStrategy::PauseVideo);
        assert_eq!(settings.rate, 1.8);
        assert!(!settings.auto_rate);
        assert_eq!(settings.engine, Some(EngineKind::Streaming));
    }

    #[test]
    fn test_settings_round_trip_through_config() {
        let config = PlayerConfig {
            engines: vec![EngineKind::Backend, EngineKind::OnDevice],
            mode: PlaybackMode::Tts,
            ..PlayerConfig::default()
        };
        let sync = PlaybackSynchronizer::new(
            &config,
            Box::new(FakeVideo(Arc::new(Mutex::new(VideoLog::default())))),
            Box::new(FakeSink(Arc::new(Mutex::new(SinkLog::default())))),
            StatusNotifier::new(),
        );
        let settings = sync.settings();
        assert_eq!(settings.engine, Some(EngineKind::OnDevice));

        let mut restored = PlayerConfig::default();
        restored.apply_settings(&settings);
        assert!(restored.engines.contains(&EngineKind::OnDevice));
        assert_eq!(restored.mode, PlaybackMode::Tts);

        let mut same = config.clone();
        same.apply_settings(&settings);
        assert_eq!(same.engines, config.engines);
    }
}
