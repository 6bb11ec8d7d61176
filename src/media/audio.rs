//! Модуль для воспроизведения и анализа аудио
//!
//! Этот модуль содержит трейт аудиовыхода, реализацию через `ffplay` и
//! определение длительности синтезированного аудио.

use std::io::Cursor;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::TimeBase;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::oneshot;
use crate::config::PlayerConfig;
use crate::error::{Result, TtsPlayerError};
use crate::tts::{AudioFormat, SynthesizedAudio};

/// Канал завершения воспроизведения
///
/// `Ok(())` означает, что аудио доиграло до конца, `Err` содержит описание
/// ошибки устройства. Закрытие канала без значения означает остановку.
pub type PlaybackWatch = oneshot::Receiver<std::result::Result<(), String>>;

/// Аудиовыход для синтезированной речи
pub trait AudioSink: Send {
    /// Начать воспроизведение с множителем скорости
    fn play(&mut self, audio: &SynthesizedAudio, rate: f64) -> Result<PlaybackWatch>;

    /// Остановить текущее воспроизведение
    fn stop(&mut self);
}

/// Воспроизведение через `ffplay`
pub struct FfplaySink {
    command: String,
    kill_switch: Option<oneshot::Sender<()>>,
    playing: Arc<AtomicBool>,
}

impl FfplaySink {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            kill_switch: None,
            playing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn from_config(config: &PlayerConfig) -> Self {
        Self::new(config.ffplay_command.clone())
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }
}

impl AudioSink for FfplaySink {
    fn play(&mut self, audio: &SynthesizedAudio, rate: f64) -> Result<PlaybackWatch> {
        self.stop();

        let filter = atempo_filter(rate);
        let mut child = Command::new(&self.command)
            .args(["-nodisp", "-autoexit", "-loglevel", "error", "-af", filter.as_str(), "-i", "pipe:0"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TtsPlayerError::PlaybackDevice(format!("Failed to start {}: {}", self.command, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| TtsPlayerError::PlaybackDevice("Audio player has no stdin".to_string()))?;

        let data = audio.data.clone();
        tokio::spawn(async move {
            // Ошибка записи ожидаема, если плеер остановлен раньше конца
            if let Err(e) = stdin.write_all(&data).await {
                log::debug!("Audio pipe closed early: {}", e);
            }
        });

        let (done_tx, done_rx) = oneshot::channel();
        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        // У каждой реплики свой флаг, иначе остановка предыдущей сбросит его для новой
        let playing = Arc::new(AtomicBool::new(true));
        self.playing = playing.clone();
        let command = self.command.clone();

        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => Some(status),
                _ = kill_rx => None,
            };

            match status {
                Some(Ok(status)) if status.success() => {
                    let _ = done_tx.send(Ok(()));
                }
                Some(Ok(status)) => {
                    let _ = done_tx.send(Err(format!("{} exited with {}", command, status)));
                }
                Some(Err(e)) => {
                    let _ = done_tx.send(Err(format!("Failed to wait for {}: {}", command, e)));
                }
                None => {
                    if let Err(e) = child.kill().await {
                        log::debug!("Failed to kill {}: {}", command, e);
                    }
                }
            }
            playing.store(false, Ordering::SeqCst);
        });

        self.kill_switch = Some(kill_tx);
        Ok(done_rx)
    }

    fn stop(&mut self) {
        if let Some(kill_switch) = self.kill_switch.take() {
            let _ = kill_switch.send(());
        }
    }
}

impl Drop for FfplaySink {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Цепочка фильтров `atempo` для множителя скорости
///
/// Один фильтр принимает значения от 0.5 до 2.0, поэтому большие множители
/// раскладываются на несколько фильтров.
pub fn atempo_filter(rate: f64) -> String {
    let mut rate = if rate.is_finite() && rate > 0.0 { rate.max(0.5) } else { 1.0 };
    let mut filters = Vec::new();
    while rate > 2.0 {
        filters.push("atempo=2.0".to_string());
        rate /= 2.0;
    }
    filters.push(format!("atempo={:.3}", rate));
    filters.join(",")
}

/// Определить длительность аудио в секундах
pub fn audio_duration(data: &[u8], format: AudioFormat) -> Option<f64> {
    let source = MediaSourceStream::new(Box::new(Cursor::new(data.to_vec())), Default::default());
    let mut hint = Hint::new();
    hint.with_extension(format.extension());

    let detected = symphonia::default::get_probe()
        .format(&hint, source, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| log::debug!("Failed to detect audio format: {}", e))
        .ok()?;
    let mut reader = detected.format;

    let (track_id, n_frames, time_base) = {
        let track = reader.default_track()?;
        let params = &track.codec_params;
        let time_base = params
            .time_base
            .or_else(|| params.sample_rate.map(|rate| TimeBase::new(1, rate)))?;
        (track.id, params.n_frames, time_base)
    };

    // Без числа кадров в заголовке суммируем длительности пакетов
    let frames = match n_frames {
        Some(frames) => frames,
        None => {
            let mut total = 0u64;
            while let Ok(packet) = reader.next_packet() {
                if packet.track_id() == track_id {
                    total += packet.dur;
                }
            }
            total
        }
    };

    let time = time_base.calc_time(frames);
    let seconds = time.seconds as f64 + time.frac;
    (seconds > 0.0).then_some(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Тишина в формате WAV, 16 бит моно
    fn silent_wav(sample_rate: u32, samples: u32) -> Vec<u8> {
        let data_len = samples * 2;
        let mut wav = Vec::new();
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(36 + data_len).to_le_bytes());
        wav.extend_from_slice(b"WAVEfmt ");
        wav.extend_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes());
        wav.extend_from_slice(&sample_rate.to_le_bytes());
        wav.extend_from_slice(&(sample_rate * 2).to_le_bytes());
        wav.extend_from_slice(&2u16.to_le_bytes());
        wav.extend_from_slice(&16u16.to_le_bytes());
        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&data_len.to_le_bytes());
        wav.extend(std::iter::repeat(0u8).take(data_len as usize));
        wav
    }

    #[test]
    fn test_wav_duration() {
        let wav = silent_wav(8000, 12000);
        let duration = audio_duration(&wav, AudioFormat::Wav).unwrap();
        assert!((duration - 1.5).abs() < 0.01, "duration was {}", duration);
    }

    #[test]
    fn test_garbage_has_no_duration() {
        assert!(audio_duration(b"definitely not audio", AudioFormat::Mp3).is_none());
    }

    #[test]
    fn test_atempo_filter() {
        assert_eq!(atempo_filter(1.0), "atempo=1.000");
        assert_eq!(atempo_filter(2.5), "atempo=2.0,atempo=1.250");
        assert_eq!(atempo_filter(0.2), "atempo=0.500");
        assert_eq!(atempo_filter(f64::NAN), "atempo=1.000");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_replaced_playback_keeps_playing_state() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().unwrap();
        let script = temp_dir.path().join("fake-ffplay");
        std::fs::write(&script, "#!/bin/sh\ncat > /dev/null\nsleep 2\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut sink = FfplaySink::new(script.to_string_lossy());
        let audio = SynthesizedAudio::new(
            bytes::Bytes::from_static(b"audio"),
            AudioFormat::Mp3,
            crate::config::EngineKind::Streaming,
        );

        let first = sink.play(&audio, 1.0).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let _second = sink.play(&audio, 1.5).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        // Первая реплика остановлена без результата, вторая еще звучит
        assert!(first.await.is_err());
        assert!(sink.is_playing());

        sink.stop();
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert!(!sink.is_playing());
    }

    #[tokio::test]
    async fn test_missing_player_is_device_error() {
        let mut sink = FfplaySink::new("definitely-not-an-audio-player");
        let audio = SynthesizedAudio::new(
            bytes::Bytes::from_static(b"audio"),
            AudioFormat::Mp3,
            crate::config::EngineKind::Streaming,
        );
        assert!(matches!(sink.play(&audio, 1.0), Err(TtsPlayerError::PlaybackDevice(_))));
        assert!(!sink.is_playing());
    }
}
