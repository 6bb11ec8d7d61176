//! Кадры протокола потокового синтеза
//!
//! Исходящие кадры текстовые: заголовки `Имя:значение` через CRLF, пустая
//! строка и тело. Входящие текстовые кадры несут служебные сообщения,
//! двоичные начинаются с двухбайтной длины заголовка (big-endian), за
//! заголовком идут байты аудио.

use bytes::{Bytes, BytesMut};
use crate::error::{Result, TtsPlayerError};

/// Формат вывода, запрашиваемый у сервиса
pub const OUTPUT_FORMAT: &str = "audio-24khz-48kbitrate-mono-mp3";

const TURN_END_PATH: &str = "Path:turn.end";
const AUDIO_PATH: &str = "Path:audio";

/// Кадр конфигурации синтеза
pub fn config_frame(timestamp: &str) -> String {
    let body = serde_json::json!({
        "context": {
            "synthesis": {
                "audio": {
                    "metadataoptions": {
                        "sentenceBoundaryEnabled": "false",
                        "wordBoundaryEnabled": "false"
                    },
                    "outputFormat": OUTPUT_FORMAT
                }
            }
        }
    });

    format!(
        "X-Timestamp:{}\r\nContent-Type:application/json; charset=utf-8\r\nPath:speech.config\r\n\r\n{}",
        timestamp, body
    )
}

/// Кадр с SSML разметкой
pub fn ssml_frame(request_id: &str, ssml: &str) -> String {
    format!(
        "X-RequestId:{}\r\nContent-Type:application/ssml+xml\r\nPath:ssml\r\n\r\n{}",
        request_id, ssml
    )
}

/// Построить SSML для текста и голоса
pub fn build_ssml(text: &str, voice: &str, rate: &str) -> String {
    format!(
        "<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' xml:lang='en-US'>\
<voice name='{}'><prosody pitch='+0Hz' rate='{}' volume='+0%'>{}</prosody></voice></speak>",
        escape_xml(voice),
        escape_xml(rate),
        escape_xml(text)
    )
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\'' => escaped.push_str("&apos;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Разобранный входящий кадр
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Конец потока
    TurnEnd,
    /// Фрагмент аудио
    Audio(Bytes),
    /// Прочие служебные кадры
    Other,
}

/// Разобрать текстовый кадр
pub fn parse_text_frame(text: &str) -> InboundFrame {
    if text.contains(TURN_END_PATH) {
        InboundFrame::TurnEnd
    } else {
        InboundFrame::Other
    }
}

/// Разобрать двоичный кадр
pub fn parse_binary_frame(data: &[u8]) -> Result<InboundFrame> {
    if data.len() < 2 {
        return Err(TtsPlayerError::InvalidFormat(format!(
            "Binary frame too short: {} bytes",
            data.len()
        )));
    }

    let header_len = u16::from_be_bytes([data[0], data[1]]) as usize;
    let payload_start = 2 + header_len;
    if data.len() < payload_start {
        return Err(TtsPlayerError::InvalidFormat(format!(
            "Binary frame header length {} exceeds frame size {}",
            header_len,
            data.len()
        )));
    }

    let header = String::from_utf8_lossy(&data[2..payload_start]);
    if header.contains(AUDIO_PATH) {
        Ok(InboundFrame::Audio(Bytes::copy_from_slice(&data[payload_start..])))
    } else {
        Ok(InboundFrame::Other)
    }
}

/// Сборщик аудио из фрагментов потока
#[derive(Debug, Default)]
pub struct AudioAssembler {
    buffer: BytesMut,
    finished: bool,
    fragments: usize,
}

impl AudioAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Учесть очередной кадр
    ///
    /// Возвращает `true`, когда поток завершен.
    pub fn push(&mut self, frame: InboundFrame) -> bool {
        match frame {
            InboundFrame::Audio(payload) => {
                if !payload.is_empty() {
                    self.buffer.extend_from_slice(&payload);
                    self.fragments += 1;
                }
            }
            InboundFrame::TurnEnd => self.finished = true,
            InboundFrame::Other => {}
        }
        self.finished
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn fragments(&self) -> usize {
        self.fragments
    }

    /// Забрать собранное аудио
    pub fn finish(self) -> Result<Bytes> {
        if !self.finished {
            return Err(TtsPlayerError::Provider(
                "Stream closed before turn end".to_string(),
            ));
        }
        if self.buffer.is_empty() {
            return Err(TtsPlayerError::Provider(
                "Stream finished without audio".to_string(),
            ));
        }
        Ok(self.buffer.freeze())
    }
}
