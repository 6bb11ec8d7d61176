//! Потоковый облачный синтез речи
//!
//! Открывает WebSocket, отправляет кадр конфигурации и кадр SSML, затем
//! собирает аудио из двоичных кадров до служебного кадра конца потока.

use std::time::Duration;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use url::Url;
use crate::config::{EngineKind, PlayerConfig};
use crate::error::{Result, TtsPlayerError};
use crate::playback::rate::format_rate_percent;
use crate::tts::frame::{self, AudioAssembler};
use crate::tts::{AudioFormat, SpeechProvider, SynthesizedAudio};

const ORIGIN: &str = "chrome-extension://jdiccldimpdaibmpdkjnbmckianbfold";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36 Edg/130.0.0.0";

/// Провайдер потокового синтеза
pub struct EdgeSpeechProvider {
    endpoint: String,
    trusted_token: String,
    timeout: Duration,
}

impl EdgeSpeechProvider {
    pub fn new(endpoint: impl Into<String>, trusted_token: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            trusted_token: trusted_token.into(),
            timeout,
        }
    }

    pub fn from_config(config: &PlayerConfig) -> Self {
        Self::new(
            config.edge_endpoint.clone(),
            config.edge_trusted_token.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Адрес подключения с токеном и идентификатором соединения
    fn connection_url(&self) -> Result<Url> {
        let connection_id = uuid::Uuid::new_v4().simple().to_string();
        Ok(Url::parse_with_params(
            &self.endpoint,
            &[
                ("TrustedClientToken", self.trusted_token.as_str()),
                ("ConnectionId", connection_id.as_str()),
            ],
        )?)
    }

    async fn stream_audio(&self, text: &str, voice: &str, rate_hint: f64) -> Result<Bytes> {
        let url = self.connection_url()?;
        let mut request = url.as_str().into_client_request()?;
        let headers = request.headers_mut();
        headers.insert("Origin", HeaderValue::from_static(ORIGIN));
        headers.insert("User-Agent", HeaderValue::from_static(USER_AGENT));
        headers.insert("Pragma", HeaderValue::from_static("no-cache"));
        headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));

        let (mut socket, _response) = connect_async(request).await?;
        log::debug!("Streaming synthesis connected");

        let timestamp = chrono::Utc::now()
            .format("%a %b %d %Y %H:%M:%S GMT+0000 (Coordinated Universal Time)")
            .to_string();
        socket.send(Message::Text(frame::config_frame(&timestamp))).await?;

        let request_id = uuid::Uuid::new_v4().simple().to_string();
        let ssml = frame::build_ssml(text, voice, &format_rate_percent(rate_hint));
        socket.send(Message::Text(frame::ssml_frame(&request_id, &ssml))).await?;

        let mut assembler = AudioAssembler::new();
        while let Some(message) = socket.next().await {
            match message? {
                Message::Text(text) => {
                    if assembler.push(frame::parse_text_frame(&text)) {
                        break;
                    }
                }
                Message::Binary(data) => {
                    assembler.push(frame::parse_binary_frame(&data)?);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }

        if let Err(e) = socket.close(None).await {
            log::debug!("Failed to close synthesis stream cleanly: {}", e);
        }

        log::debug!("Streaming synthesis received {} audio fragments", assembler.fragments());
        assembler.finish()
    }
}

#[async_trait]
impl SpeechProvider for EdgeSpeechProvider {
    fn kind(&self) -> EngineKind {
        EngineKind::Streaming
    }

    async fn synthesize(&self, text: &str, voice: &str, rate_hint: f64) -> Result<SynthesizedAudio> {
        let data = tokio::time::timeout(self.timeout, self.stream_audio(text, voice, rate_hint))
            .await
            .map_err(|_| {
                TtsPlayerError::Provider(format!(
                    "Streaming synthesis timed out after {}s",
                    self.timeout.as_secs()
                ))
            })??;

        Ok(SynthesizedAudio::new(data, AudioFormat::Mp3, EngineKind::Streaming))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    fn audio_frame(payload: &[u8]) -> Message {
        let header = "X-RequestId:1\r\nContent-Type:audio/mpeg\r\nPath:audio\r\n";
        let mut frame = (header.len() as u16).to_be_bytes().to_vec();
        frame.extend_from_slice(header.as_bytes());
        frame.extend_from_slice(payload);
        Message::Binary(frame)
    }

    /// Локальный сервер: принимает два текстовых кадра и отвечает аудио
    ///
    /// Без `turn.end` сервер закрывает соединение сразу после первого
    /// фрагмента.
    async fn serve(send_turn_end: bool) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut socket = tokio_tungstenite::accept_async(stream).await.unwrap();

            let mut received = Vec::new();
            while received.len() < 2 {
                match socket.next().await {
                    Some(Ok(Message::Text(text))) => received.push(text),
                    Some(Ok(_)) => {}
                    _ => return received,
                }
            }

            socket.send(audio_frame(b"ab")).await.unwrap();
            if !send_turn_end {
                let _ = socket.close(None).await;
                return received;
            }

            socket
                .send(Message::Text("X-RequestId:1\r\nPath:turn.start\r\n\r\n{}".to_string()))
                .await
                .unwrap();
            socket.send(audio_frame(b"cd")).await.unwrap();
            socket.send(audio_frame(b"ef")).await.unwrap();
            socket
                .send(Message::Text("X-RequestId:1\r\nPath:turn.end\r\n\r\n{}".to_string()))
                .await
                .unwrap();
            while let Some(Ok(_)) = socket.next().await {}
            received
        });

        (format!("ws://{}/edge/v1", address), server)
    }

    #[tokio::test]
    async fn test_streams_audio_until_turn_end() {
        let (endpoint, server) = serve(true).await;
        let provider = EdgeSpeechProvider::new(endpoint, "token", Duration::from_secs(5));

        let audio = provider.synthesize("你好", "zh-CN-XiaoxiaoNeural", 1.0).await.unwrap();
        assert_eq!(audio.data, Bytes::from_static(b"abcdef"));
        assert_eq!(audio.format, AudioFormat::Mp3);
        assert_eq!(audio.provider, EngineKind::Streaming);

        let received = server.await.unwrap();
        assert_eq!(received.len(), 2);
        assert!(received[0].contains("Path:speech.config"));
        assert!(received[0].contains(frame::OUTPUT_FORMAT));
        assert!(received[1].contains("Path:ssml"));
        assert!(received[1].contains("<voice name='zh-CN-XiaoxiaoNeural'>"));
        assert!(received[1].contains("你好"));
    }

    #[tokio::test]
    async fn test_stream_closed_before_turn_end_fails() {
        let (endpoint, server) = serve(false).await;
        let provider = EdgeSpeechProvider::new(endpoint, "token", Duration::from_secs(5));

        assert!(provider.synthesize("hello", "en-US-AriaNeural", 1.0).await.is_err());
        assert_eq!(server.await.unwrap().len(), 2);
    }

    #[test]
    fn test_connection_url_carries_token() {
        let provider = EdgeSpeechProvider::from_config(&PlayerConfig::default());
        let url = provider.connection_url().unwrap();
        assert_eq!(url.scheme(), "wss");
        let params: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(params[0].0, "TrustedClientToken");
        assert_eq!(params[0].1, crate::config::EDGE_TRUSTED_CLIENT_TOKEN);
        assert_eq!(params[1].0, "ConnectionId");
        assert_eq!(params[1].1.len(), 32);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails() {
        let provider = EdgeSpeechProvider::new("ws://127.0.0.1:1/edge", "token", Duration::from_secs(5));
        assert!(provider.synthesize("hello", "en-US-AriaNeural", 1.0).await.is_err());
    }
}
