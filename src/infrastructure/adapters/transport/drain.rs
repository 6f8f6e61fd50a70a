//! Drain Transport - 按固定节奏消费媒体流的音频输出
//!
//! 不向任何设备输出，只逐块读取字节流，用于命令行播放与测试。
//! 支持暂停/恢复/结束，流读完或被结束时发出 `Ended`，读取失败时先发出 `Error`。

use async_trait::async_trait;
use futures_util::StreamExt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    AudioTransportPort, PlayOptions, PlaybackBinding, PlaybackControl, PlaybackEvent,
    TransportError, VoiceChannelRef, VoiceConnection,
};
use crate::domain::track::{ByteStream, MediaStream};

const EVENT_BUFFER: usize = 8;

/// Drain Transport 配置
#[derive(Debug, Clone)]
pub struct DrainTransportConfig {
    /// 两个数据块之间的间隔
    pub chunk_interval: Duration,
}

impl Default for DrainTransportConfig {
    fn default() -> Self {
        Self {
            chunk_interval: Duration::from_millis(20),
        }
    }
}

/// Drain Transport
pub struct DrainTransport {
    config: DrainTransportConfig,
}

impl DrainTransport {
    pub fn new(config: DrainTransportConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl AudioTransportPort for DrainTransport {
    async fn join(
        &self,
        channel: &VoiceChannelRef,
    ) -> Result<Arc<dyn VoiceConnection>, TransportError> {
        tracing::info!(channel = %channel, "Joined drain channel");
        Ok(Arc::new(DrainConnection {
            channel: channel.clone(),
            chunk_interval: self.config.chunk_interval,
            left: AtomicBool::new(false),
        }))
    }
}

/// Drain 连接
pub struct DrainConnection {
    channel: VoiceChannelRef,
    chunk_interval: Duration,
    left: AtomicBool,
}

#[async_trait]
impl VoiceConnection for DrainConnection {
    async fn play(
        &self,
        stream: MediaStream,
        options: PlayOptions,
    ) -> Result<PlaybackBinding, TransportError> {
        if self.left.load(Ordering::SeqCst) {
            return Err(TransportError::Disconnected);
        }
        let body = stream
            .take_body()
            .ok_or_else(|| TransportError::StreamUnavailable(stream.origin().to_string()))?;

        tracing::info!(
            channel = %self.channel,
            origin = %stream.origin(),
            passes = options.passes,
            bitrate = %options.bitrate,
            "Playing stream"
        );

        let (events, receiver) = mpsc::channel(EVENT_BUFFER);
        let control = Arc::new(DrainControl::new());
        tokio::spawn(pump(body, control.clone(), events, self.chunk_interval));

        Ok(PlaybackBinding {
            control,
            events: receiver,
        })
    }

    async fn leave(&self) -> Result<(), TransportError> {
        self.left.store(true, Ordering::SeqCst);
        tracing::info!(channel = %self.channel, "Left drain channel");
        Ok(())
    }
}

/// Drain 播放控制
pub struct DrainControl {
    paused: watch::Sender<bool>,
    cancel: CancellationToken,
    end_reason: Mutex<Option<String>>,
    /// f32 的位模式
    gain: AtomicU32,
    bytes_played: AtomicU64,
}

impl DrainControl {
    fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            paused,
            cancel: CancellationToken::new(),
            end_reason: Mutex::new(None),
            gain: AtomicU32::new(1.0_f32.to_bits()),
            bytes_played: AtomicU64::new(0),
        }
    }

    pub fn gain(&self) -> f32 {
        f32::from_bits(self.gain.load(Ordering::SeqCst))
    }

    pub fn bytes_played(&self) -> u64 {
        self.bytes_played.load(Ordering::SeqCst)
    }

    fn end_reason(&self) -> String {
        self.end_reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_else(|| "user".to_string())
    }
}

impl PlaybackControl for DrainControl {
    fn pause(&self) {
        self.paused.send_replace(true);
    }

    fn resume(&self) {
        self.paused.send_replace(false);
    }

    fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    fn set_gain(&self, gain: f32) {
        self.gain.store(gain.to_bits(), Ordering::SeqCst);
    }

    fn end(&self, reason: &str) {
        let mut end_reason = self.end_reason.lock().unwrap_or_else(PoisonError::into_inner);
        if end_reason.is_none() {
            *end_reason = Some(reason.to_string());
        }
        self.cancel.cancel();
    }
}

/// 逐块消费字节流，结束时发出 `Ended`
async fn pump(
    mut body: ByteStream,
    control: Arc<DrainControl>,
    events: mpsc::Sender<PlaybackEvent>,
    chunk_interval: Duration,
) {
    let mut paused = control.paused.subscribe();

    let reason = loop {
        if *paused.borrow_and_update() {
            tokio::select! {
                _ = control.cancel.cancelled() => break control.end_reason(),
                _ = paused.changed() => continue,
            }
        }

        tokio::select! {
            _ = control.cancel.cancelled() => break control.end_reason(),
            _ = paused.changed() => continue,
            chunk = body.next() => match chunk {
                Some(Ok(data)) => {
                    control
                        .bytes_played
                        .fetch_add(data.len() as u64, Ordering::SeqCst);
                    tokio::time::sleep(chunk_interval).await;
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Stream read failed");
                    let _ = events
                        .send(PlaybackEvent::Error(TransportError::PlaybackFailed(e.to_string())))
                        .await;
                    break "error".to_string();
                }
                None => break "finished".to_string(),
            },
        }
    };

    tracing::debug!(
        reason = %reason,
        bytes = control.bytes_played(),
        "Stream drained"
    );
    let _ = events.send(PlaybackEvent::Ended { reason }).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use std::io;

    fn transport() -> DrainTransport {
        DrainTransport::new(DrainTransportConfig {
            chunk_interval: Duration::from_millis(1),
        })
    }

    fn chunked(chunks: usize) -> MediaStream {
        let body = stream::iter((0..chunks).map(|_| Ok(vec![0u8; 10]))).boxed();
        MediaStream::new("memory://chunks", None, body)
    }

    async fn next_event(binding: &mut PlaybackBinding) -> PlaybackEvent {
        tokio::time::timeout(Duration::from_secs(2), binding.events.recv())
            .await
            .expect("event in time")
            .expect("channel open")
    }

    #[tokio::test]
    async fn test_stream_is_drained_to_end() {
        let connection = transport().join(&VoiceChannelRef::new("v1")).await.unwrap();
        let mut binding = connection
            .play(chunked(5), PlayOptions::default())
            .await
            .unwrap();

        match next_event(&mut binding).await {
            PlaybackEvent::Ended { reason } => assert_eq!(reason, "finished"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_end_while_paused() {
        let connection = transport().join(&VoiceChannelRef::new("v1")).await.unwrap();
        let body = stream::pending::<io::Result<Vec<u8>>>().boxed();
        let mut binding = connection
            .play(
                MediaStream::new("memory://pending", None, body),
                PlayOptions::default(),
            )
            .await
            .unwrap();

        binding.control.pause();
        assert!(binding.control.is_paused());
        binding.control.end("user");
        binding.control.end("ignored");

        match next_event(&mut binding).await {
            PlaybackEvent::Ended { reason } => assert_eq!(reason, "user"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_error_reports_then_ends() {
        let connection = transport().join(&VoiceChannelRef::new("v1")).await.unwrap();
        let body = stream::iter(vec![
            Ok(vec![1u8; 4]),
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection reset")),
        ])
        .boxed();
        let mut binding = connection
            .play(
                MediaStream::new("memory://broken", None, body),
                PlayOptions::default(),
            )
            .await
            .unwrap();

        assert!(matches!(
            next_event(&mut binding).await,
            PlaybackEvent::Error(TransportError::PlaybackFailed(_))
        ));
        assert!(matches!(
            next_event(&mut binding).await,
            PlaybackEvent::Ended { reason } if reason == "error"
        ));
    }

    #[tokio::test]
    async fn test_stream_body_can_only_be_played_once() {
        let connection = transport().join(&VoiceChannelRef::new("v1")).await.unwrap();
        let stream = chunked(1);

        connection
            .play(stream.clone(), PlayOptions::default())
            .await
            .unwrap();
        let result = connection.play(stream, PlayOptions::default()).await;
        assert!(matches!(result, Err(TransportError::StreamUnavailable(_))));
    }

    #[tokio::test]
    async fn test_play_after_leave_fails() {
        let connection = transport().join(&VoiceChannelRef::new("v1")).await.unwrap();
        connection.leave().await.unwrap();

        let result = connection.play(chunked(1), PlayOptions::default()).await;
        assert!(matches!(result, Err(TransportError::Disconnected)));
    }

    #[test]
    fn test_control_tracks_gain() {
        let control = DrainControl::new();
        assert_eq!(control.gain(), 1.0);
        control.set_gain(0.25);
        assert_eq!(control.gain(), 0.25);
        assert_eq!(control.bytes_played(), 0);
    }
}
