//! Playback Session - 播放会话
//!
//! 曲目队列 + 播放状态机（Idle / Playing / Paused / Finished）。
//! 所有状态变更与一致性读取都提交到会话自己的 TaskSerializer，按提交顺序逐个执行。

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use uuid::Uuid;

use super::PlaybackError;
use crate::application::ports::{
    AudioTransportPort, NotifierPort, PlayOptions, PlaybackControl, PlaybackEvent,
    VoiceChannelRef, VoiceConnection,
};
use crate::domain::playback::{Notice, PlaybackState, Volume};
use crate::domain::track::{Track, DEFAULT_MAX_INDIRECTIONS};
use crate::infrastructure::memory::{Completion, TaskSerializer};

/// 默认队列上限
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 10;

/// 会话参数
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// 等待队列的最大长度（不含当前曲目）
    pub max_queue_size: usize,
    pub play_options: PlayOptions,
    pub default_volume: Volume,
    /// 流解析的最大解引用层数
    pub max_indirections: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            play_options: PlayOptions::default(),
            default_volume: Volume::default(),
            max_indirections: DEFAULT_MAX_INDIRECTIONS,
        }
    }
}

/// 会话结束信号（单次），由注册表在创建会话时持有
pub type FinishedSignal = oneshot::Receiver<()>;

struct ActiveBinding {
    /// 每次绑定递增，用于丢弃过期的结束事件
    generation: u64,
    control: Arc<dyn PlaybackControl>,
}

struct SessionState {
    pending: VecDeque<Arc<Track>>,
    current: Option<Arc<Track>>,
    is_playing: bool,
    volume: Volume,
    voice_channel: VoiceChannelRef,
    connection: Option<Arc<dyn VoiceConnection>>,
    binding: Option<ActiveBinding>,
    generation: u64,
    finished_signal: Option<oneshot::Sender<()>>,
}

impl SessionState {
    fn size(&self) -> usize {
        self.pending.len() + usize::from(self.current.is_some())
    }

    fn control(&self) -> Option<Arc<dyn PlaybackControl>> {
        self.binding.as_ref().map(|b| b.control.clone())
    }
}

struct SessionInner {
    id: Uuid,
    key: String,
    created_at: DateTime<Utc>,
    settings: SessionSettings,
    serializer: TaskSerializer,
    state: Mutex<SessionState>,
    finished: AtomicBool,
    transport: Arc<dyn AudioTransportPort>,
    notifier: Arc<dyn NotifierPort>,
}

/// 播放会话
///
/// 克隆得到的是同一个会话的句柄。
///
/// 不变量:
/// - `pending.len() <= max_queue_size`
/// - 当前曲目存在当且仅当有流绑定在传输层上
/// - `is_playing` 只在当前曲目存在且未暂停时为 true
#[derive(Clone)]
pub struct PlaybackSession {
    inner: Arc<SessionInner>,
}

impl PlaybackSession {
    pub fn new(
        key: impl Into<String>,
        voice_channel: VoiceChannelRef,
        settings: SessionSettings,
        transport: Arc<dyn AudioTransportPort>,
        notifier: Arc<dyn NotifierPort>,
    ) -> (Self, FinishedSignal) {
        let key = key.into();
        let (signal, finished) = oneshot::channel();
        let state = SessionState {
            pending: VecDeque::new(),
            current: None,
            is_playing: false,
            volume: settings.default_volume,
            voice_channel,
            connection: None,
            binding: None,
            generation: 0,
            finished_signal: Some(signal),
        };
        let session = Self {
            inner: Arc::new(SessionInner {
                id: Uuid::new_v4(),
                serializer: TaskSerializer::new(format!("session:{}", key)),
                key,
                created_at: Utc::now(),
                settings,
                state: Mutex::new(state),
                finished: AtomicBool::new(false),
                transport,
                notifier,
            }),
        };
        tracing::debug!(session_id = %session.id(), key = %session.key(), "Session created");
        (session, finished)
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.inner.settings
    }

    /// 是否已进入 Finished（不经过串行器）
    pub fn is_finished(&self) -> bool {
        self.inner.finished.load(Ordering::SeqCst)
    }

    /// 等待当前已提交的操作全部完成
    pub async fn settled(&self) {
        self.inner.serializer.drain().await;
    }

    // =====================
    //    MUTATIONS
    // =====================

    /// 入队，返回 1 起始的位置
    pub async fn enqueue(&self, track: Track, requester: Option<&str>) -> Result<usize, PlaybackError> {
        track.validate().map_err(PlaybackError::InvalidTrack)?;

        let session = self.clone();
        let requester = requester.map(str::to_string);
        let name = format!("Enqueue {}", track.title());
        self.submit(name, move || async move {
            session.ensure_active()?;
            let mut state = session.inner.state.lock().await;

            let limit = session.inner.settings.max_queue_size;
            if state.pending.len() >= limit {
                session.notify(Notice::QueueFull { limit, requester }).await;
                return Err(PlaybackError::CapacityExceeded { limit });
            }

            let mut track = track;
            track.stamp_request(requester.as_deref(), Utc::now());
            let title = track.title().to_string();
            state.pending.push_back(Arc::new(track));
            let position = state.pending.len();
            drop(state);

            tracing::info!(
                session_id = %session.id(),
                title = %title,
                position = position,
                "Track enqueued"
            );
            session
                .notify(Notice::Enqueued {
                    title,
                    position,
                    requester,
                })
                .await;
            Ok(position)
        })
        .await
    }

    /// 开始播放
    ///
    /// 已在播放时无操作；暂停中等同于 `resume`；队列为空时返回 `QueueEmpty`
    pub async fn play(&self) -> Result<(), PlaybackError> {
        let session = self.clone();
        self.submit("Play", move || async move {
            session.ensure_active()?;
            let mut state = session.inner.state.lock().await;

            if state.is_playing {
                return Ok(());
            }
            if state.binding.is_some() {
                session.resume_bound(&mut state).await;
                return Ok(());
            }
            if state.pending.is_empty() {
                session.notify(Notice::QueueEmpty).await;
                return Err(PlaybackError::QueueEmpty);
            }
            session.start_next(&mut state).await
        })
        .await
    }

    /// 暂停，空闲时无操作
    pub async fn pause(&self) -> Result<(), PlaybackError> {
        let session = self.clone();
        self.submit("Pause", move || async move {
            let mut state = session.inner.state.lock().await;
            let Some(control) = state.control() else {
                return Ok(());
            };
            if !control.is_paused() {
                control.pause();
            }
            state.is_playing = false;
            tracing::debug!(session_id = %session.id(), "Playback paused");
            Ok(())
        })
        .await
    }

    /// 恢复播放，未暂停时无操作
    pub async fn resume(&self) -> Result<(), PlaybackError> {
        let session = self.clone();
        self.submit("Resume", move || async move {
            let mut state = session.inner.state.lock().await;
            session.resume_bound(&mut state).await;
            Ok(())
        })
        .await
    }

    /// 强制结束当前曲目，随后由结束事件推进队列
    pub async fn skip(&self) -> Result<(), PlaybackError> {
        let session = self.clone();
        self.submit("Skip", move || async move {
            let state = session.inner.state.lock().await;
            session.end_current(&state);
            Ok(())
        })
        .await
    }

    /// 移除曲目
    ///
    /// 位置 0 为当前曲目（会被跳过），位置 n >= 1 为第 n 首等待中的曲目
    pub async fn remove(&self, index: usize) -> Result<Arc<Track>, PlaybackError> {
        let session = self.clone();
        self.submit(format!("Remove {}", index), move || async move {
            let mut state = session.inner.state.lock().await;
            let size = state.size();

            if index == 0 {
                let Some(current) = state.current.clone() else {
                    return Err(PlaybackError::IndexOutOfRange { index, size });
                };
                session.end_current(&state);
                return Ok(current);
            }

            state
                .pending
                .remove(index - 1)
                .ok_or(PlaybackError::IndexOutOfRange { index, size })
        })
        .await
    }

    /// 清空等待队列并跳过当前曲目
    pub async fn clear(&self) -> Result<(), PlaybackError> {
        let session = self.clone();
        self.submit("Clear", move || async move {
            let mut state = session.inner.state.lock().await;
            let removed = state.pending.len();
            state.pending.clear();
            if state.current.is_some() {
                session.end_current(&state);
            }
            tracing::debug!(session_id = %session.id(), removed = removed, "Queue cleared");
            Ok(())
        })
        .await
    }

    /// 设置音量，返回实际保存的值
    ///
    /// 超出 [0, 2] 取最近边界，NaN 被忽略；播放中立即生效，否则在下次开始/恢复时生效
    pub async fn set_volume(&self, value: f32) -> Result<f32, PlaybackError> {
        let session = self.clone();
        self.submit("Set Volume", move || async move {
            let mut state = session.inner.state.lock().await;
            let Some(volume) = Volume::new(value) else {
                tracing::warn!(session_id = %session.id(), "Ignoring NaN volume");
                return Ok(state.volume.as_f32());
            };

            state.volume = volume;
            if state.is_playing {
                if let Some(control) = state.control() {
                    control.set_gain(volume.gain());
                }
            }
            Ok(volume.as_f32())
        })
        .await
    }

    /// 更换语音通道
    ///
    /// 有流绑定时不支持迁移，直接返回 `Unsupported`
    pub async fn set_voice_channel(&self, channel: VoiceChannelRef) -> Result<(), PlaybackError> {
        let session = self.clone();
        self.submit("Set Voice Channel", move || async move {
            session.ensure_active()?;
            let mut state = session.inner.state.lock().await;

            if state.voice_channel == channel {
                return Ok(());
            }
            if state.binding.is_some() {
                return Err(PlaybackError::unsupported(
                    "changing the voice channel during playback",
                ));
            }
            if let Some(connection) = state.connection.take() {
                if let Err(e) = connection.leave().await {
                    tracing::warn!(session_id = %session.id(), error = %e, "Failed to leave voice channel");
                }
            }

            tracing::info!(
                session_id = %session.id(),
                from = %state.voice_channel,
                to = %channel,
                "Voice channel changed"
            );
            state.voice_channel = channel;
            Ok(())
        })
        .await
    }

    // =====================
    //    SNAPSHOT READS
    // =====================

    /// 当前曲目 + 等待曲目数
    pub async fn size(&self) -> Result<usize, PlaybackError> {
        self.read("Size", |state, _| state.size()).await
    }

    /// 全部曲目，当前曲目在首位
    pub async fn songs(&self) -> Result<Vec<Arc<Track>>, PlaybackError> {
        self.read("Songs", |state, _| {
            state
                .current
                .iter()
                .chain(state.pending.iter())
                .cloned()
                .collect()
        })
        .await
    }

    pub async fn is_playing(&self) -> Result<bool, PlaybackError> {
        self.read("Is Playing", |state, _| state.is_playing).await
    }

    pub async fn current_track(&self) -> Result<Option<Arc<Track>>, PlaybackError> {
        self.read("Current Track", |state, _| state.current.clone()).await
    }

    pub async fn volume(&self) -> Result<f32, PlaybackError> {
        self.read("Volume", |state, _| state.volume.as_f32()).await
    }

    pub async fn state(&self) -> Result<PlaybackState, PlaybackError> {
        self.read("State", |state, finished| {
            PlaybackState::derive(finished, state.binding.is_some(), state.is_playing)
        })
        .await
    }

    pub async fn voice_channel(&self) -> Result<VoiceChannelRef, PlaybackError> {
        self.read("Voice Channel", |state, _| state.voice_channel.clone())
            .await
    }

    // =====================
    //    INTERNALS
    // =====================

    fn submit<T, F, Fut>(&self, name: impl Into<String>, operation: F) -> Completion<T, PlaybackError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, PlaybackError>> + Send + 'static,
        T: Send + 'static,
    {
        self.inner.serializer.submit(name, operation)
    }

    async fn read<T, F>(&self, name: &'static str, snapshot: F) -> Result<T, PlaybackError>
    where
        F: FnOnce(&SessionState, bool) -> T + Send + 'static,
        T: Send + 'static,
    {
        let session = self.clone();
        self.submit(name, move || async move {
            let state = session.inner.state.lock().await;
            Ok(snapshot(&state, session.is_finished()))
        })
        .await
    }

    fn ensure_active(&self) -> Result<(), PlaybackError> {
        if self.is_finished() {
            return Err(PlaybackError::SessionFinished);
        }
        Ok(())
    }

    async fn notify(&self, notice: Notice) {
        let text = notice.to_string();
        if let Err(e) = self.inner.notifier.send(&text).await {
            tracing::warn!(session_id = %self.id(), error = %e, "Failed to send notice");
        }
    }

    /// 播放转移：加入通道（如需要）→ 取出队首 → 解析流 → 绑定
    async fn start_next(&self, state: &mut SessionState) -> Result<(), PlaybackError> {
        let connection = match state.connection.clone() {
            Some(connection) => connection,
            None => {
                let connection = match self.inner.transport.join(&state.voice_channel).await {
                    Ok(connection) => connection,
                    Err(e) => {
                        tracing::error!(
                            session_id = %self.id(),
                            channel = %state.voice_channel,
                            error = %e,
                            "Failed to join voice channel"
                        );
                        return Err(e.into());
                    }
                };
                tracing::info!(session_id = %self.id(), channel = %state.voice_channel, "Joined voice channel");
                state.connection = Some(connection.clone());
                connection
            }
        };

        if state.is_playing {
            return Ok(());
        }
        let Some(track) = state.pending.pop_front() else {
            return Err(PlaybackError::QueueEmpty);
        };

        self.notify(Notice::now_playing(&track)).await;

        let stream = match track
            .resolve_stream(self.inner.settings.max_indirections)
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(session_id = %self.id(), title = %track.title(), error = %e, "Failed to resolve stream");
                self.notify(Notice::PlaybackFailed {
                    title: track.title().to_string(),
                })
                .await;
                return Err(e.into());
            }
        };

        let binding = match connection
            .play(stream, self.inner.settings.play_options)
            .await
        {
            Ok(binding) => binding,
            Err(e) => {
                tracing::error!(session_id = %self.id(), title = %track.title(), error = %e, "Failed to bind stream");
                self.notify(Notice::PlaybackFailed {
                    title: track.title().to_string(),
                })
                .await;
                return Err(e.into());
            }
        };

        state.generation += 1;
        let generation = state.generation;
        binding.control.set_gain(state.volume.gain());
        state.current = Some(track.clone());
        state.is_playing = true;
        state.binding = Some(ActiveBinding {
            generation,
            control: binding.control,
        });
        self.watch_binding(generation, binding.events, track.title().to_string());

        tracing::info!(
            session_id = %self.id(),
            title = %track.title(),
            generation = generation,
            pending = state.pending.len(),
            "Track started"
        );
        Ok(())
    }

    async fn resume_bound(&self, state: &mut SessionState) {
        let Some(control) = state.control() else {
            return;
        };
        if !control.is_paused() {
            return;
        }
        if let Some(track) = &state.current {
            self.notify(Notice::Resuming {
                title: track.title().to_string(),
            })
            .await;
        }
        control.resume();
        control.set_gain(state.volume.gain());
        state.is_playing = true;
        tracing::debug!(session_id = %self.id(), "Playback resumed");
    }

    fn end_current(&self, state: &SessionState) -> bool {
        match &state.binding {
            Some(binding) => {
                binding.control.end("user");
                true
            }
            None => false,
        }
    }

    /// 监听绑定的事件：结束 → 提交 track_ended；错误 → 记录并通知，不推进队列
    fn watch_binding(&self, generation: u64, mut events: mpsc::Receiver<PlaybackEvent>, title: String) {
        let session = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    PlaybackEvent::Ended { reason } => {
                        tracing::debug!(
                            session_id = %session.id(),
                            generation = generation,
                            reason = %reason,
                            "Playback ended"
                        );
                        if let Err(e) = session.track_ended(generation).await {
                            tracing::error!(session_id = %session.id(), error = %e, "Failed to advance queue");
                        }
                        return;
                    }
                    PlaybackEvent::Error(e) => {
                        tracing::error!(session_id = %session.id(), title = %title, error = %e, "Playback error");
                        session
                            .notify(Notice::PlaybackFailed {
                                title: title.clone(),
                            })
                            .await;
                    }
                }
            }
            tracing::debug!(session_id = %session.id(), generation = generation, "Playback event channel closed");
        });
    }

    /// 曲目结束：有等待曲目则播放下一首，否则离开并进入 Finished
    fn track_ended(&self, generation: u64) -> Completion<(), PlaybackError> {
        let session = self.clone();
        self.submit(format!("On Track End #{}", generation), move || async move {
            let mut state = session.inner.state.lock().await;

            let is_current = state
                .binding
                .as_ref()
                .is_some_and(|binding| binding.generation == generation);
            if !is_current {
                tracing::debug!(session_id = %session.id(), generation = generation, "Ignoring end of a stale binding");
                return Ok(());
            }

            state.binding = None;
            state.is_playing = false;
            if let Some(track) = state.current.take() {
                tracing::info!(session_id = %session.id(), title = %track.title(), "Track ended");
            }

            // 无法播放的队首已被丢弃，继续尝试下一首
            while !state.pending.is_empty() {
                let before = state.pending.len();
                match session.start_next(&mut state).await {
                    Ok(()) => return Ok(()),
                    Err(e) if state.pending.len() < before => {
                        tracing::warn!(
                            session_id = %session.id(),
                            error = %e,
                            remaining = state.pending.len(),
                            "Skipping unplayable track"
                        );
                    }
                    Err(e) => return Err(e),
                }
            }
            session.finish(&mut state).await;
            Ok(())
        })
    }

    async fn finish(&self, state: &mut SessionState) {
        self.notify(Notice::Finished).await;
        if let Some(connection) = state.connection.take() {
            if let Err(e) = connection.leave().await {
                tracing::warn!(session_id = %self.id(), error = %e, "Failed to leave voice channel");
            }
        }
        self.inner.finished.store(true, Ordering::SeqCst);
        if let Some(signal) = state.finished_signal.take() {
            let _ = signal.send(());
        }
        tracing::info!(session_id = %self.id(), key = %self.key(), "Session finished");
    }
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("id", &self.inner.id)
            .field("key", &self.inner.key)
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}
