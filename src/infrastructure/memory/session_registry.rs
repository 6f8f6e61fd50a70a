//! In-Memory Session Registry Implementation

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use crate::application::playback::{FinishedSignal, PlaybackSession, SessionSettings};
use crate::application::ports::{AudioTransportPort, NotifierPort, VoiceChannelRef};

/// 内存会话注册表
///
/// 每个 key 至多一个存活的会话；会话结束后自动移除，下一次查找时重新创建
pub struct SessionRegistry {
    sessions: Arc<DashMap<String, PlaybackSession>>,
    transport: Arc<dyn AudioTransportPort>,
    settings: SessionSettings,
}

impl SessionRegistry {
    pub fn new(transport: Arc<dyn AudioTransportPort>, settings: SessionSettings) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            transport,
            settings,
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 获取会话，不存在（或已结束）时创建
    ///
    /// 已存在的会话保留原来的语音通道和通知目标
    pub fn get_or_create(
        &self,
        key: &str,
        voice_channel: VoiceChannelRef,
        notifier: Arc<dyn NotifierPort>,
    ) -> PlaybackSession {
        match self.sessions.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if !entry.get().is_finished() {
                    return entry.get().clone();
                }
                let (session, finished) = self.spawn_session(key, voice_channel, notifier);
                tracing::info!(
                    key = %key,
                    previous = %entry.get().id(),
                    session_id = %session.id(),
                    "Replacing finished session"
                );
                entry.insert(session.clone());
                self.watch(&session, finished);
                session
            }
            Entry::Vacant(entry) => {
                let (session, finished) = self.spawn_session(key, voice_channel, notifier);
                tracing::info!(key = %key, session_id = %session.id(), "Session created");
                entry.insert(session.clone());
                self.watch(&session, finished);
                session
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<PlaybackSession> {
        self.sessions.get(key).map(|s| s.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.sessions.contains_key(key)
    }

    /// 从注册表移除，不影响会话本身的播放
    pub fn remove(&self, key: &str) -> Option<PlaybackSession> {
        self.sessions.remove(key).map(|(_, session)| {
            tracing::info!(key = %key, session_id = %session.id(), "Session removed");
            session
        })
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    fn spawn_session(
        &self,
        key: &str,
        voice_channel: VoiceChannelRef,
        notifier: Arc<dyn NotifierPort>,
    ) -> (PlaybackSession, FinishedSignal) {
        PlaybackSession::new(
            key,
            voice_channel,
            self.settings.clone(),
            self.transport.clone(),
            notifier,
        )
    }

    /// 会话结束后移除，只移除同一个实例
    fn watch(&self, session: &PlaybackSession, finished: FinishedSignal) {
        let sessions = self.sessions.clone();
        let key = session.key().to_string();
        let id = session.id();
        tokio::spawn(async move {
            if finished.await.is_err() {
                // 会话在结束前被释放
                return;
            }
            if sessions.remove_if(&key, |_, current| current.id() == id).is_some() {
                tracing::info!(key = %key, session_id = %id, "Session evicted");
            }
        });
    }
}
