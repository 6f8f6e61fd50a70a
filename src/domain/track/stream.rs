//! Track Context - Stream Handle
//!
//! 曲目的惰性媒体流：
//! - `StreamValue`: 现成的流 / 零参生产者 / 延迟值
//! - `StreamHandle`: Thunk → Pending → Resolved 状态机，生产者至多执行一次

use futures_util::future::{BoxFuture, Shared};
use futures_util::stream::{self, BoxStream};
use futures_util::{FutureExt, StreamExt};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::ResolutionError;

/// 默认最大解引用层数
pub const DEFAULT_MAX_INDIRECTIONS: usize = 16;

/// 原始字节流
pub type ByteStream = BoxStream<'static, std::io::Result<Vec<u8>>>;

/// 零参生产者
pub type Producer = Box<dyn FnOnce() -> StreamValue + Send>;

/// 可播放的媒体流
///
/// 克隆共享同一个底层字节流，字节流只能被取走一次（交给传输层）
#[derive(Clone)]
pub struct MediaStream {
    inner: Arc<MediaStreamInner>,
}

struct MediaStreamInner {
    origin: String,
    content_type: Option<String>,
    body: Mutex<Option<ByteStream>>,
}

impl MediaStream {
    pub fn new(origin: impl Into<String>, content_type: Option<String>, body: ByteStream) -> Self {
        Self {
            inner: Arc::new(MediaStreamInner {
                origin: origin.into(),
                content_type,
                body: Mutex::new(Some(body)),
            }),
        }
    }

    /// 由内存数据构造（单块）
    pub fn from_bytes(origin: impl Into<String>, data: Vec<u8>) -> Self {
        Self::new(origin, None, stream::once(async move { Ok(data) }).boxed())
    }

    /// 来源（URL 或命令描述）
    pub fn origin(&self) -> &str {
        &self.inner.origin
    }

    pub fn content_type(&self) -> Option<&str> {
        self.inner.content_type.as_deref()
    }

    /// 取走字节流，第二次调用返回 None
    pub fn take_body(&self) -> Option<ByteStream> {
        self.inner
            .body
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// 两个句柄是否指向同一个流
    pub fn ptr_eq(&self, other: &MediaStream) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream")
            .field("origin", &self.inner.origin)
            .field("content_type", &self.inner.content_type)
            .finish_non_exhaustive()
    }
}

/// 尚未解析的流值
pub enum StreamValue {
    /// 终态
    Ready(MediaStream),
    /// 零参生产者，调用后得到下一层
    Thunk(Producer),
    /// 正在进行中的异步值
    Deferred(BoxFuture<'static, Result<StreamValue, ResolutionError>>),
}

impl StreamValue {
    pub fn ready(stream: MediaStream) -> Self {
        Self::Ready(stream)
    }

    pub fn thunk<F>(producer: F) -> Self
    where
        F: FnOnce() -> StreamValue + Send + 'static,
    {
        Self::Thunk(Box::new(producer))
    }

    pub fn deferred<Fut>(future: Fut) -> Self
    where
        Fut: Future<Output = Result<StreamValue, ResolutionError>> + Send + 'static,
    {
        Self::Deferred(future.boxed())
    }

    /// 一个解析时即失败的值
    pub fn failed(error: ResolutionError) -> Self {
        Self::deferred(async move { Err(error) })
    }

    fn kind(&self) -> &'static str {
        match self {
            StreamValue::Ready(_) => "ready",
            StreamValue::Thunk(_) => "thunk",
            StreamValue::Deferred(_) => "deferred",
        }
    }
}

impl From<MediaStream> for StreamValue {
    fn from(stream: MediaStream) -> Self {
        Self::Ready(stream)
    }
}

impl std::fmt::Debug for StreamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StreamValue::{}", self.kind())
    }
}

/// 逐层解引用直到得到终态
///
/// 每调用一次生产者或等待一次延迟值算一层，超过 `max_indirections` 层即失败
pub async fn resolve_value(
    mut value: StreamValue,
    max_indirections: usize,
) -> Result<MediaStream, ResolutionError> {
    let mut hops = 0;
    loop {
        value = match value {
            StreamValue::Ready(stream) => return Ok(stream),
            StreamValue::Thunk(producer) => producer(),
            StreamValue::Deferred(pending) => pending.await?,
        };
        hops += 1;
        if hops > max_indirections {
            return Err(ResolutionError::TooManyIndirections(max_indirections));
        }
    }
}

type SharedResolution = Shared<BoxFuture<'static, Result<MediaStream, ResolutionError>>>;

enum HandleState {
    Thunk(StreamValue),
    Pending(SharedResolution),
    Resolved(Result<MediaStream, ResolutionError>),
}

/// 记忆化的流句柄
///
/// 不变量: 状态至多一次进入 Resolved；并发读取合并到同一个进行中的解析
pub struct StreamHandle {
    state: Mutex<HandleState>,
}

impl StreamHandle {
    pub fn new(value: StreamValue) -> Self {
        let state = match value {
            StreamValue::Ready(stream) => HandleState::Resolved(Ok(stream)),
            other => HandleState::Thunk(other),
        };
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HandleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 解析为终态流
    pub async fn resolve(&self, max_indirections: usize) -> Result<MediaStream, ResolutionError> {
        let shared = {
            let mut state = self.lock();
            let previous = std::mem::replace(
                &mut *state,
                HandleState::Resolved(Err(ResolutionError::Provider(
                    "stream handle is being resolved".to_string(),
                ))),
            );
            match previous {
                HandleState::Resolved(result) => {
                    *state = HandleState::Resolved(result.clone());
                    return result;
                }
                HandleState::Pending(shared) => {
                    *state = HandleState::Pending(shared.clone());
                    shared
                }
                HandleState::Thunk(value) => {
                    let shared = resolve_value(value, max_indirections).boxed().shared();
                    *state = HandleState::Pending(shared.clone());
                    shared
                }
            }
        };

        let result = shared.await;

        let mut state = self.lock();
        if matches!(*state, HandleState::Pending(_)) {
            *state = HandleState::Resolved(result.clone());
        }
        result
    }

    pub fn is_resolved(&self) -> bool {
        matches!(*self.lock(), HandleState::Resolved(_))
    }

    pub fn state_name(&self) -> &'static str {
        match *self.lock() {
            HandleState::Thunk(_) => "thunk",
            HandleState::Pending(_) => "pending",
            HandleState::Resolved(_) => "resolved",
        }
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("state", &self.state_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_producer(calls: Arc<AtomicUsize>) -> StreamValue {
        StreamValue::thunk(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            StreamValue::deferred(async move {
                tokio::task::yield_now().await;
                Ok(StreamValue::ready(MediaStream::from_bytes("memory://a", vec![1, 2, 3])))
            })
        })
    }

    fn endless() -> StreamValue {
        StreamValue::thunk(endless)
    }

    #[tokio::test]
    async fn test_ready_value_is_resolved_immediately() {
        let stream = MediaStream::from_bytes("memory://ready", vec![]);
        let handle = StreamHandle::new(StreamValue::ready(stream.clone()));
        assert!(handle.is_resolved());

        let resolved = handle.resolve(DEFAULT_MAX_INDIRECTIONS).await.unwrap();
        assert!(resolved.ptr_eq(&stream));
    }

    #[tokio::test]
    async fn test_producer_runs_once_for_repeated_reads() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = StreamHandle::new(counting_producer(calls.clone()));
        assert_eq!(handle.state_name(), "thunk");

        let first = handle.resolve(DEFAULT_MAX_INDIRECTIONS).await.unwrap();
        let second = handle.resolve(DEFAULT_MAX_INDIRECTIONS).await.unwrap();

        assert!(first.ptr_eq(&second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(handle.is_resolved());
    }

    #[tokio::test]
    async fn test_concurrent_reads_collapse_to_one_resolution() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = Arc::new(StreamHandle::new(counting_producer(calls.clone())));

        let (a, b, c) = tokio::join!(
            handle.resolve(DEFAULT_MAX_INDIRECTIONS),
            handle.resolve(DEFAULT_MAX_INDIRECTIONS),
            handle.resolve(DEFAULT_MAX_INDIRECTIONS),
        );

        let a = a.unwrap();
        assert!(a.ptr_eq(&b.unwrap()));
        assert!(a.ptr_eq(&c.unwrap()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_nested_deferred_values_are_followed() {
        let value = StreamValue::deferred(async {
            Ok(StreamValue::thunk(|| {
                StreamValue::deferred(async {
                    Ok(StreamValue::ready(MediaStream::from_bytes("memory://nested", vec![])))
                })
            }))
        });

        let stream = resolve_value(value, DEFAULT_MAX_INDIRECTIONS).await.unwrap();
        assert_eq!(stream.origin(), "memory://nested");
    }

    #[tokio::test]
    async fn test_self_referential_producer_is_bounded() {
        let handle = StreamHandle::new(endless());
        let result = handle.resolve(8).await;
        assert_eq!(result.unwrap_err(), ResolutionError::TooManyIndirections(8));
    }

    #[tokio::test]
    async fn test_failure_is_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handle = StreamHandle::new(StreamValue::thunk(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            StreamValue::failed(ResolutionError::Network("connection reset".to_string()))
        }));

        assert!(handle.resolve(DEFAULT_MAX_INDIRECTIONS).await.is_err());
        let again = handle.resolve(DEFAULT_MAX_INDIRECTIONS).await;

        assert_eq!(
            again.unwrap_err(),
            ResolutionError::Network("connection reset".to_string())
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_body_can_only_be_taken_once() {
        let stream = MediaStream::from_bytes("memory://body", vec![7]);
        let clone = stream.clone();

        let mut body = stream.take_body().unwrap();
        assert!(clone.take_body().is_none());
        assert_eq!(body.next().await.unwrap().unwrap(), vec![7]);
    }
}
