//! In-Memory Task Serializer
//!
//! 会话内的 FIFO 单飞执行管道：显式任务队列 + 单个活动 worker 标志

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::collections::VecDeque;
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::{oneshot, watch};

/// Serializer 错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializerError {
    /// 任务在给出结果之前终止（panic）
    #[error("Task abandoned before completion: {0}")]
    Abandoned(String),
}

type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

struct Task {
    name: String,
    job: Job,
}

struct QueueState {
    tasks: VecDeque<Task>,
    /// 是否有 worker 正在消费队列
    running: bool,
    /// 累计提交数
    submitted: u64,
}

struct Inner {
    label: String,
    state: Mutex<QueueState>,
    /// 累计完成数
    completed: watch::Sender<u64>,
}

/// 任务串行器
///
/// 不变量:
/// - 同一时刻至多一个任务在执行
/// - 执行顺序 = 提交顺序（以调用 `submit` 的时刻为准）
/// - 任务失败只影响它自己的 completion
#[derive(Clone)]
pub struct TaskSerializer {
    inner: Arc<Inner>,
}

impl TaskSerializer {
    pub fn new(label: impl Into<String>) -> Self {
        let (completed, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                label: label.into(),
                state: Mutex::new(QueueState {
                    tasks: VecDeque::new(),
                    running: false,
                    submitted: 0,
                }),
                completed,
            }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        lock(&self.inner.state)
    }

    /// 提交任务
    ///
    /// 入队在调用时同步完成；返回的 [`Completion`] 只负责等待结果，
    /// 丢弃它不会取消任务。不要在任务体内 await 同一串行器的 completion，否则会死锁。
    pub fn submit<T, E, F, Fut>(&self, name: impl Into<String>, operation: F) -> Completion<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        let name = name.into();
        let (sender, receiver) = oneshot::channel();

        let label = self.inner.label.clone();
        let task_name = name.clone();
        let job: Job = Box::new(move || {
            async move {
                tracing::debug!(serializer = %label, task = %task_name, "Executing task");
                let result = operation().await;
                match &result {
                    Ok(_) => {
                        tracing::debug!(serializer = %label, task = %task_name, "Task finished")
                    }
                    Err(e) => {
                        tracing::warn!(serializer = %label, task = %task_name, error = %e, "Task failed")
                    }
                }
                // 调用方可能已经不再等待
                let _ = sender.send(result);
            }
            .boxed()
        });

        let start_worker = {
            let mut state = self.lock_state();
            state.tasks.push_back(Task {
                name: name.clone(),
                job,
            });
            state.submitted += 1;
            tracing::debug!(
                serializer = %self.inner.label,
                task = %name,
                queued = state.tasks.len(),
                "Task added"
            );
            let idle = !state.running;
            state.running = true;
            idle
        };

        if start_worker {
            tokio::spawn(run_worker(self.inner.clone()));
        }

        Completion { name, receiver }
    }

    /// 等待调用时已入队的任务全部完成
    ///
    /// 空闲时立即返回，不会提交新任务
    pub async fn drain(&self) {
        let target = {
            let state = self.lock_state();
            if state.tasks.is_empty() && !state.running {
                return;
            }
            state.submitted
        };

        let mut completed = self.inner.completed.subscribe();
        // Sender 由 self 持有，wait_for 不会因关闭而失败
        let _ = completed.wait_for(|done| *done >= target).await;
    }

    /// 等待执行的任务数（不含正在执行的）
    pub fn queued(&self) -> usize {
        self.lock_state().tasks.len()
    }

    pub fn is_idle(&self) -> bool {
        let state = self.lock_state();
        state.tasks.is_empty() && !state.running
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }
}

fn lock(state: &Mutex<QueueState>) -> MutexGuard<'_, QueueState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 消费队列直到为空
async fn run_worker(inner: Arc<Inner>) {
    loop {
        let task = {
            let mut state = lock(&inner.state);
            match state.tasks.pop_front() {
                Some(task) => task,
                None => {
                    state.running = false;
                    break;
                }
            }
        };

        // 每个任务单独 spawn，panic 只会终止该任务
        if let Err(e) = tokio::spawn((task.job)()).await {
            tracing::error!(
                serializer = %inner.label,
                task = %task.name,
                error = %e,
                "Task panicked"
            );
        }
        inner.completed.send_modify(|done| *done += 1);
    }
}

/// 任务结果
pub struct Completion<T, E> {
    name: String,
    receiver: oneshot::Receiver<Result<T, E>>,
}

impl<T, E> Completion<T, E> {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T, E> Future for Completion<T, E>
where
    E: From<SerializerError>,
{
    type Output = Result<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => {
                Poll::Ready(Err(SerializerError::Abandoned(self.name.clone()).into()))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
