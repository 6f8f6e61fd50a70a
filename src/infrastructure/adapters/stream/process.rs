//! Process Stream Producer - 外部进程标准输出作为媒体流

use futures_util::{StreamExt, TryStreamExt};
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::io::ReaderStream;

use crate::domain::track::{MediaStream, ResolutionError, StreamValue};

/// 首次解析时启动进程，读取其 stdout
pub fn process_stream(program: impl Into<String>, args: Vec<String>) -> StreamValue {
    let program = program.into();
    StreamValue::thunk(move || match spawn_stdout(&program, &args) {
        Ok(stream) => StreamValue::ready(stream),
        Err(e) => StreamValue::failed(e),
    })
}

/// 启动进程，stdout 作为字节流
///
/// 流被丢弃时子进程随之被杀掉
pub fn spawn_stdout(program: &str, args: &[String]) -> Result<MediaStream, ResolutionError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ResolutionError::Process(format!("failed to spawn {}: {}", program, e)))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ResolutionError::Process(format!("{} has no stdout", program)))?;

    let origin = format!("{} {}", program, args.join(" "));
    tracing::debug!(command = %origin, pid = ?child.id(), "Spawned stream process");

    let body = ReaderStream::new(stdout)
        .map_ok(|chunk| chunk.to_vec())
        .map(move |item| {
            // 持有子进程直到流结束
            let _ = &child;
            item
        })
        .boxed();

    Ok(MediaStream::new(origin, None, body))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::domain::track::StreamHandle;

    #[tokio::test]
    async fn test_process_stdout_is_streamed() {
        let handle = StreamHandle::new(process_stream(
            "sh",
            vec!["-c".to_string(), "printf hello".to_string()],
        ));

        let stream = handle.resolve(4).await.unwrap();
        let chunks: Vec<Vec<u8>> = stream.take_body().unwrap().try_collect().await.unwrap();

        assert_eq!(chunks.concat(), b"hello");
        assert!(stream.origin().starts_with("sh -c"));
    }

    #[tokio::test]
    async fn test_missing_program_is_process_error() {
        let handle = StreamHandle::new(process_stream("definitely-not-a-real-binary", vec![]));

        let result = handle.resolve(4).await;
        assert!(matches!(result, Err(ResolutionError::Process(_))));
    }
}
