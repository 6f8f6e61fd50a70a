//! HTTP Stream Producer - 按 URL 拉取媒体流

use futures_util::{StreamExt, TryStreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response};
use std::io;
use std::sync::OnceLock;

use crate::domain::track::{MediaStream, ResolutionError, StreamValue};

fn shared_client() -> &'static Client {
    static CLIENT: OnceLock<Client> = OnceLock::new();
    CLIENT.get_or_init(Client::new)
}

/// 默认的按 URL 拉取的流（首次解析时才发起请求）
pub fn fetch_url(url: String) -> StreamValue {
    fetch_with(shared_client().clone(), url)
}

/// 使用指定客户端拉取
pub fn fetch_with(client: Client, url: String) -> StreamValue {
    StreamValue::thunk(move || {
        StreamValue::deferred(async move {
            let stream = open(&client, &url).await?;
            Ok(StreamValue::ready(stream))
        })
    })
}

/// 发起 GET 请求，返回响应体的流
pub async fn open(client: &Client, url: &str) -> Result<MediaStream, ResolutionError> {
    tracing::debug!(url = %url, "Opening HTTP stream");

    let response = client
        .get(url)
        .header(ACCEPT, "audio/*")
        .send()
        .await
        .map_err(|e| ResolutionError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ResolutionError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    Ok(into_media_stream(response))
}

/// 响应体 -> MediaStream
fn into_media_stream(response: Response) -> MediaStream {
    let origin = response.url().to_string();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response
        .bytes_stream()
        .map_ok(|chunk| chunk.to_vec())
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
        .boxed();
    MediaStream::new(origin, content_type, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::track::StreamHandle;

    #[test]
    fn test_fetch_is_lazy() {
        let handle = StreamHandle::new(fetch_url("http://127.0.0.1:9/a.mp3".to_string()));
        assert_eq!(handle.state_name(), "thunk");
        assert!(!handle.is_resolved());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let handle = StreamHandle::new(fetch_url("http://127.0.0.1:9/a.mp3".to_string()));

        let result = handle.resolve(4).await;
        assert!(matches!(result, Err(ResolutionError::Network(_))));
        assert!(handle.is_resolved());
    }
}
