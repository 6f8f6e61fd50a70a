//! Jukebox - 命令行播放
//!
//! `jukebox <url|query>...`：解析参数中的每一项，放入同一个会话并按顺序播放完毕

use std::sync::Arc;
use std::time::Duration;

use jukebox::application::ports::{MediaResolverPort, VoiceChannelRef};
use jukebox::application::{PlaybackError, PlaybackSession};
use jukebox::config::{load_config, print_config};
use jukebox::infrastructure::adapters::{
    is_url, DrainTransport, DrainTransportConfig, HttpAudioResolver, HttpAudioResolverConfig,
    LogNotifier, UrlDispatcher, YoutubeDlConfig, YoutubeDlResolver,
};
use jukebox::infrastructure::memory::SessionRegistry;

const SESSION_KEY: &str = "console";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    // 初始化日志
    let log_filter = format!("{},jukebox={}", config.log.level, config.log.level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter)),
        )
        .init();

    let inputs: Vec<String> = std::env::args().skip(1).collect();
    if inputs.is_empty() {
        anyhow::bail!("Usage: jukebox <url|query>...");
    }

    tracing::info!("Jukebox");
    print_config(&config);

    // 创建解析器
    let http = HttpAudioResolver::new(HttpAudioResolverConfig {
        user_agent: config.resolver.user_agent.clone(),
        default_thumbnail: config.resolver.default_thumbnail.clone(),
        default_title: config.resolver.default_title.clone(),
        timeout_secs: config.resolver.timeout_secs,
    })?;
    let youtube_dl = YoutubeDlResolver::new(YoutubeDlConfig {
        program: config.resolver.youtube_dl_path.clone(),
        format: config.resolver.format.clone(),
        retries: config.resolver.retries,
        search_result_count: config.resolver.search_result_count,
        default_thumbnail: config.resolver.default_thumbnail.clone(),
    });
    let resolver: Arc<dyn MediaResolverPort> = Arc::new(UrlDispatcher::new(http, youtube_dl));

    // 创建会话注册表
    let transport = Arc::new(DrainTransport::new(DrainTransportConfig {
        chunk_interval: config.transport.chunk_interval(),
    }));
    let registry = SessionRegistry::new(transport, config.playback.session_settings());
    let session = registry.get_or_create(
        SESSION_KEY,
        VoiceChannelRef::new(SESSION_KEY),
        Arc::new(LogNotifier::new(SESSION_KEY)),
    );

    let max = config.playback.max_queue_size;
    for input in &inputs {
        let tracks = if is_url(input) {
            resolver.resolve_from_url(input, max).await
        } else {
            resolver
                .resolve_from_search(input)
                .await
                .map(|candidates| candidates.into_iter().take(1).map(|c| c.track).collect())
        };

        let tracks = match tracks {
            Ok(tracks) => tracks,
            Err(e) => {
                tracing::error!(input = %input, error = %e, "Failed to resolve");
                continue;
            }
        };
        for track in tracks {
            if let Err(e) = session.enqueue(track, None).await {
                tracing::warn!(input = %input, error = %e, "Track not queued");
            }
        }
    }

    if let Err(e) = start_playback(&session).await {
        tracing::error!(error = %e, "Failed to start playback");
        return Ok(());
    }

    let finished = async {
        while registry.contains(SESSION_KEY) {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    };

    tokio::select! {
        _ = finished => {
            tracing::info!("Queue finished");
        }
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Received shutdown signal");
            session.clear().await?;
            session.settled().await;
        }
    }

    Ok(())
}

/// 开始播放；队首无法解析时已被丢弃，继续尝试下一首
async fn start_playback(session: &PlaybackSession) -> Result<(), PlaybackError> {
    loop {
        match session.play().await {
            Err(PlaybackError::Resolution(e)) => {
                tracing::warn!(error = %e, "Skipping unplayable track");
            }
            result => return result,
        }
    }
}
