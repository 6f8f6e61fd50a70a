//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;
use crate::application::ports::Bitrate;
use crate::domain::playback::{MAX_VOLUME, MIN_VOLUME};

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `JUKEBOX_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `JUKEBOX_PLAYBACK__MAX_QUEUE_SIZE=20`
/// - `JUKEBOX_RESOLVER__YOUTUBE_DL_PATH=/usr/local/bin/yt-dlp`
/// - `JUKEBOX_LOG__LEVEL=debug`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let defaults = AppConfig::default();
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("playback.max_queue_size", defaults.playback.max_queue_size as u64)?
        .set_default("playback.passes", defaults.playback.passes as u64)?
        .set_default("playback.bitrate", defaults.playback.bitrate.clone())?
        .set_default("playback.default_volume", defaults.playback.default_volume as f64)?
        .set_default("playback.max_indirections", defaults.playback.max_indirections as u64)?
        .set_default(
            "resolver.search_result_count",
            defaults.resolver.search_result_count as u64,
        )?
        .set_default("resolver.youtube_dl_path", defaults.resolver.youtube_dl_path.clone())?
        .set_default("resolver.format", defaults.resolver.format.clone())?
        .set_default("resolver.retries", defaults.resolver.retries as u64)?
        .set_default("resolver.user_agent", defaults.resolver.user_agent.clone())?
        .set_default("resolver.default_thumbnail", defaults.resolver.default_thumbnail.clone())?
        .set_default("resolver.default_title", defaults.resolver.default_title.clone())?
        .set_default("resolver.timeout_secs", defaults.resolver.timeout_secs)?
        .set_default("transport.chunk_interval_ms", defaults.transport.chunk_interval_ms)?
        .set_default("log.level", defaults.log.level.clone())?;

    // 2. 配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量（最高优先级）
    // 例如: JUKEBOX_PLAYBACK__MAX_QUEUE_SIZE=20
    // 注意: 环境变量名会被转换为小写
    builder = builder.add_source(
        Environment::with_prefix("JUKEBOX")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.playback.max_queue_size == 0 {
        return Err(ConfigError::ValidationError(
            "playback.max_queue_size must be greater than 0".to_string(),
        ));
    }

    let volume = config.playback.default_volume;
    if !(MIN_VOLUME..=MAX_VOLUME).contains(&volume) {
        return Err(ConfigError::ValidationError(format!(
            "playback.default_volume must be within [{}, {}], got {}",
            MIN_VOLUME, MAX_VOLUME, volume
        )));
    }

    if config.playback.max_indirections == 0 {
        return Err(ConfigError::ValidationError(
            "playback.max_indirections must be greater than 0".to_string(),
        ));
    }

    if let Err(e) = config.playback.bitrate.parse::<Bitrate>() {
        return Err(ConfigError::ValidationError(e));
    }

    if config.resolver.youtube_dl_path.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "resolver.youtube_dl_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Max Queue Size: {}", config.playback.max_queue_size);
    tracing::info!(
        "Passes: {}, Bitrate: {}",
        config.playback.passes,
        config.playback.bitrate
    );
    tracing::info!("Default Volume: {}", config.playback.default_volume);
    tracing::info!("youtube-dl: {}", config.resolver.youtube_dl_path);
    tracing::info!("Resolver Timeout: {}s", config.resolver.timeout_secs);
    tracing::info!("Chunk Interval: {}ms", config.transport.chunk_interval_ms);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_validation_passes_for_valid_config() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_zero_queue_size() {
        let mut config = AppConfig::default();
        config.playback.max_queue_size = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_volume_out_of_range() {
        let mut config = AppConfig::default();
        config.playback.default_volume = 2.5;
        assert!(validate_config(&config).is_err());

        config.playback.default_volume = f32::NAN;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_bad_bitrate() {
        let mut config = AppConfig::default();
        config.playback.bitrate = "loud".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_empty_youtube_dl_path() {
        let mut config = AppConfig::default();
        config.resolver.youtube_dl_path = "  ".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "[playback]\nmax_queue_size = 3\nbitrate = \"96\"\n\n[resolver]\nformat = \"worstaudio\""
        )
        .unwrap();

        let config = load_config_from_path(Some(file.path())).unwrap();
        assert_eq!(config.playback.max_queue_size, 3);
        assert_eq!(config.playback.bitrate, "96");
        assert_eq!(config.resolver.format, "worstaudio");
        // 未配置的字段使用默认值
        assert_eq!(config.playback.passes, 2);
        assert_eq!(config.resolver.search_result_count, 5);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(file, "[playback]\nmax_queue_size = 0").unwrap();

        let result = load_config_from_path(Some(file.path()));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }
}
