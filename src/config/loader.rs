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

use super::types::{AppConfig, TtsBackend};
use crate::domain::text_segmenter::MIN_MAX_CHARS;

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
/// 1. 环境变量（前缀 `AIREADER_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `AIREADER_TTS__URL=http://tts-server:3000`
/// - `AIREADER_TTS__BACKEND=fake`
/// - `AIREADER_CACHE__TTL_SECS=86400`
/// - `AIREADER_READER__DEFAULT_VOICE=21m00Tcm4TlvDq8ikWAM`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("tts.backend", "http")?
        .set_default("tts.url", "http://localhost:3000")?
        .set_default("tts.timeout_secs", 120)?
        .set_default("tts.max_retries", 0)?
        .set_default("tts.model_id", "eleven_multilingual_v2")?
        .set_default("tts.output_format", "mp3_44100_128")?
        .set_default("ocr.url", "http://localhost:3000")?
        .set_default("ocr.timeout_secs", 120)?
        .set_default("cache.path", "data/tts_cache.sled")?
        .set_default("cache.persistent", true)?
        .set_default("cache.ttl_secs", 604_800)?
        .set_default("cache.sweep_enabled", true)?
        .set_default("cache.sweep_interval_secs", 3600)?
        .set_default("library.path", "data/library.db")?
        .set_default("library.max_connections", 5)?
        .set_default("segmenter.max_chars", 350)?
        .set_default("reader.read_ahead", 1)?
        .set_default("reader.prefetch_concurrency", 2)?
        .set_default("reader.playback_rate", 1.0)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量（最高优先级）
    // 例如: AIREADER_TTS__URL=http://tts-server:3000
    builder = builder.add_source(
        Environment::with_prefix("AIREADER")
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
    if config.tts.backend == TtsBackend::Http && config.tts.url.is_empty() {
        return Err(ConfigError::ValidationError(
            "TTS URL cannot be empty".to_string(),
        ));
    }

    if config.ocr.url.is_empty() {
        return Err(ConfigError::ValidationError(
            "OCR URL cannot be empty".to_string(),
        ));
    }

    if config.cache.persistent && config.cache.path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "Cache path cannot be empty".to_string(),
        ));
    }

    if config.cache.ttl_secs == 0 {
        return Err(ConfigError::ValidationError(
            "Cache TTL cannot be 0".to_string(),
        ));
    }

    if config.cache.sweep_enabled && config.cache.sweep_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "Sweep interval cannot be 0 when sweeping is enabled".to_string(),
        ));
    }

    if config.library.path.is_empty() {
        return Err(ConfigError::ValidationError(
            "Library path cannot be empty".to_string(),
        ));
    }

    if config.segmenter.max_chars < MIN_MAX_CHARS {
        return Err(ConfigError::ValidationError(format!(
            "Segmenter max_chars must be at least {}",
            MIN_MAX_CHARS
        )));
    }

    if !(config.reader.playback_rate.is_finite() && config.reader.playback_rate > 0.0) {
        return Err(ConfigError::ValidationError(
            "Playback rate must be positive".to_string(),
        ));
    }

    if config.reader.prefetch_concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "Prefetch concurrency cannot be 0".to_string(),
        ));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("TTS Backend: {:?}", config.tts.backend);
    tracing::info!("TTS URL: {}", config.tts.url);
    tracing::info!("TTS Timeout: {}s", config.tts.timeout_secs);
    tracing::info!("TTS Model: {} ({})", config.tts.model_id, config.tts.output_format);
    tracing::info!("OCR URL: {}", config.ocr.url);
    if config.cache.persistent {
        tracing::info!("Cache: {:?}", config.cache.path);
    } else {
        tracing::info!("Cache: in-memory");
    }
    tracing::info!("Cache TTL: {}s", config.cache.ttl_secs);
    tracing::info!("Cache Sweep Enabled: {}", config.cache.sweep_enabled);
    if config.cache.sweep_enabled {
        tracing::info!("Cache Sweep Interval: {}s", config.cache.sweep_interval_secs);
    }
    tracing::info!("Library: {}", config.library.path);
    tracing::info!("Segmenter Max Chars: {}", config.segmenter.max_chars);
    tracing::info!(
        "Reader: read_ahead={}, prefetch_concurrency={}, rate={}",
        config.reader.read_ahead,
        config.reader.prefetch_concurrency,
        config.reader.playback_rate
    );
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}
