//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;

use crate::application::ports::{DEFAULT_MODEL_ID, DEFAULT_OUTPUT_FORMAT};
use crate::domain::text_segmenter::DEFAULT_MAX_CHARS;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// TTS 引擎配置
    #[serde(default)]
    pub tts: TtsConfig,

    /// OCR 服务配置
    #[serde(default)]
    pub ocr: OcrConfig,

    /// 音频缓存配置
    #[serde(default)]
    pub cache: CacheConfig,

    /// 文档库配置
    #[serde(default)]
    pub library: LibraryConfig,

    /// 文本分段配置
    #[serde(default)]
    pub segmenter: SegmenterConfig,

    /// 朗读配置
    #[serde(default)]
    pub reader: ReaderConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// TTS 后端
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsBackend {
    /// 远程 HTTP 合成服务
    #[default]
    Http,
    /// 离线伪合成（不访问网络）
    Fake,
}

/// TTS 引擎配置
#[derive(Debug, Clone, Deserialize)]
pub struct TtsConfig {
    /// 后端类型: http, fake
    #[serde(default)]
    pub backend: TtsBackend,

    /// TTS 服务基础 URL
    #[serde(default = "default_service_url")]
    pub url: String,

    /// 请求超时时间（秒）
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// 最大重试次数
    #[serde(default)]
    pub max_retries: u32,

    /// 合成模型
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// 输出音频格式
    #[serde(default = "default_output_format")]
    pub output_format: String,
}

fn default_service_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_timeout() -> u64 {
    120
}

fn default_model_id() -> String {
    DEFAULT_MODEL_ID.to_string()
}

fn default_output_format() -> String {
    DEFAULT_OUTPUT_FORMAT.to_string()
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            backend: TtsBackend::default(),
            url: default_service_url(),
            timeout_secs: default_timeout(),
            max_retries: 0,
            model_id: default_model_id(),
            output_format: default_output_format(),
        }
    }
}

/// OCR 服务配置
#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    /// OCR 服务基础 URL
    #[serde(default = "default_service_url")]
    pub url: String,

    /// 请求超时时间（秒）
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            url: default_service_url(),
            timeout_secs: default_timeout(),
        }
    }
}

/// 音频缓存配置
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Sled 数据库目录
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,

    /// 是否持久化；false 时使用进程内缓存
    #[serde(default = "default_true")]
    pub persistent: bool,

    /// 条目存活时间（秒）
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,

    /// 是否定期清扫过期条目
    #[serde(default = "default_true")]
    pub sweep_enabled: bool,

    /// 清扫间隔（秒）
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("data/tts_cache.sled")
}

fn default_true() -> bool {
    true
}

fn default_ttl() -> u64 {
    7 * 24 * 3600 // 7 天
}

fn default_sweep_interval() -> u64 {
    3600 // 1 小时
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
            persistent: true,
            ttl_secs: default_ttl(),
            sweep_enabled: true,
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

/// 文档库配置
#[derive(Debug, Clone, Deserialize)]
pub struct LibraryConfig {
    /// SQLite 数据库文件路径
    #[serde(default = "default_library_path")]
    pub path: String,

    /// 最大连接数
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_library_path() -> String {
    "data/library.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            path: default_library_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// 文本分段配置
#[derive(Debug, Clone, Deserialize)]
pub struct SegmenterConfig {
    /// 单个片段最大字符数
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

fn default_max_chars() -> usize {
    DEFAULT_MAX_CHARS
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
        }
    }
}

/// 朗读配置
#[derive(Debug, Clone, Deserialize)]
pub struct ReaderConfig {
    /// 预读页数
    #[serde(default = "default_read_ahead")]
    pub read_ahead: u32,

    /// 预取并发数
    #[serde(default = "default_prefetch_concurrency")]
    pub prefetch_concurrency: usize,

    /// 播放速率
    #[serde(default = "default_playback_rate")]
    pub playback_rate: f64,

    /// 默认音色；命令行未指定时使用
    #[serde(default)]
    pub default_voice: Option<String>,
}

fn default_read_ahead() -> u32 {
    1
}

fn default_prefetch_concurrency() -> usize {
    2
}

fn default_playback_rate() -> f64 {
    1.0
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            read_ahead: default_read_ahead(),
            prefetch_concurrency: default_prefetch_concurrency(),
            playback_rate: default_playback_rate(),
            default_voice: None,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl LibraryConfig {
    /// 获取数据库 URL
    pub fn database_url(&self) -> String {
        format!("sqlite:{}?mode=rwc", self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.tts.backend, TtsBackend::Http);
        assert_eq!(config.tts.url, "http://localhost:3000");
        assert_eq!(config.tts.model_id, "eleven_multilingual_v2");
        assert_eq!(config.tts.output_format, "mp3_44100_128");
        assert_eq!(config.cache.ttl_secs, 604_800);
        assert_eq!(config.library.path, "data/library.db");
        assert_eq!(config.segmenter.max_chars, 350);
        assert_eq!(config.reader.read_ahead, 1);
        assert!(config.reader.default_voice.is_none());
    }

    #[test]
    fn test_library_url() {
        let config = LibraryConfig::default();
        assert_eq!(config.database_url(), "sqlite:data/library.db?mode=rwc");
    }
}
