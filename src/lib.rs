//! AiReader - 文档朗读系统
//!
//! 架构设计: DDD + CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Document Context: 文档与指纹
//! - Playback Context: 音频片段队列与播放引擎
//! - Text Segmenter / Layout Extractor: 纯函数文本处理
//!
//! 应用层 (application/):
//! - Ports: 端口定义（TtsCache, TtsEngine, OcrEngine, DocumentLibrary, Clock）
//! - Services: TtsCache 服务, ReaderService 朗读编排
//! - Commands: CQRS 命令处理器
//! - Queries: CQRS 查询处理器
//!
//! 基础设施层 (infrastructure/):
//! - Persistence: Sled 音频缓存 + SQLite 文档库
//! - Memory: 进程内音频缓存
//! - Worker: PrefetchWorker 预取, CacheSweeper 过期清扫
//! - Adapters: TTS Client, OCR Client, Simulated Media Sink
//! - Events: 朗读事件发布

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
