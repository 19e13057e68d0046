//! Playback Context - Audio Chunk

use std::sync::Arc;
use uuid::Uuid;

/// 音频来源
///
/// 媒体输出可直接打开的定位符：内存中的音频数据或外部资源地址
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkSource {
    /// 内存音频（缓存命中或刚合成的数据）
    Bytes(Arc<Vec<u8>>),
    /// URL 或文件路径
    Locator(String),
}

impl ChunkSource {
    pub fn describe(&self) -> String {
        match self {
            ChunkSource::Bytes(data) => format!("bytes({})", data.len()),
            ChunkSource::Locator(loc) => loc.clone(),
        }
    }
}

/// 音频片段 - 最小播放单位
///
/// 时长在媒体输出报告之前未知，之后只写入一次
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    pub id: String,
    pub source: ChunkSource,
    pub duration: Option<f64>,
}

impl AudioChunk {
    pub fn new(id: impl Into<String>, source: ChunkSource) -> Self {
        Self {
            id: id.into(),
            source,
            duration: None,
        }
    }

    /// 从内存音频创建，自动分配 ID
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self::new(Uuid::new_v4().to_string(), ChunkSource::Bytes(Arc::new(data)))
    }

    pub fn from_locator(id: impl Into<String>, locator: impl Into<String>) -> Self {
        Self::new(id, ChunkSource::Locator(locator.into()))
    }

    /// 预先声明时长（例如 TTS 服务在响应头中返回）
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration = Some(secs);
        self
    }

    pub fn known_duration(&self) -> f64 {
        self.duration.unwrap_or(0.0)
    }
}
