//! Playback Context - Media Sink Port
//!
//! 单一音频输出的抽象：绑定来源、播放、暂停、定位、倍速

use thiserror::Error;

use super::ChunkSource;

/// 媒体输出错误
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Failed to bind source: {0}")]
    BindFailed(String),

    #[error("Playback failed: {0}")]
    PlayFailed(String),
}

/// 媒体输出事件
///
/// 由驱动方推送给 `PlaybackEngine::handle_event`
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// 播放位置更新
    TimeUpdate,
    /// 时长等元数据可用
    MetadataLoaded,
    /// 当前来源自然播放结束
    Ended,
    /// 当前来源播放出错（解码/网络）
    Error(String),
}

/// Media Sink
///
/// 同一时刻只绑定一个来源
pub trait MediaSink {
    /// 绑定新来源，替换之前的来源，位置归零
    fn bind(&mut self, source: &ChunkSource) -> Result<(), MediaError>;

    /// 解除绑定
    fn unbind(&mut self);

    /// 开始或继续播放
    fn play(&mut self) -> Result<(), MediaError>;

    fn pause(&mut self);

    /// 设置倍速（绑定新来源后需要重新设置）
    fn set_rate(&mut self, rate: f64);

    /// 当前来源内的播放位置（秒）
    fn position(&self) -> f64;

    fn set_position(&mut self, secs: f64);

    /// 当前来源的时长，未知时为 None
    fn known_duration(&self) -> Option<f64>;
}
