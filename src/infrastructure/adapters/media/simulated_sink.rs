//! Simulated Media Sink - 按时钟推进的音频输出
//!
//! 不解码音频：时长由登记值或按码率估算，`advance` 推进播放位置并返回
//! 真实输出会发出的事件序列

use std::collections::{HashMap, HashSet};

use crate::domain::playback::{ChunkSource, MediaError, MediaEvent, MediaSink};

/// 128 kbps 编码的字节率
pub const DEFAULT_BYTES_PER_SECOND: f64 = 16_000.0;

#[derive(Debug, Clone)]
struct BoundSource {
    label: String,
    duration: f64,
}

/// 模拟媒体输出
#[derive(Debug)]
pub struct SimulatedMediaSink {
    bytes_per_second: f64,
    durations: HashMap<String, f64>,
    unplayable: HashSet<String>,
    bound: Option<BoundSource>,
    position: f64,
    rate: f64,
    playing: bool,
    metadata_pending: bool,
}

impl SimulatedMediaSink {
    pub fn new(bytes_per_second: f64) -> Self {
        Self {
            bytes_per_second: if bytes_per_second > 0.0 {
                bytes_per_second
            } else {
                DEFAULT_BYTES_PER_SECOND
            },
            durations: HashMap::new(),
            unplayable: HashSet::new(),
            bound: None,
            position: 0.0,
            rate: 1.0,
            playing: false,
            metadata_pending: false,
        }
    }

    /// 登记外部资源的时长
    pub fn register(&mut self, locator: impl Into<String>, duration_secs: f64) {
        self.durations.insert(locator.into(), duration_secs.max(0.0));
    }

    /// 标记资源不可播放（绑定失败）
    pub fn mark_unplayable(&mut self, locator: impl Into<String>) {
        self.unplayable.insert(locator.into());
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// 当前绑定来源的描述
    pub fn bound_label(&self) -> Option<&str> {
        self.bound.as_ref().map(|b| b.label.as_str())
    }

    /// 推进 `secs` 秒墙钟时间，返回产生的事件
    pub fn advance(&mut self, secs: f64) -> Vec<MediaEvent> {
        let Some(bound) = &self.bound else {
            return Vec::new();
        };
        let duration = bound.duration;

        let mut events = Vec::new();
        if self.metadata_pending {
            self.metadata_pending = false;
            events.push(MediaEvent::MetadataLoaded);
        }
        if !self.playing {
            return events;
        }

        self.position += secs.max(0.0) * self.rate;
        events.push(MediaEvent::TimeUpdate);
        if self.position >= duration {
            self.position = duration;
            self.playing = false;
            events.push(MediaEvent::Ended);
        }
        events
    }
}

impl Default for SimulatedMediaSink {
    fn default() -> Self {
        Self::new(DEFAULT_BYTES_PER_SECOND)
    }
}

impl MediaSink for SimulatedMediaSink {
    fn bind(&mut self, source: &ChunkSource) -> Result<(), MediaError> {
        let label = source.describe();
        let duration = match source {
            ChunkSource::Bytes(data) if data.is_empty() => {
                return Err(MediaError::BindFailed("empty audio".to_string()));
            }
            ChunkSource::Bytes(data) => data.len() as f64 / self.bytes_per_second,
            ChunkSource::Locator(loc) if self.unplayable.contains(loc) => {
                return Err(MediaError::BindFailed(format!("unplayable source: {}", loc)));
            }
            ChunkSource::Locator(loc) => *self
                .durations
                .get(loc)
                .ok_or_else(|| MediaError::BindFailed(format!("unknown source: {}", loc)))?,
        };

        self.bound = Some(BoundSource { label, duration });
        self.position = 0.0;
        self.playing = false;
        self.metadata_pending = true;
        Ok(())
    }

    fn unbind(&mut self) {
        self.bound = None;
        self.playing = false;
        self.metadata_pending = false;
    }

    fn play(&mut self) -> Result<(), MediaError> {
        if self.bound.is_none() {
            return Err(MediaError::PlayFailed("no source bound".to_string()));
        }
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    fn position(&self) -> f64 {
        self.position
    }

    fn set_position(&mut self, secs: f64) {
        let max = self.bound.as_ref().map(|b| b.duration).unwrap_or(0.0);
        self.position = secs.clamp(0.0, max);
    }

    fn known_duration(&self) -> Option<f64> {
        self.bound.as_ref().map(|b| b.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_bytes_duration_from_bitrate() {
        let mut sink = SimulatedMediaSink::new(1_000.0);
        sink.bind(&ChunkSource::Bytes(Arc::new(vec![0; 2_500]))).unwrap();
        assert_eq!(sink.known_duration(), Some(2.5));
    }

    #[test]
    fn test_bind_failures() {
        let mut sink = SimulatedMediaSink::default();
        sink.register("bad.mp3", 3.0);
        sink.mark_unplayable("bad.mp3");

        assert!(sink.bind(&ChunkSource::Bytes(Arc::new(Vec::new()))).is_err());
        assert!(sink.bind(&ChunkSource::Locator("bad.mp3".into())).is_err());
        assert!(sink.bind(&ChunkSource::Locator("missing.mp3".into())).is_err());
        assert!(sink.play().is_err());
    }

    #[test]
    fn test_advance_emits_events_at_rate() {
        let mut sink = SimulatedMediaSink::default();
        sink.register("a.mp3", 4.0);
        sink.bind(&ChunkSource::Locator("a.mp3".into())).unwrap();
        sink.set_rate(2.0);
        sink.play().unwrap();

        let first = sink.advance(1.0);
        assert_eq!(first, vec![MediaEvent::MetadataLoaded, MediaEvent::TimeUpdate]);
        assert_eq!(sink.position(), 2.0);

        let second = sink.advance(1.5);
        assert_eq!(second, vec![MediaEvent::TimeUpdate, MediaEvent::Ended]);
        assert_eq!(sink.position(), 4.0);
        assert!(!sink.is_playing());
        assert!(sink.advance(1.0).is_empty());
    }

    #[test]
    fn test_paused_sink_does_not_move() {
        let mut sink = SimulatedMediaSink::default();
        sink.register("a.mp3", 4.0);
        sink.bind(&ChunkSource::Locator("a.mp3".into())).unwrap();
        sink.play().unwrap();
        sink.pause();
        assert_eq!(sink.advance(1.0), vec![MediaEvent::MetadataLoaded]);
        assert_eq!(sink.position(), 0.0);
    }
}
