//! Playback Engine - 分片播放状态机
//!
//! 状态: Idle → Playing ⇄ Paused → Idle
//!
//! 时间线由 已播放列表 + 当前片段 + 待播放队列 组成：
//! - 累计时间 = Σ 已播放时长 + 当前片段内位置
//! - 未播放片段的时长未知时按 0 计入总时长

use std::collections::VecDeque;

use super::{AudioChunk, ChunkSource, MediaError, MediaEvent, MediaSink};

/// 单次调度中耗尽回调的最大连续触发次数
pub const MAX_REFILL_ROUNDS: usize = 8;

/// 播放状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

impl PlaybackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
        }
    }
}

/// 播放进度
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Progress {
    pub current_time: f64,
    pub duration: f64,
    pub percentage: f64,
}

/// 队列耗尽时由回调填充的新片段
#[derive(Debug, Default)]
pub struct Refill {
    chunks: Vec<AudioChunk>,
}

impl Refill {
    pub fn enqueue(&mut self, chunk: AudioChunk) {
        self.chunks.push(chunk);
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

type ProgressCallback = Box<dyn FnMut(Progress)>;
type DrainedCallback = Box<dyn FnMut(&mut Refill)>;

/// 分片播放引擎
///
/// 单线程、事件驱动：所有方法与 `handle_event` 在同一执行上下文中调用
pub struct PlaybackEngine<S: MediaSink> {
    sink: S,
    pending: VecDeque<AudioChunk>,
    played: Vec<AudioChunk>,
    current: Option<AudioChunk>,
    state: PlaybackState,
    playback_rate: f64,
    on_progress: Option<ProgressCallback>,
    on_queue_drained: Option<DrainedCallback>,
}

impl<S: MediaSink> PlaybackEngine<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            pending: VecDeque::new(),
            played: Vec::new(),
            current: None,
            state: PlaybackState::Idle,
            playback_rate: 1.0,
            on_progress: None,
            on_queue_drained: None,
        }
    }

    /// 设置进度回调
    pub fn set_on_progress(&mut self, callback: impl FnMut(Progress) + 'static) {
        self.on_progress = Some(Box::new(callback));
    }

    /// 设置队列耗尽回调（可通过 `Refill` 追加片段）
    ///
    /// 一次调度中回调最多连续触发 `MAX_REFILL_ROUNDS` 次；追加的片段全部无法播放时停在 Idle
    pub fn set_on_queue_drained(&mut self, callback: impl FnMut(&mut Refill) + 'static) {
        self.on_queue_drained = Some(Box::new(callback));
    }

    /// 追加片段；空闲时立即开始播放
    pub fn enqueue(&mut self, chunk: AudioChunk) {
        tracing::trace!(chunk_id = %chunk.id, pending = self.pending.len(), "Chunk enqueued");
        self.pending.push_back(chunk);
        if self.state == PlaybackState::Idle {
            self.start_next(None);
        }
    }

    pub fn pause(&mut self) {
        if self.current.is_none() {
            return;
        }
        self.sink.pause();
        self.state = PlaybackState::Paused;
    }

    pub fn resume(&mut self) {
        let Some(chunk_id) = self.current.as_ref().map(|c| c.id.clone()) else {
            return;
        };
        self.sink.set_rate(self.playback_rate);
        match self.sink.play() {
            Ok(()) => self.state = PlaybackState::Playing,
            Err(e) => {
                tracing::warn!(chunk_id = %chunk_id, error = %e, "Resume failed, skipping chunk");
                self.current = None;
                self.start_next(None);
            }
        }
    }

    /// 设置倍速，立即作用于当前片段并在之后每次绑定时重新应用
    pub fn set_playback_rate(&mut self, rate: f64) {
        if !rate.is_finite() || rate <= 0.0 {
            tracing::warn!(rate, "Ignoring invalid playback rate");
            return;
        }
        self.playback_rate = rate;
        if self.current.is_some() {
            self.sink.set_rate(rate);
        }
    }

    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    /// 跳转到时间线上的绝对位置（秒）
    ///
    /// 目标位于已播放片段时重建队列并从该片段的局部位置播放；
    /// 位于当前片段时仅设置局部位置；位于时长未知的后续片段时忽略
    pub fn seek_to(&mut self, target_secs: f64) {
        if !target_secs.is_finite() {
            return;
        }
        let mut remaining = target_secs.max(0.0);

        let mut hit: Option<usize> = None;
        for (idx, chunk) in self.played.iter().enumerate() {
            let duration = chunk.known_duration();
            if remaining <= duration {
                hit = Some(idx);
                break;
            }
            remaining -= duration;
        }

        if let Some(idx) = hit {
            let mut requeue: VecDeque<AudioChunk> = self.played.split_off(idx).into();
            if let Some(current) = self.current.take() {
                requeue.push_back(current);
            }
            requeue.extend(self.pending.drain(..));
            self.pending = requeue;

            tracing::debug!(
                target_secs,
                local_secs = remaining,
                requeued = self.pending.len(),
                "Seek into played chunk"
            );
            self.start_next(Some(remaining));
            return;
        }

        if self.current.is_some() {
            if let Some(duration) = self.sink.known_duration() {
                if remaining <= duration {
                    self.sink.set_position(remaining);
                    self.emit_progress();
                    return;
                }
            }
        }

        tracing::debug!(target_secs, "Seek target beyond known durations, ignored");
    }

    /// 清空所有片段并停止输出
    pub fn clear(&mut self) {
        self.pending.clear();
        self.played.clear();
        self.current = None;
        self.sink.pause();
        self.sink.set_position(0.0);
        self.sink.unbind();
        self.state = PlaybackState::Idle;
        tracing::debug!("Playback cleared");
    }

    /// 处理媒体输出事件
    pub fn handle_event(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::TimeUpdate => self.emit_progress(),
            MediaEvent::MetadataLoaded => {
                if let Some(duration) = self.sink.known_duration() {
                    if let Some(current) = self.current.as_mut() {
                        current.duration = Some(duration);
                    }
                }
                self.emit_progress();
            }
            MediaEvent::Ended => {
                if self.current.is_some() {
                    self.finish_current();
                }
            }
            MediaEvent::Error(message) => {
                if let Some(chunk) = self.current.take() {
                    tracing::warn!(chunk_id = %chunk.id, error = %message, "Chunk failed during playback, skipping");
                    self.start_next(None);
                }
            }
        }
    }

    /// 累计播放时间
    pub fn current_time(&self) -> f64 {
        let elapsed = if self.current.is_some() {
            self.sink.position()
        } else {
            0.0
        };
        self.played_time() + elapsed
    }

    /// 当前已知的总时长
    pub fn total_duration(&self) -> f64 {
        let current = self
            .current
            .as_ref()
            .map(|c| self.sink.known_duration().unwrap_or_else(|| c.known_duration()))
            .unwrap_or(0.0);
        let queued: f64 = self.pending.iter().map(AudioChunk::known_duration).sum();
        self.played_time() + current + queued
    }

    pub fn progress(&self) -> Progress {
        let current_time = self.current_time();
        let duration = self.total_duration();
        let percentage = if duration > 0.0 {
            current_time / duration * 100.0
        } else {
            0.0
        };
        Progress {
            current_time,
            duration,
            percentage,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn current_chunk(&self) -> Option<&AudioChunk> {
        self.current.as_ref()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn played_chunks(&self) -> &[AudioChunk] {
        &self.played
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// 驱动方通过它推进模拟输出或读取设备状态
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    fn played_time(&self) -> f64 {
        self.played.iter().map(AudioChunk::known_duration).sum()
    }

    fn emit_progress(&mut self) {
        let progress = self.progress();
        if let Some(callback) = self.on_progress.as_mut() {
            callback(progress);
        }
    }

    /// 当前片段自然结束：记录最终时长，移入已播放列表
    fn finish_current(&mut self) {
        if let Some(mut chunk) = self.current.take() {
            chunk.duration = Some(
                self.sink
                    .known_duration()
                    .unwrap_or_else(|| chunk.known_duration()),
            );
            tracing::trace!(chunk_id = %chunk.id, duration = ?chunk.duration, "Chunk finished");
            self.played.push(chunk);
        }
        self.start_next(None);
    }

    fn bind_and_play(&mut self, source: &ChunkSource, start_at: Option<f64>) -> Result<(), MediaError> {
        self.sink.bind(source)?;
        if let Some(position) = start_at {
            self.sink.set_position(position);
        }
        self.sink.set_rate(self.playback_rate);
        self.sink.play()
    }

    /// 绑定下一个可播放片段；失败的片段直接丢弃
    ///
    /// 队列耗尽时进入 Idle 并调用耗尽回调，回调追加的片段会继续播放
    fn start_next(&mut self, mut start_at: Option<f64>) {
        let mut rounds = 0;
        loop {
            while let Some(chunk) = self.pending.pop_front() {
                match self.bind_and_play(&chunk.source, start_at.take()) {
                    Ok(()) => {
                        tracing::debug!(
                            chunk_id = %chunk.id,
                            rate = self.playback_rate,
                            pending = self.pending.len(),
                            "Chunk bound"
                        );
                        self.current = Some(chunk);
                        self.state = PlaybackState::Playing;
                        return;
                    }
                    Err(e) => {
                        tracing::warn!(
                            chunk_id = %chunk.id,
                            source = %chunk.source.describe(),
                            error = %e,
                            "Skipping unplayable chunk"
                        );
                    }
                }
            }

            self.current = None;
            self.state = PlaybackState::Idle;

            if rounds == MAX_REFILL_ROUNDS {
                tracing::warn!(rounds, "Refilled chunks were all unplayable, staying idle");
                return;
            }
            rounds += 1;

            let mut refill = Refill::default();
            if let Some(callback) = self.on_queue_drained.as_mut() {
                tracing::debug!("Playback queue drained");
                callback(&mut refill);
            }
            if refill.is_empty() {
                return;
            }
            self.pending.extend(refill.chunks);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet};
    use std::rc::Rc;

    /// 按定位符声明时长的测试输出
    #[derive(Default)]
    struct ScriptedSink {
        durations: HashMap<String, f64>,
        broken: HashSet<String>,
        bound: Option<String>,
        position: f64,
        rate: f64,
        playing: bool,
        rate_log: Vec<(String, f64)>,
    }

    impl ScriptedSink {
        fn with_clips(clips: &[(&str, f64)]) -> Self {
            Self {
                durations: clips.iter().map(|(k, d)| (k.to_string(), *d)).collect(),
                rate: 1.0,
                ..Default::default()
            }
        }

        fn tick(&mut self, secs: f64) -> Vec<MediaEvent> {
            let Some(duration) = self.known_duration() else {
                return Vec::new();
            };
            if !self.playing {
                return Vec::new();
            }
            self.position += secs * self.rate;
            if self.position >= duration {
                self.position = duration;
                self.playing = false;
                vec![MediaEvent::TimeUpdate, MediaEvent::Ended]
            } else {
                vec![MediaEvent::TimeUpdate]
            }
        }
    }

    impl MediaSink for ScriptedSink {
        fn bind(&mut self, source: &ChunkSource) -> Result<(), MediaError> {
            let ChunkSource::Locator(loc) = source else {
                return Err(MediaError::BindFailed("bytes unsupported".into()));
            };
            if self.broken.contains(loc) {
                return Err(MediaError::BindFailed(loc.clone()));
            }
            self.bound = Some(loc.clone());
            self.position = 0.0;
            self.playing = false;
            Ok(())
        }

        fn unbind(&mut self) {
            self.bound = None;
            self.playing = false;
        }

        fn play(&mut self) -> Result<(), MediaError> {
            if self.bound.is_none() {
                return Err(MediaError::PlayFailed("nothing bound".into()));
            }
            self.playing = true;
            Ok(())
        }

        fn pause(&mut self) {
            self.playing = false;
        }

        fn set_rate(&mut self, rate: f64) {
            self.rate = rate;
            if let Some(bound) = &self.bound {
                self.rate_log.push((bound.clone(), rate));
            }
        }

        fn position(&self) -> f64 {
            self.position
        }

        fn set_position(&mut self, secs: f64) {
            self.position = secs;
        }

        fn known_duration(&self) -> Option<f64> {
            self.bound.as_ref().and_then(|b| self.durations.get(b).copied())
        }
    }

    fn chunk(id: &str) -> AudioChunk {
        AudioChunk::from_locator(id, id)
    }

    fn run(engine: &mut PlaybackEngine<ScriptedSink>, secs: f64) {
        let events = engine.sink_mut().tick(secs);
        for event in events {
            engine.handle_event(event);
        }
    }

    fn engine_ab() -> PlaybackEngine<ScriptedSink> {
        PlaybackEngine::new(ScriptedSink::with_clips(&[("a", 10.0), ("b", 10.0), ("c", 4.0)]))
    }

    #[test]
    fn test_enqueue_starts_playback_when_idle() {
        let mut engine = engine_ab();
        assert_eq!(engine.state(), PlaybackState::Idle);

        engine.enqueue(chunk("a"));
        assert!(engine.is_playing());
        assert_eq!(engine.current_chunk().unwrap().id, "a");

        engine.enqueue(chunk("b"));
        assert_eq!(engine.current_chunk().unwrap().id, "a");
        assert_eq!(engine.pending_len(), 1);
    }

    #[test]
    fn test_cumulative_time_after_transition() {
        let mut engine = engine_ab();
        engine.enqueue(chunk("a"));
        engine.enqueue(chunk("b"));

        run(&mut engine, 10.0);
        assert_eq!(engine.current_chunk().unwrap().id, "b");
        assert_eq!(engine.played_chunks()[0].duration, Some(10.0));

        run(&mut engine, 3.0);
        assert!((engine.current_time() - 13.0).abs() < 1e-9);
        assert!((engine.total_duration() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_seek_into_played_chunk_requeues() {
        let mut engine = engine_ab();
        engine.enqueue(chunk("a"));
        engine.enqueue(chunk("b"));
        engine.enqueue(chunk("c"));
        run(&mut engine, 10.0);
        run(&mut engine, 2.0);
        assert_eq!(engine.current_chunk().unwrap().id, "b");

        engine.seek_to(5.0);

        assert_eq!(engine.current_chunk().unwrap().id, "a");
        assert!(engine.played_chunks().is_empty());
        assert_eq!(engine.pending_len(), 2);
        assert!((engine.sink().position() - 5.0).abs() < 1e-9);
        assert!((engine.current_time() - 5.0).abs() < 1e-9);
        assert!(engine.is_playing());

        // a → b → c 顺序保持不变
        run(&mut engine, 5.0);
        assert_eq!(engine.current_chunk().unwrap().id, "b");
        run(&mut engine, 10.0);
        assert_eq!(engine.current_chunk().unwrap().id, "c");
    }

    #[test]
    fn test_seek_within_current_chunk() {
        let mut engine = engine_ab();
        engine.enqueue(chunk("a"));
        engine.enqueue(chunk("b"));
        run(&mut engine, 10.0);
        run(&mut engine, 1.0);

        engine.seek_to(17.0);
        assert_eq!(engine.current_chunk().unwrap().id, "b");
        assert_eq!(engine.played_chunks().len(), 1);
        assert!((engine.sink().position() - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_seek_beyond_known_is_noop() {
        let mut engine = engine_ab();
        engine.enqueue(chunk("a"));
        engine.enqueue(chunk("b"));
        run(&mut engine, 4.0);

        engine.seek_to(15.0);
        assert_eq!(engine.current_chunk().unwrap().id, "a");
        assert!((engine.sink().position() - 4.0).abs() < 1e-9);
        assert_eq!(engine.pending_len(), 1);
    }

    #[test]
    fn test_failed_bind_skips_without_premature_drain() {
        let mut sink = ScriptedSink::with_clips(&[("a", 10.0), ("b", 10.0), ("c", 4.0)]);
        sink.broken.insert("a".to_string());
        let mut engine = PlaybackEngine::new(sink);

        let drained = Rc::new(RefCell::new(0));
        let counter = drained.clone();
        engine.set_on_queue_drained(move |_| *counter.borrow_mut() += 1);

        engine.enqueue(chunk("c"));
        engine.enqueue(chunk("a"));
        engine.enqueue(chunk("b"));
        run(&mut engine, 4.0);

        assert_eq!(engine.current_chunk().unwrap().id, "b");
        assert_eq!(engine.played_chunks().len(), 1);
        assert_eq!(*drained.borrow(), 0);

        // 单个失败片段耗尽队列时才回调
        engine.clear();
        engine.enqueue(chunk("a"));
        assert_eq!(*drained.borrow(), 1);
        assert_eq!(engine.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_error_event_skips_to_next() {
        let mut engine = engine_ab();
        engine.enqueue(chunk("a"));
        engine.enqueue(chunk("b"));
        run(&mut engine, 2.0);

        engine.handle_event(MediaEvent::Error("decode error".into()));
        assert_eq!(engine.current_chunk().unwrap().id, "b");
        assert!(engine.played_chunks().is_empty());
    }

    #[test]
    fn test_playback_rate_survives_transitions() {
        let mut engine = engine_ab();
        engine.set_playback_rate(1.5);
        engine.enqueue(chunk("a"));
        engine.enqueue(chunk("b"));

        run(&mut engine, 7.0);
        assert_eq!(engine.current_chunk().unwrap().id, "b");

        let log = &engine.sink().rate_log;
        assert!(log.contains(&("a".to_string(), 1.5)));
        assert!(log.contains(&("b".to_string(), 1.5)));
        assert_eq!(engine.sink().rate, 1.5);
    }

    #[test]
    fn test_invalid_rate_ignored() {
        let mut engine = engine_ab();
        engine.set_playback_rate(0.0);
        engine.set_playback_rate(f64::NAN);
        assert_eq!(engine.playback_rate(), 1.0);
    }

    #[test]
    fn test_pause_and_resume() {
        let mut engine = engine_ab();
        engine.pause();
        assert_eq!(engine.state(), PlaybackState::Idle);

        engine.enqueue(chunk("a"));
        run(&mut engine, 3.0);
        engine.pause();
        assert_eq!(engine.state(), PlaybackState::Paused);
        run(&mut engine, 5.0);
        assert!((engine.current_time() - 3.0).abs() < 1e-9);

        engine.set_playback_rate(2.0);
        engine.resume();
        assert!(engine.is_playing());
        run(&mut engine, 1.0);
        assert!((engine.current_time() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_drained_callback_can_refill() {
        let mut engine = engine_ab();
        let mut refills = vec![chunk("c")];
        engine.set_on_queue_drained(move |refill| {
            if let Some(next) = refills.pop() {
                refill.enqueue(next);
            }
        });

        engine.enqueue(chunk("a"));
        run(&mut engine, 10.0);
        assert_eq!(engine.current_chunk().unwrap().id, "c");

        run(&mut engine, 4.0);
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert!((engine.current_time() - 14.0).abs() < 1e-9);
    }

    #[test]
    fn test_progress_callback() {
        let mut engine = engine_ab();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        engine.set_on_progress(move |p| sink.borrow_mut().push(p));

        engine.enqueue(chunk("a"));
        engine.handle_event(MediaEvent::MetadataLoaded);
        run(&mut engine, 5.0);

        let last = *seen.borrow().last().unwrap();
        assert!((last.current_time - 5.0).abs() < 1e-9);
        assert!((last.duration - 10.0).abs() < 1e-9);
        assert!((last.percentage - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_unplayable_refills_are_bounded() {
        let mut sink = ScriptedSink::with_clips(&[]);
        sink.broken.insert("x".to_string());
        let mut engine = PlaybackEngine::new(sink);

        let calls = Rc::new(RefCell::new(0));
        let counter = calls.clone();
        engine.set_on_queue_drained(move |refill| {
            *counter.borrow_mut() += 1;
            refill.enqueue(chunk("x"));
        });

        engine.enqueue(chunk("x"));
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert_eq!(*calls.borrow(), MAX_REFILL_ROUNDS);
        assert_eq!(engine.pending_len(), 0);
    }

    #[test]
    fn test_total_duration_counts_declared_pending_durations() {
        let mut engine = engine_ab();
        engine.enqueue(chunk("a"));
        engine.enqueue(chunk("b").with_duration(6.0));
        engine.enqueue(chunk("c"));
        run(&mut engine, 2.0);

        assert!((engine.total_duration() - 16.0).abs() < 1e-9);
        assert!((engine.progress().percentage - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_progress_zero_when_empty() {
        let engine = engine_ab();
        assert_eq!(engine.progress(), Progress::default());
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut engine = engine_ab();
        engine.enqueue(chunk("a"));
        engine.enqueue(chunk("b"));
        run(&mut engine, 12.0);

        engine.clear();
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert!(engine.current_chunk().is_none());
        assert!(engine.played_chunks().is_empty());
        assert_eq!(engine.pending_len(), 0);
        assert_eq!(engine.current_time(), 0.0);
        assert_eq!(engine.sink().position(), 0.0);
    }
}
