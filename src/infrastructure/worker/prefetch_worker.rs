//! Prefetch Worker - 后台预读
//!
//! 从队列消费预读请求，提取页面文本并合成音频写入缓存；
//! semaphore 限制并发，进行中的相同请求被丢弃。
//! 与前台读取的协调由 `ReaderService` 的按页合成锁完成

use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

use crate::application::ports::CacheKey;
use crate::application::services::{PageContent, PrefetchOutcome, ReaderService};

/// Worker 配置
#[derive(Debug, Clone)]
pub struct PrefetchWorkerConfig {
    /// 最大并发合成数
    pub max_concurrent: usize,
}

impl Default for PrefetchWorkerConfig {
    fn default() -> Self {
        Self { max_concurrent: 2 }
    }
}

/// 预读请求
#[derive(Debug, Clone)]
pub struct PrefetchRequest {
    pub key: CacheKey,
    pub content: PageContent,
}

/// 预读结果统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefetchSummary {
    pub cached: usize,
    pub already_cached: usize,
    pub no_text: usize,
    pub failed: usize,
    pub duplicates: usize,
}

#[derive(Default)]
struct Counters {
    cached: AtomicUsize,
    already_cached: AtomicUsize,
    no_text: AtomicUsize,
    failed: AtomicUsize,
    duplicates: AtomicUsize,
}

impl Counters {
    fn record(&self, outcome: PrefetchOutcome) {
        let counter = match outcome {
            PrefetchOutcome::Cached => &self.cached,
            PrefetchOutcome::AlreadyCached => &self.already_cached,
            PrefetchOutcome::NoText => &self.no_text,
            PrefetchOutcome::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn summary(&self) -> PrefetchSummary {
        PrefetchSummary {
            cached: self.cached.load(Ordering::Relaxed),
            already_cached: self.already_cached.load(Ordering::Relaxed),
            no_text: self.no_text.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
        }
    }
}

/// 预读 Worker
pub struct PrefetchWorker {
    config: PrefetchWorkerConfig,
    queue_receiver: mpsc::Receiver<PrefetchRequest>,
    reader: Arc<ReaderService>,
    in_flight: Arc<DashMap<CacheKey, ()>>,
    counters: Arc<Counters>,
}

impl PrefetchWorker {
    pub fn new(
        config: PrefetchWorkerConfig,
        queue_receiver: mpsc::Receiver<PrefetchRequest>,
        reader: Arc<ReaderService>,
    ) -> Self {
        Self {
            config,
            queue_receiver,
            reader,
            in_flight: Arc::new(DashMap::new()),
            counters: Arc::new(Counters::default()),
        }
    }

    /// 运行直到发送端全部关闭，并等待进行中的任务完成
    pub async fn run(mut self) -> PrefetchSummary {
        let max_concurrent = self.config.max_concurrent.max(1);
        tracing::info!(max_concurrent, "PrefetchWorker started");

        let semaphore = Arc::new(Semaphore::new(max_concurrent));

        while let Some(request) = self.queue_receiver.recv().await {
            if self.in_flight.insert(request.key.clone(), ()).is_some() {
                tracing::debug!(key = %request.key, "Prefetch already in flight, dropping duplicate");
                self.counters.duplicates.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to acquire semaphore permit");
                    self.in_flight.remove(&request.key);
                    continue;
                }
            };

            let reader = self.reader.clone();
            let in_flight = self.in_flight.clone();
            let counters = self.counters.clone();

            tokio::spawn(async move {
                let _permit = permit;

                let outcome = reader.prefetch_page(&request.key, request.content).await;
                tracing::debug!(key = %request.key, outcome = ?outcome, "Prefetch finished");

                counters.record(outcome);
                in_flight.remove(&request.key);
            });
        }

        // 取回全部 permit，即所有任务已完成
        if let Err(e) = semaphore.acquire_many(max_concurrent as u32).await {
            tracing::error!(error = %e, "Failed to wait for prefetch tasks");
        }

        let summary = self.counters.summary();
        tracing::info!(summary = ?summary, "PrefetchWorker stopped");
        summary
    }
}
