//! Cache Sweeper - 定期清理过期缓存

use std::time::Duration;
use tokio::sync::watch;

use crate::application::services::TtsCache;

/// 缓存清理任务
pub struct CacheSweeper {
    cache: TtsCache,
    interval: Duration,
}

impl CacheSweeper {
    pub fn new(cache: TtsCache, interval: Duration) -> Self {
        Self { cache, interval }
    }

    /// 按间隔清理，直到收到关闭信号；返回累计删除数
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> usize {
        tracing::info!(interval_secs = self.interval.as_secs(), "CacheSweeper started");

        let mut ticker = tokio::time::interval(self.interval);
        let mut total = 0;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.cache.sweep_expired().await;
                    if removed > 0 {
                        tracing::info!(removed, "Expired cache entries swept");
                    }
                    total += removed;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(total_removed = total, "CacheSweeper stopped");
        total
    }
}
