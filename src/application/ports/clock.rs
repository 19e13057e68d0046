//! Clock Port - 时间源抽象
//!
//! 缓存过期与文档库排序都依赖当前时间，测试时注入手动时钟

/// 时间源
pub trait Clock: Send + Sync {
    /// 当前 Unix 时间（毫秒）
    fn now_millis(&self) -> i64;
}
