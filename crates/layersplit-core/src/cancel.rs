//! 取消标记

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 可跨线程共享的取消标记，导出器在每个图层开始前检查
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
