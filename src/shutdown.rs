use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// 优雅关闭管理器
#[derive(Clone)]
pub struct ShutdownManager {
    /// 关闭信号发送器
    shutdown_tx: Arc<RwLock<Option<broadcast::Sender<()>>>>,
    /// 是否已经关闭
    is_shutdown: Arc<RwLock<bool>>,
    /// 等待后台循环退出的时长
    shutdown_timeout: Duration,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(shutdown_timeout: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);

        Self {
            shutdown_tx: Arc::new(RwLock::new(Some(shutdown_tx))),
            is_shutdown: Arc::new(RwLock::new(false)),
            shutdown_timeout,
        }
    }

    /// 订阅关闭信号
    pub async fn subscribe(&self) -> broadcast::Receiver<()> {
        let shutdown_tx = self.shutdown_tx.read().await;
        if let Some(ref tx) = *shutdown_tx {
            tx.subscribe()
        } else {
            // 已经关闭，返回一个立即触发的接收器
            let (tx, rx) = broadcast::channel(1);
            let _ = tx.send(());
            rx
        }
    }

    /// 触发关闭
    pub async fn shutdown(&self) {
        let mut is_shutdown = self.is_shutdown.write().await;
        if *is_shutdown {
            debug!("关闭管理器已经触发过关闭");
            return;
        }

        info!("触发系统关闭");
        *is_shutdown = true;

        let mut shutdown_tx = self.shutdown_tx.write().await;
        if let Some(tx) = shutdown_tx.take() {
            debug!("发送关闭信号给 {} 个订阅者", tx.receiver_count());
            // 没有订阅者时发送失败，忽略
            let _ = tx.send(());
        }

        info!("关闭信号已发送");
    }

    pub async fn is_shutdown(&self) -> bool {
        *self.is_shutdown.read().await
    }

    /// 触发关闭并等待后台循环退出
    ///
    /// 超时后放弃等待并返回 `false`。
    pub async fn graceful_shutdown(&self, handles: Vec<JoinHandle<()>>) -> bool {
        self.shutdown().await;

        info!(
            "等待 {} 个后台任务退出（超时: {:?}）",
            handles.len(),
            self.shutdown_timeout
        );
        match timeout(self.shutdown_timeout, join_all(handles)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        error!("后台任务异常退出: {e}");
                    }
                }
                info!("所有后台任务已退出");
                true
            }
            Err(_) => {
                warn!("等待后台任务退出超时（{:?}）", self.shutdown_timeout);
                false
            }
        }
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_manager_basic() {
        let manager = ShutdownManager::new();
        assert!(!manager.is_shutdown().await);

        let mut rx = manager.subscribe().await;
        manager.shutdown().await;

        let result = timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(result.is_ok());
        assert!(manager.is_shutdown().await);
    }

    #[tokio::test]
    async fn test_subscribe_after_shutdown_fires_immediately() {
        let manager = ShutdownManager::new();
        manager.shutdown().await;
        // 重复关闭不报错
        manager.shutdown().await;

        let mut rx = manager.subscribe().await;
        let result = timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_graceful_shutdown_waits_for_loops() {
        let manager = ShutdownManager::with_timeout(Duration::from_secs(1));
        let mut rx = manager.subscribe().await;
        let handle = tokio::spawn(async move {
            let _ = rx.recv().await;
            tokio::time::sleep(Duration::from_millis(20)).await;
        });

        assert!(manager.graceful_shutdown(vec![handle]).await);
    }

    #[tokio::test]
    async fn test_graceful_shutdown_times_out() {
        let manager = ShutdownManager::with_timeout(Duration::from_millis(50));
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        assert!(!manager.graceful_shutdown(vec![handle]).await);
    }
}
