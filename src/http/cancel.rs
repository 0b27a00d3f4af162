use std::sync::Arc;
use tokio::sync::watch;

/// 协作式取消令牌
///
/// 克隆后共享同一状态；执行器在请求进行中等待 `cancelled()`，
/// 触发后丢弃正在进行的传输调用。
#[derive(Debug, Clone)]
pub struct CancelToken {
    state: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            state: Arc::new(tx),
        }
    }

    /// 请求取消，可重复调用
    pub fn cancel(&self) {
        self.state.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// 等待取消信号
    pub async fn cancelled(&self) {
        let mut rx = self.state.subscribe();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // 发送端由自身持有，不会提前关闭
            std::future::pending::<()>().await;
        }
    }
}
