//! 라이프사이클 관리.
//!
//! 종료 신호(SIGINT/SIGTERM, 실행 제한 시간)를 watch 채널 하나로 모은다.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

/// 라이프사이클 관리자
pub struct LifecycleManager {
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl LifecycleManager {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            shutdown_tx: tx,
            shutdown_rx: rx,
        }
    }

    /// 종료 수신기 복제
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// 종료 신호 발송 (여러 번 호출해도 무방)
    pub fn shutdown(&self) {
        if !*self.shutdown_rx.borrow() {
            info!("종료 신호 발송");
        }
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// OS 시그널 대기 (SIGINT, SIGTERM)
    pub async fn wait_for_signal(&self) {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match (
                signal(SignalKind::interrupt()),
                signal(SignalKind::terminate()),
            ) {
                (Ok(mut sigint), Ok(mut sigterm)) => {
                    tokio::select! {
                        _ = sigint.recv() => info!("SIGINT 수신"),
                        _ = sigterm.recv() => info!("SIGTERM 수신"),
                    }
                }
                _ => {
                    warn!("시그널 핸들러 등록 실패, Ctrl+C만 대기");
                    if tokio::signal::ctrl_c().await.is_err() {
                        return;
                    }
                }
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Ctrl+C 핸들러 등록 실패: {e}");
                return;
            }
            info!("Ctrl+C 수신");
        }

        self.shutdown();
    }

    /// `limit` 이후 종료 신호
    pub async fn wait_for_deadline(&self, limit: Duration) {
        tokio::time::sleep(limit).await;
        info!("실행 제한 시간 도달: {:?}", limit);
        self.shutdown();
    }

    /// 시그널 또는 제한 시간 중 먼저 오는 것까지 대기
    pub async fn wait(&self, limit: Option<Duration>) {
        match limit {
            Some(limit) => {
                tokio::select! {
                    _ = self.wait_for_signal() => {}
                    _ = self.wait_for_deadline(limit) => {}
                }
            }
            None => self.wait_for_signal().await,
        }
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}
