//! 녹화 이벤트 버스.
//!
//! `tokio::broadcast` 기반. 세션 열기/닫기, 비치명적 장애, 스틸 이미지 저장을
//! 구독자(CLI 출력, 테스트)에게 전달한다.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use motionrec_core::models::session::SessionRecord;
use tokio::sync::broadcast;
use tracing::debug;

/// 녹화 이벤트
#[derive(Debug, Clone)]
pub enum RecorderEvent {
    /// 세션 시작
    SessionOpened {
        id: String,
        path: PathBuf,
        at: DateTime<Utc>,
    },
    /// 세션 종료
    SessionClosed(SessionRecord),
    /// 비치명적 장애 (세션 열기 실패, 인코더 장애, 잘못된 프레임)
    Fault { message: String },
    /// 스틸 이미지 저장
    StillSaved { path: PathBuf },
    /// 파이프라인 종료
    Stopped { reason: String },
}

/// 이벤트 버스 (복제 가능, 송신측 공유)
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RecorderEvent>,
}

impl EventBus {
    /// 새 이벤트 버스 생성
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// 이벤트 발행 (구독자가 없으면 버림)
    pub fn publish(&self, event: RecorderEvent) {
        debug!("이벤트 발행: {:?}", std::mem::discriminant(&event));
        let _ = self.tx.send(event);
    }

    /// 구독자 생성
    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(128)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(RecorderEvent::Fault {
            message: "disk full".to_string(),
        });

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, RecorderEvent::Fault { message } if message == "disk full"));
    }

    #[test]
    fn publish_without_subscribers() {
        let bus = EventBus::default();
        bus.publish(RecorderEvent::Stopped {
            reason: "test".to_string(),
        });
    }

    #[tokio::test]
    async fn clones_share_channel() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        let clone = bus.clone();
        clone.publish(RecorderEvent::StillSaved {
            path: PathBuf::from("a.jpg"),
        });
        assert!(matches!(
            rx.recv().await.unwrap(),
            RecorderEvent::StillSaved { .. }
        ));
    }
}
