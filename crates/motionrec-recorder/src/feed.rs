//! 캡처 워커.
//!
//! 블로킹 `FrameSource`를 `spawn_blocking` 스레드에서 돌리고 결과를
//! 유한 mpsc 채널로 넘긴다. 수신 측은 종료 신호와 프레임 대기 제한을
//! 함께 기다린다. 장치가 멈춰도 종료가 막히지 않는다.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use motionrec_core::error::CoreError;
use motionrec_core::models::frame::Frame;
use motionrec_core::ports::capture::FrameSource;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::RecorderError;

/// 수신 결과
#[derive(Debug)]
pub enum FeedItem {
    /// 정상 프레임
    Frame(Frame),
    /// 건너뛴 프레임 (비치명적 캡처 에러)
    Skipped(RecorderError),
    /// 종료 신호 수신
    Shutdown,
}

/// 캡처 스레드 + 프레임 채널
pub struct FrameFeed {
    rx: mpsc::Receiver<Result<Option<Frame>, CoreError>>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    frame_timeout: Duration,
}

impl FrameFeed {
    /// 캡처 스레드 시작 (tokio 런타임 안에서 호출)
    pub fn spawn<S>(source: S, capacity: usize, frame_timeout: Duration) -> Self
    where
        S: FrameSource + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = Arc::clone(&stop);

        let worker = tokio::task::spawn_blocking(move || {
            capture_loop(source, tx, worker_stop);
        });

        Self {
            rx,
            stop,
            worker: Some(worker),
            frame_timeout,
        }
    }

    /// 다음 프레임 대기
    ///
    /// 치명적 캡처 에러, 스트림 종료, 대기 시간 초과는 `Err`.
    pub async fn next(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<FeedItem, RecorderError> {
        loop {
            if *shutdown.borrow() {
                return Ok(FeedItem::Shutdown);
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        // 신호 송신 측이 사라지면 더 이상 기다릴 수 없음
                        debug!("종료 신호 채널 닫힘");
                        return Ok(FeedItem::Shutdown);
                    }
                }

                received = tokio::time::timeout(self.frame_timeout, self.rx.recv()) => {
                    return match received {
                        Err(_) => Err(RecorderError::FrameTimeout(self.frame_timeout)),
                        Ok(None) | Ok(Some(Ok(None))) => Err(RecorderError::EndOfStream),
                        Ok(Some(Ok(Some(frame)))) => Ok(FeedItem::Frame(frame)),
                        Ok(Some(Err(e))) => {
                            let err = RecorderError::from_capture(e);
                            if err.is_fatal() {
                                Err(err)
                            } else {
                                Ok(FeedItem::Skipped(err))
                            }
                        }
                    };
                }
            }
        }
    }

    /// 캡처 스레드 정지
    ///
    /// 장치가 응답하지 않으면 `grace` 이후 스레드를 버리고 반환한다.
    pub async fn close(mut self, grace: Duration) {
        self.stop.store(true, Ordering::Release);
        self.rx.close();
        if let Some(worker) = self.worker.take() {
            match tokio::time::timeout(grace, worker).await {
                Ok(Ok(())) => debug!("캡처 스레드 종료"),
                Ok(Err(e)) => warn!("캡처 스레드 비정상 종료: {e}"),
                Err(_) => warn!("캡처 스레드가 {:?} 안에 멈추지 않음", grace),
            }
        }
    }
}

impl Drop for FrameFeed {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

fn capture_loop<S: FrameSource>(
    mut source: S,
    tx: mpsc::Sender<Result<Option<Frame>, CoreError>>,
    stop: Arc<AtomicBool>,
) {
    info!("캡처 시작: {}", source.describe());
    let mut delivered: u64 = 0;

    while !stop.load(Ordering::Acquire) {
        let item = source.next_frame();
        let terminal = match &item {
            Ok(Some(_)) => false,
            Ok(None) => true,
            Err(CoreError::MalformedFrame { .. }) | Err(CoreError::Validation { .. }) => false,
            Err(_) => true,
        };
        if item.as_ref().is_ok_and(|f| f.is_some()) {
            delivered += 1;
        }
        if tx.blocking_send(item).is_err() {
            break;
        }
        if terminal {
            break;
        }
    }

    info!("캡처 종료: {}프레임 전달", delivered);
}

/// 블로킹 작업 실행 (파일 예약, 인코더 종료 대기)
///
/// 멀티 스레드 런타임에서는 `block_in_place`로 워커를 넘겨주고
/// current_thread 런타임이나 런타임 밖에서는 그대로 실행한다.
pub(crate) fn run_blocking<R>(f: impl FnOnce() -> R) -> R {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}
