//! 워커 스레드 인코딩 싱크.
//!
//! 실제 싱크를 전용 스레드로 옮기고, 캡처 쪽은 drop-oldest 큐에 프레임을
//! 넣기만 한다. 인코더가 느리면 가장 오래된 미인코딩 프레임이 버려지고
//! 캡처는 막히지 않는다.
//!
//! 워커의 쓰기 실패는 고정되어 이후 모든 `write`와 `close`에서 보고된다.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use motionrec_core::error::CoreError;
use motionrec_core::models::frame::{Frame, Resolution};
use motionrec_core::ports::sink::{SinkSpec, VideoSink, VideoSinkFactory};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::queue::{drop_oldest, DropOldestReceiver, DropOldestSender};

/// 워커와 공유하는 상태
#[derive(Default)]
struct Shared {
    written: AtomicU64,
    fault: Mutex<Option<String>>,
}

/// 큐 + 워커 스레드 데코레이터
pub struct QueuedSink {
    sender: Option<DropOldestSender<Frame>>,
    worker: Option<JoinHandle<Result<(), CoreError>>>,
    shared: Arc<Shared>,
    resolution: Resolution,
    dropped: u64,
    closed: bool,
}

impl QueuedSink {
    /// `inner`를 워커 스레드로 옮겨 감싼다
    pub fn spawn(
        inner: Box<dyn VideoSink>,
        resolution: Resolution,
        depth: usize,
    ) -> Result<Self, CoreError> {
        let (sender, receiver) = drop_oldest(depth);
        let shared = Arc::new(Shared::default());
        let worker_shared = Arc::clone(&shared);

        let worker = std::thread::Builder::new()
            .name("motionrec-encoder".to_string())
            .spawn(move || encode_loop(inner, receiver, worker_shared))
            .map_err(|e| CoreError::Internal(format!("인코더 워커 생성 실패: {e}")))?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            shared,
            resolution,
            dropped: 0,
            closed: false,
        })
    }

    fn current_fault(&self) -> Option<String> {
        self.shared.fault.lock().clone()
    }
}

fn encode_loop(
    mut inner: Box<dyn VideoSink>,
    receiver: DropOldestReceiver<Frame>,
    shared: Arc<Shared>,
) -> Result<(), CoreError> {
    let mut failed = false;
    while let Some(frame) = receiver.recv() {
        if failed {
            // 장애 이후 프레임은 버림 (close까지 큐만 비운다)
            continue;
        }
        match inner.write(&frame) {
            Ok(()) => {
                shared
                    .written
                    .store(inner.frames_written(), Ordering::Release);
            }
            Err(e) => {
                warn!("인코더 워커 쓰기 실패 (seq={}): {e}", frame.sequence());
                *shared.fault.lock() = Some(e.to_string());
                failed = true;
            }
        }
    }
    debug!("인코더 워커 큐 종료, 싱크 닫는 중");
    let result = inner.close();
    shared
        .written
        .store(inner.frames_written(), Ordering::Release);
    result
}

impl VideoSink for QueuedSink {
    fn write(&mut self, frame: &Frame) -> Result<(), CoreError> {
        if self.closed {
            return Err(CoreError::SinkClosed);
        }
        if frame.resolution() != self.resolution {
            return Err(CoreError::MalformedFrame {
                expected: self.resolution,
                actual: frame.resolution(),
            });
        }
        if let Some(fault) = self.current_fault() {
            return Err(CoreError::Encoder(fault));
        }

        let sender = self.sender.as_ref().ok_or(CoreError::SinkClosed)?;
        if let Some(old) = sender.push(frame.clone()) {
            self.dropped += 1;
            warn!(
                "인코더 지연: 프레임 버림 (seq={}, 누적 {})",
                old.sequence(),
                self.dropped
            );
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), CoreError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // 송신측을 닫으면 워커가 남은 프레임을 비우고 내부 싱크를 닫는다
        drop(self.sender.take());

        let close_result = match self.worker.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| CoreError::Encoder("인코더 워커 패닉".to_string()))
                .and_then(|r| r),
            None => Ok(()),
        };

        match self.current_fault() {
            Some(fault) => Err(CoreError::Encoder(fault)),
            None => close_result,
        }
    }

    fn frames_written(&self) -> u64 {
        self.shared.written.load(Ordering::Acquire)
    }

    fn frames_dropped(&self) -> u64 {
        self.dropped
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for QueuedSink {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.close() {
                warn!("큐 싱크 drop 중 종료 실패: {e}");
            }
        }
    }
}

/// 열린 싱크마다 워커 스레드를 붙이는 팩토리
pub struct QueuedSinkFactory {
    inner: Arc<dyn VideoSinkFactory>,
    depth: usize,
}

impl QueuedSinkFactory {
    pub fn new(inner: Arc<dyn VideoSinkFactory>, depth: usize) -> Self {
        Self { inner, depth }
    }
}

impl VideoSinkFactory for QueuedSinkFactory {
    fn open(&self, path: &Path, spec: &SinkSpec) -> Result<Box<dyn VideoSink>, CoreError> {
        let inner = self.inner.open(path, spec)?;
        let sink = QueuedSink::spawn(inner, spec.resolution, self.depth)?;
        Ok(Box::new(sink))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemorySinkFactory;
    use assert_matches::assert_matches;
    use chrono::Utc;
    use motionrec_core::models::codec::VideoCodec;

    const RES: Resolution = Resolution::new(4, 4);

    fn spec() -> SinkSpec {
        SinkSpec {
            resolution: RES,
            fps: 20.0,
            codec: VideoCodec::Xvid,
        }
    }

    fn frame(seq: u64) -> Frame {
        Frame::filled(RES, Utc::now(), seq, [seq as u8, 0, 0])
    }

    #[test]
    fn frames_arrive_in_order_and_counts_add_up() {
        let memory = MemorySinkFactory::new();
        let factory = QueuedSinkFactory::new(Arc::new(memory.clone()), 2);
        let mut sink = factory.open(Path::new("a.avi"), &spec()).unwrap();

        for seq in 0..200 {
            sink.write(&frame(seq)).unwrap();
        }
        sink.close().unwrap();

        let log = memory.log(0).unwrap();
        assert!(log.closed);
        assert!(log.sequences.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(log.sequences.len() as u64, sink.frames_written());
        assert_eq!(sink.frames_written() + sink.frames_dropped(), 200);
        // 마지막 프레임은 항상 큐에 남아 기록됨
        assert_eq!(log.sequences.last(), Some(&199));
    }

    #[test]
    fn slow_encoder_drops_oldest() {
        let memory =
            MemorySinkFactory::new().with_write_delay(std::time::Duration::from_millis(20));
        let inner = memory.open(Path::new("slow.avi"), &spec()).unwrap();
        let mut sink = QueuedSink::spawn(inner, RES, 1).unwrap();

        for seq in 0..20 {
            sink.write(&frame(seq)).unwrap();
        }
        sink.close().unwrap();

        assert!(sink.frames_dropped() > 0);
        assert_eq!(sink.frames_written() + sink.frames_dropped(), 20);
    }

    #[test]
    fn close_is_idempotent_and_write_after_close_fails() {
        let memory = MemorySinkFactory::new();
        let mut sink = QueuedSinkFactory::new(Arc::new(memory.clone()), 2)
            .open(Path::new("b.avi"), &spec())
            .unwrap();
        sink.close().unwrap();
        sink.close().unwrap();
        assert_matches!(sink.write(&frame(0)), Err(CoreError::SinkClosed));
        assert_eq!(memory.log(0).unwrap().close_calls, 1);
    }

    #[test]
    fn worker_fault_surfaces_on_close() {
        let memory = MemorySinkFactory::new().failing_after(1);
        let mut sink = QueuedSinkFactory::new(Arc::new(memory.clone()), 2)
            .open(Path::new("c.avi"), &spec())
            .unwrap();

        for seq in 0..3 {
            // 워커가 아직 실패하지 않았으면 Ok, 실패했으면 Encoder
            let _ = sink.write(&frame(seq));
        }
        // 큐 깊이 2 → 최소 두 프레임이 내부 싱크에 도달해 두 번째에서 실패
        assert_matches!(sink.close(), Err(CoreError::Encoder(_)));
        assert_matches!(sink.write(&frame(9)), Err(CoreError::SinkClosed));
        assert!(memory.log(0).unwrap().closed);
    }

    #[test]
    fn resolution_mismatch_rejected_before_queue() {
        let memory = MemorySinkFactory::new();
        let mut sink = QueuedSinkFactory::new(Arc::new(memory), 2)
            .open(Path::new("d.avi"), &spec())
            .unwrap();
        let wrong = Frame::filled(Resolution::new(2, 2), Utc::now(), 0, [0, 0, 0]);
        assert_matches!(sink.write(&wrong), Err(CoreError::MalformedFrame { .. }));
        sink.close().unwrap();
    }

    #[test]
    fn drop_closes_inner_sink() {
        let memory = MemorySinkFactory::new();
        {
            let mut sink = QueuedSinkFactory::new(Arc::new(memory.clone()), 2)
                .open(Path::new("e.avi"), &spec())
                .unwrap();
            sink.write(&frame(0)).unwrap();
        }
        let log = memory.log(0).unwrap();
        assert!(log.closed);
        assert_eq!(log.sequences, vec![0]);
    }
}
