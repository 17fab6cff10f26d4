//! 테스트용 메모리 싱크.
//!
//! 인코딩 없이 기록된 프레임 순번과 닫기 호출을 보관한다.
//! `test-util` 기능으로 다른 crate 테스트에서도 사용한다.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use motionrec_core::error::CoreError;
use motionrec_core::models::frame::Frame;
use motionrec_core::ports::sink::{SinkSpec, VideoSink, VideoSinkFactory};
use parking_lot::Mutex;

/// 싱크 하나의 기록
#[derive(Debug, Clone, Default)]
pub struct SinkLog {
    pub path: PathBuf,
    /// 기록된 프레임 순번
    pub sequences: Vec<u64>,
    /// 닫힘 여부
    pub closed: bool,
    /// `close` 호출 횟수 (멱등 호출 포함)
    pub close_calls: u32,
}

/// 메모리 싱크 생성기 (복제본은 기록을 공유)
#[derive(Clone, Default)]
pub struct MemorySinkFactory {
    logs: Arc<Mutex<Vec<SinkLog>>>,
    fail_open: bool,
    fail_after: Option<u64>,
    write_delay: Option<Duration>,
    close_delay: Option<Duration>,
}

impl MemorySinkFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 모든 열기 요청 실패
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// `n`프레임 기록 후 쓰기 실패
    pub fn failing_after(mut self, n: u64) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// 쓰기마다 지연 (느린 인코더 흉내)
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// 닫기마다 지연 (인코더 마무리 대기 흉내)
    pub fn with_close_delay(mut self, delay: Duration) -> Self {
        self.close_delay = Some(delay);
        self
    }

    /// 열린 싱크 수
    pub fn opened(&self) -> usize {
        self.logs.lock().len()
    }

    /// `index`번째로 열린 싱크 기록
    pub fn log(&self, index: usize) -> Option<SinkLog> {
        self.logs.lock().get(index).cloned()
    }

    /// 전체 기록
    pub fn logs(&self) -> Vec<SinkLog> {
        self.logs.lock().clone()
    }
}

impl VideoSinkFactory for MemorySinkFactory {
    fn open(&self, path: &Path, spec: &SinkSpec) -> Result<Box<dyn VideoSink>, CoreError> {
        if self.fail_open {
            return Err(CoreError::Encoder(format!(
                "메모리 싱크 열기 거부: {}",
                path.display()
            )));
        }
        let index = {
            let mut logs = self.logs.lock();
            logs.push(SinkLog {
                path: path.to_path_buf(),
                ..SinkLog::default()
            });
            logs.len() - 1
        };
        Ok(Box::new(MemorySink {
            logs: Arc::clone(&self.logs),
            index,
            spec: *spec,
            written: 0,
            closed: false,
            fail_after: self.fail_after,
            write_delay: self.write_delay,
            close_delay: self.close_delay,
        }))
    }
}

/// 메모리 싱크
pub struct MemorySink {
    logs: Arc<Mutex<Vec<SinkLog>>>,
    index: usize,
    spec: SinkSpec,
    written: u64,
    closed: bool,
    fail_after: Option<u64>,
    write_delay: Option<Duration>,
    close_delay: Option<Duration>,
}

impl VideoSink for MemorySink {
    fn write(&mut self, frame: &Frame) -> Result<(), CoreError> {
        if self.closed {
            return Err(CoreError::SinkClosed);
        }
        if frame.resolution() != self.spec.resolution {
            return Err(CoreError::MalformedFrame {
                expected: self.spec.resolution,
                actual: frame.resolution(),
            });
        }
        if let Some(delay) = self.write_delay {
            std::thread::sleep(delay);
        }
        if self.fail_after.is_some_and(|n| self.written >= n) {
            return Err(CoreError::Encoder("메모리 싱크 쓰기 실패".to_string()));
        }
        self.written += 1;
        if let Some(log) = self.logs.lock().get_mut(self.index) {
            log.sequences.push(frame.sequence());
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), CoreError> {
        if let (false, Some(delay)) = (self.closed, self.close_delay) {
            std::thread::sleep(delay);
        }
        let mut logs = self.logs.lock();
        if let Some(log) = logs.get_mut(self.index) {
            log.close_calls += 1;
            log.closed = true;
        }
        self.closed = true;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.written
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
