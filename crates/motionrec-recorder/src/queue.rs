//! 가장 오래된 항목을 버리는 유한 큐.
//!
//! crossbeam bounded 채널 기반. 가득 차면 생산자를 막지 않고
//! 가장 오래된 항목을 꺼내 버린 뒤 새 항목을 넣는다.
//! 소비자 하나가 FIFO 순서로 받는다.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use std::time::Duration;

/// 생산자가 모두 사라지고 큐가 비었음
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueClosed;

/// 생산자 측
pub struct DropOldestSender<T> {
    tx: Sender<T>,
    /// 가득 찼을 때 가장 오래된 항목을 꺼내기 위한 수신 핸들
    evict: Receiver<T>,
}

/// 소비자 측
pub struct DropOldestReceiver<T> {
    rx: Receiver<T>,
}

/// 깊이 `depth`(최소 1)의 drop-oldest 큐 생성
pub fn drop_oldest<T>(depth: usize) -> (DropOldestSender<T>, DropOldestReceiver<T>) {
    let (tx, rx) = channel::bounded(depth.max(1));
    (
        DropOldestSender {
            tx,
            evict: rx.clone(),
        },
        DropOldestReceiver { rx },
    )
}

impl<T> DropOldestSender<T> {
    /// 항목 추가. 공간을 만들기 위해 버린 항목이 있으면 반환한다.
    ///
    /// 생산자가 수신 핸들을 함께 쥐고 있으므로 채널은 끊기지 않는다.
    pub fn push(&self, item: T) -> Option<T> {
        let mut item = item;
        let mut evicted = None;
        loop {
            match self.tx.try_send(item) {
                Ok(()) => return evicted,
                Err(TrySendError::Full(back)) => {
                    item = back;
                    // 소비자가 먼저 가져갔으면 다시 시도
                    if let Ok(old) = self.evict.try_recv() {
                        evicted = Some(old);
                    }
                }
                Err(TrySendError::Disconnected(back)) => return Some(back),
            }
        }
    }

    /// 대기 중인 항목 수
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(1)
    }
}

impl<T> DropOldestReceiver<T> {
    /// 다음 항목 대기. 생산자가 사라지고 큐가 비면 None.
    pub fn recv(&self) -> Option<T> {
        self.rx.recv().ok()
    }

    /// 제한 시간 동안 대기
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<T>, QueueClosed> {
        match self.rx.recv_timeout(timeout) {
            Ok(item) => Ok(Some(item)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(QueueClosed),
        }
    }

    /// 대기 없이 꺼내기
    pub fn try_recv(&self) -> Result<Option<T>, QueueClosed> {
        match self.rx.try_recv() {
            Ok(item) => Ok(Some(item)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(QueueClosed),
        }
    }
}
