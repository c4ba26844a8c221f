//! 连接出站端
//!
//! 由传输层持有并写回 socket。先按 FIFO 取出队列中的消息，
//! 队列排空后再取最新快照槽中暂存的快照。

use api_contract::ServerMessage;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{Notify, mpsc};

/// 单连接的最新快照槽（只保留最后一份）。
#[derive(Default)]
pub(crate) struct SnapshotSlot {
    latest: Mutex<Option<ServerMessage>>,
    ready: Notify,
}

impl SnapshotSlot {
    pub(crate) fn lock(&self) -> MutexGuard<'_, Option<ServerMessage>> {
        self.latest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn notify(&self) {
        self.ready.notify_one();
    }

    fn take(&self) -> Option<ServerMessage> {
        self.lock().take()
    }
}

/// 连接的出站接收端。
pub struct Outbound {
    receiver: mpsc::Receiver<ServerMessage>,
    snapshot: Arc<SnapshotSlot>,
}

impl Outbound {
    pub(crate) fn new(
        receiver: mpsc::Receiver<ServerMessage>,
        snapshot: Arc<SnapshotSlot>,
    ) -> Self {
        Self { receiver, snapshot }
    }

    /// 等待下一条出站消息；连接关闭后返回 `None`。
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        loop {
            match self.receiver.try_recv() {
                Ok(message) => return Some(message),
                Err(TryRecvError::Disconnected) => return None,
                Err(TryRecvError::Empty) => {}
            }
            if let Some(snapshot) = self.snapshot.take() {
                return Some(snapshot);
            }
            tokio::select! {
                message = self.receiver.recv() => return message,
                _ = self.snapshot.ready.notified() => {}
            }
        }
    }

    /// 非阻塞取出下一条出站消息。
    pub fn try_recv(&mut self) -> Result<ServerMessage, TryRecvError> {
        match self.receiver.try_recv() {
            Err(TryRecvError::Empty) => self.snapshot.take().ok_or(TryRecvError::Empty),
            other => other,
        }
    }
}
