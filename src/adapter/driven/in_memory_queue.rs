//! プロセス内で完結する注文キュー
//!
//! ブローカーを用意できない開発・テスト環境向け。送信側 [`InMemoryOrderPublisher`] と
//! 受信側 [`InMemoryOrderQueue`] は `tokio::sync::mpsc` で結ばれ、確認応答の状態は
//! [`DeliveryLedger`] が保持する。送信側がすべて破棄されるとキューは閉じる。

use crate::domain::port::{Acknowledger, Delivery, OrderPublisher, OrderQueue, QueueError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Notify};

/// キューのデフォルト容量
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

#[derive(Default)]
struct LedgerState {
    unsettled: HashMap<u64, Vec<u8>>,
    acked: u64,
    nacked: u64,
    requeued: VecDeque<Vec<u8>>,
}

/// 配信済みメッセージの確認応答台帳
///
/// 応答済みのメッセージは件数だけを数え、本文は保持しない
#[derive(Clone, Default)]
pub struct DeliveryLedger {
    state: Arc<Mutex<LedgerState>>,
    requeue_signal: Arc<Notify>,
}

impl DeliveryLedger {
    /// 確認応答された件数
    pub async fn acked_count(&self) -> u64 {
        self.state.lock().await.acked
    }

    /// 否定応答された件数
    pub async fn nacked_count(&self) -> u64 {
        self.state.lock().await.nacked
    }

    /// まだ応答されていないメッセージ数
    pub async fn unsettled(&self) -> usize {
        self.state.lock().await.unsettled.len()
    }

    async fn track(&self, delivery_tag: u64, body: Vec<u8>) {
        self.state.lock().await.unsettled.insert(delivery_tag, body);
    }

    async fn take_requeued(&self) -> Option<Vec<u8>> {
        self.state.lock().await.requeued.pop_front()
    }
}

#[async_trait]
impl Acknowledger for DeliveryLedger {
    async fn ack(&self, delivery_tag: u64) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        if state.unsettled.remove(&delivery_tag).is_none() {
            return Err(QueueError::AcknowledgementFailed {
                delivery_tag,
                reason: "unknown or already settled delivery tag".to_string(),
            });
        }
        state.acked += 1;
        Ok(())
    }

    async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        let Some(body) = state.unsettled.remove(&delivery_tag) else {
            return Err(QueueError::AcknowledgementFailed {
                delivery_tag,
                reason: "unknown or already settled delivery tag".to_string(),
            });
        };
        state.nacked += 1;
        if requeue {
            state.requeued.push_back(body);
            // 受信待ちの receive を起こす
            self.requeue_signal.notify_one();
        }
        Ok(())
    }
}

/// インメモリ注文キュー（送信側）
#[derive(Clone)]
pub struct InMemoryOrderPublisher {
    sender: mpsc::Sender<Vec<u8>>,
}

#[async_trait]
impl OrderPublisher for InMemoryOrderPublisher {
    async fn publish(&self, body: Vec<u8>) -> Result<(), QueueError> {
        self.sender
            .send(body)
            .await
            .map_err(|_| QueueError::PublishingFailed("order queue is closed".to_string()))
    }
}

/// インメモリ注文キュー（受信側）
///
/// 再配信対象に戻されたメッセージは新着より先に配信する
pub struct InMemoryOrderQueue {
    receiver: mpsc::Receiver<Vec<u8>>,
    ledger: DeliveryLedger,
    next_tag: u64,
}

impl InMemoryOrderQueue {
    /// デフォルト容量でキューを作成
    pub fn new() -> (InMemoryOrderPublisher, Self) {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// 容量を指定してキューを作成
    pub fn with_capacity(capacity: usize) -> (InMemoryOrderPublisher, Self) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let queue = Self {
            receiver,
            ledger: DeliveryLedger::default(),
            next_tag: 0,
        };
        (InMemoryOrderPublisher { sender }, queue)
    }

    /// 確認応答台帳を取得
    pub fn ledger(&self) -> DeliveryLedger {
        self.ledger.clone()
    }

    async fn deliver(&mut self, body: Vec<u8>) -> Delivery {
        self.next_tag += 1;
        self.ledger.track(self.next_tag, body.clone()).await;
        Delivery::new(self.next_tag, body, Arc::new(self.ledger.clone()))
    }
}

#[async_trait]
impl OrderQueue for InMemoryOrderQueue {
    async fn receive(&mut self) -> Result<Option<Delivery>, QueueError> {
        let requeue_signal = self.ledger.requeue_signal.clone();
        loop {
            if let Some(body) = self.ledger.take_requeued().await {
                return Ok(Some(self.deliver(body).await));
            }

            let received = tokio::select! {
                received = self.receiver.recv() => received,
                _ = requeue_signal.notified() => continue,
            };

            return match received {
                Some(body) => Ok(Some(self.deliver(body).await)),
                None => match self.ledger.take_requeued().await {
                    Some(body) => Ok(Some(self.deliver(body).await)),
                    None => Ok(None),
                },
            };
        }
    }
}
