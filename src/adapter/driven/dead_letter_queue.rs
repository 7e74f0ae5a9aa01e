use crate::domain::port::{DeadLetter, DeadLetterQueue, Logger, QueueError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

const COMPONENT: &str = "DeadLetterQueue";

/// デッドレターキューのデフォルト最大サイズ
pub const DEFAULT_DEAD_LETTER_MAX_SIZE: usize = 1000;

/// インメモリデッドレターキュー
/// 最大サイズを超えた場合は最も古いエントリを捨て、その件数を数える
#[derive(Clone)]
pub struct InMemoryDeadLetterQueue {
    entries: Arc<Mutex<VecDeque<DeadLetter>>>,
    max_size: usize,
    evicted: Arc<AtomicU64>,
    logger: Option<Arc<dyn Logger>>,
}

impl InMemoryDeadLetterQueue {
    /// 最大サイズを指定して作成
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::new())),
            max_size,
            evicted: Arc::new(AtomicU64::new(0)),
            logger: None,
        }
    }

    /// 古いエントリを捨てたときに警告を出すロガーを設定
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// 上限に達して捨てられたエントリ数
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    /// 保管されているエントリを古い順に取得
    pub async fn entries(&self) -> Vec<DeadLetter> {
        self.entries.lock().await.iter().cloned().collect()
    }

    /// 保管されているエントリ数
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// エントリが無いか
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

impl Default for InMemoryDeadLetterQueue {
    fn default() -> Self {
        Self::new(DEFAULT_DEAD_LETTER_MAX_SIZE)
    }
}

#[async_trait]
impl DeadLetterQueue for InMemoryDeadLetterQueue {
    async fn push(&self, letter: DeadLetter) -> Result<(), QueueError> {
        if self.max_size == 0 {
            return Err(QueueError::DeadLetterRejected {
                delivery_tag: letter.delivery_tag,
                reason: "dead-letter queue has zero capacity".to_string(),
            });
        }

        let mut entries = self.entries.lock().await;
        if entries.len() >= self.max_size {
            if let Some(oldest) = entries.pop_front() {
                let total = self.evicted.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(logger) = &self.logger {
                    logger.warn(
                        COMPONENT,
                        "Dead-letter queue full, oldest entry evicted",
                        Some(oldest.correlation_id),
                        Some(HashMap::from([
                            ("delivery_tag".to_string(), oldest.delivery_tag.to_string()),
                            ("reason".to_string(), oldest.reason),
                            ("evicted_total".to_string(), total.to_string()),
                        ])),
                    );
                }
            }
        }
        entries.push_back(letter);
        Ok(())
    }
}
