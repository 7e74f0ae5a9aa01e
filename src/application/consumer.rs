use crate::domain::error::DomainError;
use crate::domain::message::OrderMessage;
use crate::domain::port::{DeadLetter, DeadLetterQueue, Delivery, Logger, OrderQueue, QueueError};
use crate::domain::service::{OrderValidator, StockReservationEngine, ValidationOutcome};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use uuid::Uuid;

const COMPONENT: &str = "OrderConsumer";

/// 確認応答のタイミング
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckMode {
    /// 予約結果が確定してから確認応答する。失敗はデッドレターに送ってから確認応答する
    #[default]
    AfterOutcome,
    /// 受信した時点で確認応答する（処理中に停止したメッセージは失われる）
    OnReceipt,
}

impl AckMode {
    /// 文字列から確認応答モードを作成
    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "after_outcome" => Ok(AckMode::AfterOutcome),
            "on_receipt" => Ok(AckMode::OnReceipt),
            _ => Err(DomainError::InvalidValue(format!(
                "サポートされていない確認応答モード: {}",
                s
            ))),
        }
    }
}

/// コンシューマー設定
#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    /// 1件処理するごとの待機時間
    pub pacing: Duration,
    /// 同時に実行できる予約タスクの上限
    pub max_in_flight: usize,
    /// 確認応答のタイミング
    pub ack_mode: AckMode,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            pacing: Duration::from_secs(1),
            max_in_flight: 32,
            ack_mode: AckMode::default(),
        }
    }
}

/// コンシューマーの致命的エラー
#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    #[error("Queue failure: {0}")]
    Queue(#[from] QueueError),

    #[error("In-flight tracking closed: {0}")]
    InFlightClosed(String),
}

/// 1件のメッセージをどう扱ったか
#[derive(Debug, Clone, PartialEq)]
pub enum MessageDisposition {
    /// JSONとして解釈できず破棄した
    Malformed,
    /// ユーザー検証に失敗して破棄した
    Rejected(ValidationOutcome),
    /// 在庫予約タスクを起動した
    Dispatched,
}

/// 注文キューのコンシューマー
///
/// キューから1件ずつ受信し、ユーザーを同期的に検証したうえで在庫予約を
/// 切り離したタスクとして起動する。同時に走る予約タスクは `max_in_flight` 件まで
pub struct OrderConsumer<Q: OrderQueue> {
    queue: Q,
    validator: Arc<OrderValidator>,
    engine: Arc<StockReservationEngine>,
    dead_letters: Arc<dyn DeadLetterQueue>,
    logger: Arc<dyn Logger>,
    settings: ConsumerSettings,
    in_flight: Arc<Semaphore>,
}

impl<Q: OrderQueue> OrderConsumer<Q> {
    /// 新しいコンシューマーを作成
    ///
    /// # Arguments
    /// * `queue` - 受信元のキュー
    /// * `validator` - ユーザー検証
    /// * `engine` - 在庫予約エンジン
    /// * `dead_letters` - 予約に失敗したメッセージの送り先
    /// * `logger` - ロガー
    /// * `settings` - ペース配分・同時実行数・確認応答モード
    pub fn new(
        queue: Q,
        validator: Arc<OrderValidator>,
        engine: Arc<StockReservationEngine>,
        dead_letters: Arc<dyn DeadLetterQueue>,
        logger: Arc<dyn Logger>,
        settings: ConsumerSettings,
    ) -> Self {
        let settings = ConsumerSettings {
            max_in_flight: settings.max_in_flight.max(1),
            ..settings
        };
        Self {
            queue,
            validator,
            engine,
            dead_letters,
            logger,
            in_flight: Arc::new(Semaphore::new(settings.max_in_flight)),
            settings,
        }
    }

    /// 設定を取得
    pub fn settings(&self) -> &ConsumerSettings {
        &self.settings
    }

    /// キューが閉じられるまでメッセージを処理する
    ///
    /// キューが閉じられた場合は実行中の予約タスクの完了を待ち、その間に再配信対象へ
    /// 戻されたメッセージも処理し終えてから `Ok(())` を返す。
    /// ブローカーのエラーは致命的として `Err` を返す
    pub async fn run(mut self) -> Result<(), ConsumerError> {
        self.logger.info(
            COMPONENT,
            "Waiting for order messages",
            None,
            Some(HashMap::from([
                (
                    "max_in_flight".to_string(),
                    self.settings.max_in_flight.to_string(),
                ),
                (
                    "ack_mode".to_string(),
                    format!("{:?}", self.settings.ack_mode),
                ),
                (
                    "reservation_mode".to_string(),
                    format!("{:?}", self.engine.mode()),
                ),
            ])),
        );

        // 前回の排出以降に1件も受信していなければ、再配信待ちのメッセージも残っていない
        let mut drained = false;
        loop {
            match self.queue.receive().await {
                Ok(Some(delivery)) => {
                    drained = false;
                    self.handle_delivery(delivery).await?;
                    if !self.settings.pacing.is_zero() {
                        tokio::time::sleep(self.settings.pacing).await;
                    }
                }
                Ok(None) if drained => return Ok(()),
                Ok(None) => {
                    self.logger
                        .info(COMPONENT, "Order queue closed, draining", None, None);
                    // 排出中の否定応答で戻されたメッセージを拾うため、もう一度受信する
                    self.wait_for_in_flight().await?;
                    drained = true;
                }
                Err(e) => {
                    self.logger.error(
                        COMPONENT,
                        &format!("Order queue failed: {}", e),
                        None,
                        None,
                    );
                    self.wait_for_in_flight().await?;
                    return Err(ConsumerError::Queue(e));
                }
            }
        }
    }

    /// 1件のメッセージを処理する
    ///
    /// 検証を通過したメッセージは予約タスクとして起動され、その完了は待たない
    pub async fn handle_delivery(
        &self,
        delivery: Delivery,
    ) -> Result<MessageDisposition, ConsumerError> {
        let correlation_id = Uuid::new_v4();

        if self.settings.ack_mode == AckMode::OnReceipt {
            settle_ack(&delivery, self.logger.as_ref(), correlation_id).await;
        }

        let message = match OrderMessage::from_slice(&delivery.body) {
            Ok(message) => message,
            Err(e) => {
                self.logger.warn(
                    COMPONENT,
                    &format!("Malformed order message dropped: {}", e),
                    Some(correlation_id),
                    Some(HashMap::from([(
                        "delivery_tag".to_string(),
                        delivery.delivery_tag.to_string(),
                    )])),
                );
                self.drop_delivery(&delivery, correlation_id).await;
                return Ok(MessageDisposition::Malformed);
            }
        };

        let validation = self.validator.check(&message.user_id).await;
        if !validation.is_valid() {
            self.logger.warn(
                COMPONENT,
                "Order dropped: user validation failed",
                Some(correlation_id),
                Some(HashMap::from([
                    ("user_id".to_string(), message.user_id.clone()),
                    ("reason".to_string(), validation.label().to_string()),
                ])),
            );
            self.drop_delivery(&delivery, correlation_id).await;
            return Ok(MessageDisposition::Rejected(validation));
        }

        let permit = self
            .in_flight
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| ConsumerError::InFlightClosed(e.to_string()))?;

        let task = ReservationTask {
            delivery,
            message,
            correlation_id,
            engine: self.engine.clone(),
            dead_letters: self.dead_letters.clone(),
            logger: self.logger.clone(),
            ack_mode: self.settings.ack_mode,
        };
        tokio::spawn(task.run(permit));

        Ok(MessageDisposition::Dispatched)
    }

    /// 実行中の予約タスクがすべて完了するまで待つ
    pub async fn wait_for_in_flight(&self) -> Result<(), ConsumerError> {
        let all = u32::try_from(self.settings.max_in_flight).unwrap_or(u32::MAX);
        let _permits = self
            .in_flight
            .acquire_many(all)
            .await
            .map_err(|e| ConsumerError::InFlightClosed(e.to_string()))?;
        Ok(())
    }

    // 検証で落としたメッセージはデッドレターに送らず、そのまま確認応答する
    async fn drop_delivery(&self, delivery: &Delivery, correlation_id: Uuid) {
        if self.settings.ack_mode == AckMode::AfterOutcome {
            settle_ack(delivery, self.logger.as_ref(), correlation_id).await;
        }
    }
}

/// 切り離して実行される在庫予約
struct ReservationTask {
    delivery: Delivery,
    message: OrderMessage,
    correlation_id: Uuid,
    engine: Arc<StockReservationEngine>,
    dead_letters: Arc<dyn DeadLetterQueue>,
    logger: Arc<dyn Logger>,
    ack_mode: AckMode,
}

impl ReservationTask {
    async fn run(self, _permit: OwnedSemaphorePermit) {
        let outcome = self
            .engine
            .reserve(&self.message.product_id, self.message.quantity)
            .await;

        let context = HashMap::from([
            ("product_id".to_string(), self.message.product_id.clone()),
            ("quantity".to_string(), self.message.quantity.to_string()),
            ("user_id".to_string(), self.message.user_id.clone()),
            ("outcome".to_string(), outcome.label().to_string()),
        ]);

        if outcome.is_reserved() {
            self.logger.info(
                COMPONENT,
                "Stock reserved",
                Some(self.correlation_id),
                Some(context),
            );
        } else {
            self.logger.warn(
                COMPONENT,
                &format!("Stock reservation failed: {}", outcome),
                Some(self.correlation_id),
                Some(context),
            );
        }

        if self.ack_mode == AckMode::OnReceipt {
            return;
        }

        if outcome.is_reserved() {
            settle_ack(&self.delivery, self.logger.as_ref(), self.correlation_id).await;
            return;
        }

        let letter = DeadLetter::new(
            &self.delivery,
            format!("{}: {}", outcome.label(), outcome),
            self.correlation_id,
        );
        match self.dead_letters.push(letter).await {
            Ok(()) => {
                settle_ack(&self.delivery, self.logger.as_ref(), self.correlation_id).await;
            }
            Err(e) => {
                self.logger.error(
                    COMPONENT,
                    &format!("Dead-lettering failed, requeueing: {}", e),
                    Some(self.correlation_id),
                    None,
                );
                if let Err(e) = self.delivery.nack(true).await {
                    self.logger.error(
                        COMPONENT,
                        &format!("Negative acknowledgement failed: {}", e),
                        Some(self.correlation_id),
                        None,
                    );
                }
            }
        }
    }
}

async fn settle_ack(delivery: &Delivery, logger: &dyn Logger, correlation_id: Uuid) {
    if let Err(e) = delivery.ack().await {
        logger.error(
            COMPONENT,
            &format!("Acknowledgement failed: {}", e),
            Some(correlation_id),
            None,
        );
    }
}
