// 出力ポート
// ドメイン層が外部に依存する機能をトレイトとして定義
// アダプター層でこれらのトレイトを実装する

use crate::domain::model::{Product, ProductId, User, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// ログレベル
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// ロガートレイト
/// ログ出力を抽象化するポート
pub trait Logger: Send + Sync {
    /// デバッグレベルのログを出力
    fn debug(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    );

    /// 情報レベルのログを出力
    fn info(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    );

    /// 警告レベルのログを出力
    fn warn(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    );

    /// エラーレベルのログを出力
    fn error(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    );
}

/// リポジトリエラー型
/// リポジトリ操作で発生するエラーを表現する
#[derive(Debug, Clone, PartialEq)]
#[allow(clippy::enum_variant_names)]
pub enum RepositoryError {
    /// データベース接続に失敗
    ConnectionFailed(String),
    /// 操作に失敗
    OperationFailed(String),
    /// データの取得に失敗
    FetchFailed(String),
    /// 制限時間内に操作が完了しなかった
    TimedOut(String),
}

impl std::fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepositoryError::ConnectionFailed(msg) => write!(f, "Connection failed: {}", msg),
            RepositoryError::OperationFailed(msg) => write!(f, "Operation failed: {}", msg),
            RepositoryError::FetchFailed(msg) => write!(f, "Fetch failed: {}", msg),
            RepositoryError::TimedOut(msg) => write!(f, "Timed out: {}", msg),
        }
    }
}

impl std::error::Error for RepositoryError {}

/// 条件付き在庫減算の結果
/// ストアエラーとは区別して「条件不成立」を表す
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockDecrement {
    /// 書き込み時点で在庫が足りており、減算が適用された
    Applied,
    /// 書き込み時点で在庫が不足していた（何も変更されない）
    InsufficientStock { available: u32 },
    /// 対象の商品が存在しない
    NotFound,
}

/// 商品の部分更新
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub quantity: Option<u32>,
}

impl ProductPatch {
    /// 書き換えるフィールドが無いか
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.quantity.is_none()
    }
}

/// 商品リポジトリトレイト
/// 商品コレクションの永続化を抽象化する
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// 商品を保存する（存在しなければ作成、存在すれば置き換え）
    async fn save(&self, product: &Product) -> Result<(), RepositoryError>;

    /// 商品IDで商品を検索する
    ///
    /// # Returns
    /// * `Ok(Some(Product))` - 商品が見つかった
    /// * `Ok(None)` - 商品が見つからなかった
    /// * `Err(RepositoryError)` - 検索失敗
    async fn find_by_id(&self, product_id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// すべての商品を取得する
    async fn find_all(&self) -> Result<Vec<Product>, RepositoryError>;

    /// 同じIDの既存ドキュメント全体を置き換える
    ///
    /// # Returns
    /// * `Ok(true)` - 更新対象が存在した
    /// * `Ok(false)` - 更新対象が存在しなかった
    async fn update(&self, product: &Product) -> Result<bool, RepositoryError>;

    /// 指定されたフィールドだけを単一の操作で書き換える
    ///
    /// 指定されなかったフィールドはストア上の現在値のまま残る
    ///
    /// # Returns
    /// * `Ok(Some(Product))` - 書き換え後の商品
    /// * `Ok(None)` - 対象が存在しなかった
    async fn patch(
        &self,
        product_id: ProductId,
        patch: ProductPatch,
    ) -> Result<Option<Product>, RepositoryError>;

    /// 商品を削除する
    ///
    /// # Returns
    /// * `Ok(true)` - 削除された
    /// * `Ok(false)` - 削除対象が存在しなかった
    async fn delete(&self, product_id: ProductId) -> Result<bool, RepositoryError>;

    /// 「在庫数 >= requested の場合のみ requested だけ減算する」を単一の操作として実行する
    ///
    /// 読み取りと書き込みの間に他の書き込みが割り込む余地はない。`requested` は1以上
    async fn decrement_stock_if_available(
        &self,
        product_id: ProductId,
        requested: u32,
    ) -> Result<StockDecrement, RepositoryError>;
}

/// ユーザーリポジトリトレイト
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// ユーザーを保存する（存在しなければ作成、存在すれば置き換え）
    async fn save(&self, user: &User) -> Result<(), RepositoryError>;

    /// ユーザーIDでユーザーを検索する
    async fn find_by_id(&self, user_id: UserId) -> Result<Option<User>, RepositoryError>;

    /// すべてのユーザーを取得する
    async fn find_all(&self) -> Result<Vec<User>, RepositoryError>;

    /// 同じIDの既存ユーザーを置き換える（対象が無ければ `Ok(false)`）
    async fn update(&self, user: &User) -> Result<bool, RepositoryError>;

    /// ユーザーを削除する（対象が無ければ `Ok(false)`）
    async fn delete(&self, user_id: UserId) -> Result<bool, RepositoryError>;
}

/// キューエラー
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueueError {
    #[error("Broker unavailable: {0}")]
    BrokerUnavailable(String),
    #[error("Acknowledgement failed for delivery {delivery_tag}: {reason}")]
    AcknowledgementFailed { delivery_tag: u64, reason: String },
    #[error("Publishing failed: {0}")]
    PublishingFailed(String),
    #[error("Dead-letter queue rejected delivery {delivery_tag}: {reason}")]
    DeadLetterRejected { delivery_tag: u64, reason: String },
}

/// 受信メッセージの確認応答を行うポート
#[async_trait]
pub trait Acknowledger: Send + Sync {
    /// 処理完了を通知する（ブローカーから削除される）
    async fn ack(&self, delivery_tag: u64) -> Result<(), QueueError>;

    /// 処理失敗を通知する（`requeue` が true なら再配信対象に戻す）
    async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), QueueError>;
}

/// キューから受信した1件のメッセージ
#[derive(Clone)]
pub struct Delivery {
    pub delivery_tag: u64,
    pub body: Vec<u8>,
    acknowledger: Arc<dyn Acknowledger>,
}

impl Delivery {
    /// 新しい受信メッセージを作成
    pub fn new(delivery_tag: u64, body: Vec<u8>, acknowledger: Arc<dyn Acknowledger>) -> Self {
        Self {
            delivery_tag,
            body,
            acknowledger,
        }
    }

    /// このメッセージを確認応答する
    pub async fn ack(&self) -> Result<(), QueueError> {
        self.acknowledger.ack(self.delivery_tag).await
    }

    /// このメッセージを否定応答する
    pub async fn nack(&self, requeue: bool) -> Result<(), QueueError> {
        self.acknowledger.nack(self.delivery_tag, requeue).await
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("delivery_tag", &self.delivery_tag)
            .field("body_len", &self.body.len())
            .finish()
    }
}

/// 注文キュー（消費側）トレイト
#[async_trait]
pub trait OrderQueue: Send {
    /// 次のメッセージを待って受信する
    ///
    /// # Returns
    /// * `Ok(Some(Delivery))` - メッセージを受信した
    /// * `Ok(None)` - キューが閉じられた（これ以上メッセージは来ない）
    /// * `Err(QueueError)` - ブローカーが利用できない
    async fn receive(&mut self) -> Result<Option<Delivery>, QueueError>;
}

/// 注文キュー（送信側）トレイト
#[async_trait]
pub trait OrderPublisher: Send + Sync {
    /// バイナリペイロードをキューに送信する
    async fn publish(&self, body: Vec<u8>) -> Result<(), QueueError>;
}

/// 処理できなかったメッセージ
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub delivery_tag: u64,
    pub body: Vec<u8>,
    pub reason: String,
    pub correlation_id: Uuid,
    pub dead_lettered_at: DateTime<Utc>,
}

impl DeadLetter {
    /// 新しいデッドレターを作成
    pub fn new(delivery: &Delivery, reason: String, correlation_id: Uuid) -> Self {
        Self {
            delivery_tag: delivery.delivery_tag,
            body: delivery.body.clone(),
            reason,
            correlation_id,
            dead_lettered_at: Utc::now(),
        }
    }
}

/// デッドレターの送り先トレイト
#[async_trait]
pub trait DeadLetterQueue: Send + Sync {
    /// 処理できなかったメッセージを後の調査・再処理のために保管する
    async fn push(&self, letter: DeadLetter) -> Result<(), QueueError>;
}
