use crate::domain::error::DomainError;
use crate::domain::model::ProductId;
use crate::domain::port::{ProductRepository, StockDecrement};
use crate::domain::service::with_store_timeout;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// 在庫減算の実行方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReservationMode {
    /// 「在庫数 >= N なら N を減算」を単一の条件付き更新で行う
    #[default]
    Atomic,
    /// 読み取り → 判定 → ドキュメント全体の書き戻し（2往復）
    ///
    /// 同一商品への同時予約で在庫を過剰に引き当てる可能性がある
    ReadThenWrite,
}

impl ReservationMode {
    /// 文字列から予約方式を作成
    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "atomic" => Ok(ReservationMode::Atomic),
            "read_then_write" => Ok(ReservationMode::ReadThenWrite),
            _ => Err(DomainError::InvalidValue(format!(
                "サポートされていない予約方式: {}",
                s
            ))),
        }
    }
}

/// 在庫予約の結果
/// 失敗理由を区別して保持する。真偽値が必要な場合は `is_reserved` を使う
#[derive(Debug, Clone, PartialEq)]
pub enum ReservationOutcome {
    /// 予約成功（在庫が減算された）
    Reserved,
    /// 商品IDをストアのキーとして解析できない
    InvalidIdentifier,
    /// 要求数量が0以下
    InvalidQuantity(i64),
    /// 商品が存在しない
    NotFound,
    /// 在庫不足（在庫は変更されない）
    InsufficientStock { requested: i64, available: u32 },
    /// ストア操作の失敗（タイムアウトを含む）
    StoreError(String),
}

impl ReservationOutcome {
    /// 予約に成功したか
    pub fn is_reserved(&self) -> bool {
        matches!(self, ReservationOutcome::Reserved)
    }

    /// ログ出力用のラベル
    pub fn label(&self) -> &'static str {
        match self {
            ReservationOutcome::Reserved => "reserved",
            ReservationOutcome::InvalidIdentifier => "invalid_identifier",
            ReservationOutcome::InvalidQuantity(_) => "invalid_quantity",
            ReservationOutcome::NotFound => "not_found",
            ReservationOutcome::InsufficientStock { .. } => "insufficient_stock",
            ReservationOutcome::StoreError(_) => "store_error",
        }
    }
}

impl fmt::Display for ReservationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReservationOutcome::Reserved => write!(f, "Stock reserved"),
            ReservationOutcome::InvalidIdentifier => write!(f, "Invalid product identifier"),
            ReservationOutcome::InvalidQuantity(quantity) => {
                write!(f, "Invalid quantity: {}", quantity)
            }
            ReservationOutcome::NotFound => write!(f, "Product not found"),
            ReservationOutcome::InsufficientStock {
                requested,
                available,
            } => write!(
                f,
                "Insufficient stock: requested {}, available {}",
                requested, available
            ),
            ReservationOutcome::StoreError(msg) => write!(f, "Store error: {}", msg),
        }
    }
}

/// 在庫予約エンジン
/// 商品IDと要求数量を受け取り、商品コレクションの在庫を減算する
///
/// 在庫数をキャッシュしない。毎回ストア上の現在値に対して判定する
pub struct StockReservationEngine {
    product_repository: Arc<dyn ProductRepository>,
    mode: ReservationMode,
    store_timeout: Duration,
}

impl StockReservationEngine {
    /// 新しい在庫予約エンジンを作成
    ///
    /// # Arguments
    /// * `product_repository` - 商品リポジトリ
    /// * `mode` - 在庫減算の実行方式
    /// * `store_timeout` - ストア操作1回あたりの制限時間
    pub fn new(
        product_repository: Arc<dyn ProductRepository>,
        mode: ReservationMode,
        store_timeout: Duration,
    ) -> Self {
        Self {
            product_repository,
            mode,
            store_timeout,
        }
    }

    /// 実行方式を取得
    pub fn mode(&self) -> ReservationMode {
        self.mode
    }

    /// 在庫を予約する
    ///
    /// # Arguments
    /// * `product_id` - 商品IDの外部文字列表現
    /// * `quantity` - 要求数量（メッセージの値そのまま）
    pub async fn reserve(&self, product_id: &str, quantity: i64) -> ReservationOutcome {
        let product_id = match ProductId::from_string(product_id) {
            Ok(id) => id,
            Err(_) => return ReservationOutcome::InvalidIdentifier,
        };

        if quantity <= 0 {
            return ReservationOutcome::InvalidQuantity(quantity);
        }

        // 在庫数はu32で保持しているため、それを超える要求は満たせない
        let requested = match u32::try_from(quantity) {
            Ok(requested) => requested,
            Err(_) => return self.reject_oversized(product_id, quantity).await,
        };

        match self.mode {
            ReservationMode::Atomic => self.reserve_atomically(product_id, requested).await,
            ReservationMode::ReadThenWrite => {
                self.reserve_read_then_write(product_id, requested).await
            }
        }
    }

    async fn reserve_atomically(&self, product_id: ProductId, requested: u32) -> ReservationOutcome {
        let result = with_store_timeout(
            self.store_timeout,
            "conditional stock decrement",
            self.product_repository
                .decrement_stock_if_available(product_id, requested),
        )
        .await;

        match result {
            Ok(StockDecrement::Applied) => ReservationOutcome::Reserved,
            Ok(StockDecrement::InsufficientStock { available }) => {
                ReservationOutcome::InsufficientStock {
                    requested: i64::from(requested),
                    available,
                }
            }
            Ok(StockDecrement::NotFound) => ReservationOutcome::NotFound,
            Err(e) => ReservationOutcome::StoreError(e.to_string()),
        }
    }

    async fn reserve_read_then_write(
        &self,
        product_id: ProductId,
        requested: u32,
    ) -> ReservationOutcome {
        let found = with_store_timeout(
            self.store_timeout,
            "product lookup",
            self.product_repository.find_by_id(product_id),
        )
        .await;

        let mut product = match found {
            Ok(Some(product)) => product,
            Ok(None) => return ReservationOutcome::NotFound,
            Err(e) => return ReservationOutcome::StoreError(e.to_string()),
        };

        if !product.has_available_stock(requested) {
            return ReservationOutcome::InsufficientStock {
                requested: i64::from(requested),
                available: product.quantity(),
            };
        }

        // 読み取った値から計算した在庫数でドキュメント全体を書き戻す
        product.set_quantity(product.quantity() - requested);

        let written = with_store_timeout(
            self.store_timeout,
            "product update",
            self.product_repository.update(&product),
        )
        .await;

        match written {
            Ok(true) => ReservationOutcome::Reserved,
            Ok(false) => ReservationOutcome::NotFound,
            Err(e) => ReservationOutcome::StoreError(e.to_string()),
        }
    }

    async fn reject_oversized(&self, product_id: ProductId, quantity: i64) -> ReservationOutcome {
        let found = with_store_timeout(
            self.store_timeout,
            "product lookup",
            self.product_repository.find_by_id(product_id),
        )
        .await;

        match found {
            Ok(Some(product)) => ReservationOutcome::InsufficientStock {
                requested: quantity,
                available: product.quantity(),
            },
            Ok(None) => ReservationOutcome::NotFound,
            Err(e) => ReservationOutcome::StoreError(e.to_string()),
        }
    }
}
