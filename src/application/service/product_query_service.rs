use crate::application::ApplicationError;
use crate::domain::model::{Product, ProductId};
use crate::domain::port::ProductRepository;
use crate::domain::service::with_store_timeout;
use std::sync::Arc;
use std::time::Duration;

/// 商品クエリサービス
/// 読み取り専用の商品操作を提供する
pub struct ProductQueryService {
    product_repository: Arc<dyn ProductRepository>,
    store_timeout: Duration,
}

impl ProductQueryService {
    /// 新しい商品クエリサービスを作成
    ///
    /// # Arguments
    /// * `product_repository` - 商品リポジトリ
    /// * `store_timeout` - ストア操作1回あたりの制限時間
    pub fn new(product_repository: Arc<dyn ProductRepository>, store_timeout: Duration) -> Self {
        Self {
            product_repository,
            store_timeout,
        }
    }

    /// 商品IDで商品を取得
    ///
    /// # Returns
    /// * `Ok(Some(Product))` - 商品が見つかった
    /// * `Ok(None)` - 商品が見つからなかった
    /// * `Err(ApplicationError)` - 取得失敗
    pub async fn get_product_by_id(
        &self,
        product_id: ProductId,
    ) -> Result<Option<Product>, ApplicationError> {
        with_store_timeout(
            self.store_timeout,
            "product lookup",
            self.product_repository.find_by_id(product_id),
        )
        .await
        .map_err(ApplicationError::from)
    }

    /// すべての商品を取得
    pub async fn get_all_products(&self) -> Result<Vec<Product>, ApplicationError> {
        with_store_timeout(
            self.store_timeout,
            "product listing",
            self.product_repository.find_all(),
        )
        .await
        .map_err(ApplicationError::from)
    }
}
