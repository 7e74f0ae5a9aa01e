mod product_query_service;
mod user_query_service;

pub use product_query_service::ProductQueryService;
pub use user_query_service::UserQueryService;

use crate::application::ApplicationError;
use crate::domain::error::DomainError;
use crate::domain::model::{Product, ProductId, User, UserId};
use crate::domain::port::{ProductPatch, ProductRepository, UserRepository};
use crate::domain::service::with_store_timeout;
use std::sync::Arc;
use std::time::Duration;

/// 名前が空でないことを確認する
fn require_name(name: &str) -> Result<(), ApplicationError> {
    if name.trim().is_empty() {
        return Err(DomainError::InvalidValue("名前は空にできません".to_string()).into());
    }
    Ok(())
}

/// 商品アプリケーションサービス
pub struct ProductApplicationService {
    product_repository: Arc<dyn ProductRepository>,
    store_timeout: Duration,
}

impl ProductApplicationService {
    /// 新しい商品アプリケーションサービスを作成
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

    /// 新しい商品を作成
    /// IDが指定されなければ新しいIDを割り当てる
    ///
    /// # Returns
    /// * `Ok(Product)` - 作成された商品
    /// * `Err(ApplicationError)` - 作成失敗
    pub async fn create_product(
        &self,
        product_id: Option<ProductId>,
        name: String,
        quantity: u32,
    ) -> Result<Product, ApplicationError> {
        require_name(&name)?;
        let product = Product::new(product_id.unwrap_or_default(), name, quantity);
        with_store_timeout(
            self.store_timeout,
            "product insert",
            self.product_repository.save(&product),
        )
        .await?;
        Ok(product)
    }

    /// 商品を更新
    /// 指定されたフィールドだけを書き換える
    ///
    /// # Returns
    /// * `Ok(Product)` - 更新後の商品
    /// * `Err(ApplicationError::NotFound)` - 商品が存在しない
    pub async fn update_product(
        &self,
        product_id: ProductId,
        name: Option<String>,
        quantity: Option<u32>,
    ) -> Result<Product, ApplicationError> {
        if let Some(name) = &name {
            require_name(name)?;
        }

        // 現在の在庫数を読まずに、指定フィールドだけを書く
        with_store_timeout(
            self.store_timeout,
            "product update",
            self.product_repository
                .patch(product_id, ProductPatch { name, quantity }),
        )
        .await?
        .ok_or_else(|| ApplicationError::NotFound(format!("商品が見つかりません: {}", product_id)))
    }

    /// 商品を削除
    pub async fn delete_product(&self, product_id: ProductId) -> Result<(), ApplicationError> {
        let deleted = with_store_timeout(
            self.store_timeout,
            "product delete",
            self.product_repository.delete(product_id),
        )
        .await?;
        if !deleted {
            return Err(ApplicationError::NotFound(format!(
                "商品が見つかりません: {}",
                product_id
            )));
        }
        Ok(())
    }
}

/// ユーザーアプリケーションサービス
pub struct UserApplicationService {
    user_repository: Arc<dyn UserRepository>,
    store_timeout: Duration,
}

impl UserApplicationService {
    /// 新しいユーザーアプリケーションサービスを作成
    pub fn new(user_repository: Arc<dyn UserRepository>, store_timeout: Duration) -> Self {
        Self {
            user_repository,
            store_timeout,
        }
    }

    /// 新しいユーザーを作成
    /// IDが指定されなければ新しいIDを割り当てる
    pub async fn create_user(
        &self,
        user_id: Option<UserId>,
        name: String,
        age: u32,
    ) -> Result<User, ApplicationError> {
        require_name(&name)?;
        let user = User::new(user_id.unwrap_or_default(), name, age);
        with_store_timeout(
            self.store_timeout,
            "user insert",
            self.user_repository.save(&user),
        )
        .await?;
        Ok(user)
    }

    /// ユーザーを更新
    /// 指定されたフィールドだけを書き換える
    pub async fn update_user(
        &self,
        user_id: UserId,
        name: Option<String>,
        age: Option<u32>,
    ) -> Result<User, ApplicationError> {
        let mut user = with_store_timeout(
            self.store_timeout,
            "user lookup",
            self.user_repository.find_by_id(user_id),
        )
        .await?
        .ok_or_else(|| {
            ApplicationError::NotFound(format!("ユーザーが見つかりません: {}", user_id))
        })?;

        if let Some(name) = name {
            require_name(&name)?;
            user.rename(name);
        }
        if let Some(age) = age {
            user.set_age(age);
        }

        let updated = with_store_timeout(
            self.store_timeout,
            "user update",
            self.user_repository.update(&user),
        )
        .await?;
        if !updated {
            return Err(ApplicationError::NotFound(format!(
                "ユーザーが見つかりません: {}",
                user_id
            )));
        }
        Ok(user)
    }

    /// ユーザーを削除
    pub async fn delete_user(&self, user_id: UserId) -> Result<(), ApplicationError> {
        let deleted = with_store_timeout(
            self.store_timeout,
            "user delete",
            self.user_repository.delete(user_id),
        )
        .await?;
        if !deleted {
            return Err(ApplicationError::NotFound(format!(
                "ユーザーが見つかりません: {}",
                user_id
            )));
        }
        Ok(())
    }
}
