use crate::domain::error::DomainError;
use crate::domain::model::{Product, ProductId, User, UserId};
use crate::domain::port::{
    ProductPatch, ProductRepository, RepositoryError, StockDecrement, UserRepository,
};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// インメモリ商品リポジトリ
/// 開発・テスト用。条件付き減算はロックを保持したまま判定と書き込みを行う
#[derive(Default)]
pub struct InMemoryProductRepository {
    products: Mutex<HashMap<ProductId, Product>>,
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn save(&self, product: &Product) -> Result<(), RepositoryError> {
        let mut products = self.products.lock().await;
        products.insert(product.id(), product.clone());
        Ok(())
    }

    async fn find_by_id(&self, product_id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.lock().await;
        Ok(products.get(&product_id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Product>, RepositoryError> {
        let products = self.products.lock().await;
        let mut all: Vec<Product> = products.values().cloned().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(all)
    }

    async fn update(&self, product: &Product) -> Result<bool, RepositoryError> {
        let mut products = self.products.lock().await;
        match products.get_mut(&product.id()) {
            Some(existing) => {
                *existing = product.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn patch(
        &self,
        product_id: ProductId,
        patch: ProductPatch,
    ) -> Result<Option<Product>, RepositoryError> {
        let mut products = self.products.lock().await;
        let Some(product) = products.get_mut(&product_id) else {
            return Ok(None);
        };
        if let Some(name) = patch.name {
            product.rename(name);
        }
        if let Some(quantity) = patch.quantity {
            product.set_quantity(quantity);
        }
        Ok(Some(product.clone()))
    }

    async fn delete(&self, product_id: ProductId) -> Result<bool, RepositoryError> {
        let mut products = self.products.lock().await;
        Ok(products.remove(&product_id).is_some())
    }

    async fn decrement_stock_if_available(
        &self,
        product_id: ProductId,
        requested: u32,
    ) -> Result<StockDecrement, RepositoryError> {
        let mut products = self.products.lock().await;
        let Some(product) = products.get_mut(&product_id) else {
            return Ok(StockDecrement::NotFound);
        };
        match product.reserve(requested) {
            Ok(()) => Ok(StockDecrement::Applied),
            Err(DomainError::InsufficientStock { available, .. }) => {
                Ok(StockDecrement::InsufficientStock { available })
            }
            Err(e) => Err(RepositoryError::OperationFailed(e.to_string())),
        }
    }
}

/// インメモリユーザーリポジトリ
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<HashMap<UserId, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn save(&self, user: &User) -> Result<(), RepositoryError> {
        self.users.lock().await.insert(user.id(), user.clone());
        Ok(())
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.lock().await.get(&user_id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<User>, RepositoryError> {
        let users = self.users.lock().await;
        let mut all: Vec<User> = users.values().cloned().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(all)
    }

    async fn update(&self, user: &User) -> Result<bool, RepositoryError> {
        let mut users = self.users.lock().await;
        match users.get_mut(&user.id()) {
            Some(existing) => {
                *existing = user.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        Ok(self.users.lock().await.remove(&user_id).is_some())
    }
}
