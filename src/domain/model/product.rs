use crate::domain::error::DomainError;
use crate::domain::model::ProductId;

/// 商品集約
/// 商品名と在庫数を管理する
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    id: ProductId,
    name: String,
    quantity: u32,
}

impl Product {
    /// 新しい商品を作成
    ///
    /// # Arguments
    /// * `id` - 商品ID
    /// * `name` - 商品名
    /// * `quantity` - 在庫数
    pub fn new(id: ProductId, name: String, quantity: u32) -> Self {
        Self { id, name, quantity }
    }

    /// 商品IDを取得
    pub fn id(&self) -> ProductId {
        self.id
    }

    /// 商品名を取得
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 在庫数を取得
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// 商品名を変更
    pub fn rename(&mut self, name: String) {
        self.name = name;
    }

    /// 在庫数を直接設定する（API経由の編集）
    pub fn set_quantity(&mut self, quantity: u32) {
        self.quantity = quantity;
    }

    /// 在庫を予約する
    ///
    /// # Arguments
    /// * `requested` - 予約する数量
    ///
    /// # Returns
    /// * `Ok(())` - 予約成功
    /// * `Err(DomainError::InsufficientStock)` - 在庫不足（在庫数は変わらない）
    pub fn reserve(&mut self, requested: u32) -> Result<(), DomainError> {
        if !self.has_available_stock(requested) {
            return Err(DomainError::InsufficientStock {
                requested,
                available: self.quantity,
            });
        }
        self.quantity -= requested;
        Ok(())
    }

    /// 指定された数量の在庫が利用可能かチェック
    pub fn has_available_stock(&self, requested: u32) -> bool {
        self.quantity >= requested
    }
}
