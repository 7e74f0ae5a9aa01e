use crate::domain::model::{Product, User};
use serde::{Deserialize, Serialize};

/// 商品用のレスポンスDTO
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub quantity: u32,
}

impl ProductResponse {
    /// ドメインオブジェクトからProductResponseを作成
    pub fn from_product(product: &Product) -> Self {
        Self {
            id: product.id().to_string(),
            name: product.name().to_string(),
            quantity: product.quantity(),
        }
    }
}

/// ユーザー用のレスポンスDTO
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub age: u32,
}

impl UserResponse {
    /// ドメインオブジェクトからUserResponseを作成
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id().to_string(),
            name: user.name().to_string(),
            age: user.age(),
        }
    }
}

/// 注文受付のレスポンスDTO
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct OrderAcceptedResponse {
    pub status: String,
}

impl OrderAcceptedResponse {
    pub fn queued() -> Self {
        Self {
            status: "queued".to_string(),
        }
    }
}
